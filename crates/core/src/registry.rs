//! In-memory registry of vehicles, customers and rental history.

use std::{io, sync::Arc};

use anyhow::Result;
use chrono::NaiveDate;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    codec::{self, EncodeError},
    loader::{LoadReport, Loader},
    models::{Customer, RecordKind, RentalRecord, Vehicle, VehicleStatus},
    store::{StoreKind, Stores},
};

/// Failures of registry mutations. None of them leave partial state behind.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A vehicle with this plate is already registered.
    #[error("a vehicle with licence plate {0} already exists")]
    DuplicateVehicle(String),
    /// A customer with this id is already registered.
    #[error("a customer with id {0} already exists")]
    DuplicateCustomer(u32),
    /// No vehicle with this plate is registered.
    #[error("no vehicle with licence plate {0}")]
    UnknownVehicle(String),
    /// No customer with this id is registered.
    #[error("no customer with id {0}")]
    UnknownCustomer(u32),
    /// The vehicle's status does not allow the transaction.
    #[error("vehicle {plate} is {status}; cannot {kind} it")]
    InvalidState {
        /// Plate of the vehicle.
        plate: String,
        /// Its current status.
        status: VehicleStatus,
        /// The refused transaction.
        kind: RecordKind,
    },
    /// The entity cannot be represented in the store format.
    #[error(transparent)]
    Unencodable(#[from] EncodeError),
    /// Appending to a store failed. The in-memory state was not changed.
    #[error("failed to append to {store} at {location}")]
    Persistence {
        /// Store being written.
        store: StoreKind,
        /// Location reported by the store.
        location: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Shared handle to the process-wide registry.
///
/// Cloning is cheap and every clone observes the same state. Each mutation
/// holds the write lock across its check, its store append and its commit, so
/// concurrent callers are serialized.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Shared>,
}

struct Shared {
    state: RwLock<State>,
    stores: Stores,
}

#[derive(Debug, Default)]
pub(crate) struct State {
    vehicles: Vec<Vehicle>,
    customers: Vec<Customer>,
    history: Vec<RentalRecord>,
}

impl State {
    pub(crate) fn vehicle_index(&self, plate: &str) -> Option<usize> {
        self.vehicles
            .iter()
            .position(|vehicle| vehicle.plate.matches(plate))
    }

    pub(crate) fn vehicle(&self, index: usize) -> &Vehicle {
        &self.vehicles[index]
    }

    pub(crate) fn customer_by_id(&self, id: u32) -> Option<&Customer> {
        self.customers.iter().find(|customer| customer.id == id)
    }

    pub(crate) fn customer_by_name(&self, name: &str) -> Option<&Customer> {
        self.customers
            .iter()
            .find(|customer| customer.name.to_lowercase() == name.to_lowercase())
    }

    pub(crate) fn push_vehicle(&mut self, vehicle: Vehicle) {
        self.vehicles.push(vehicle);
    }

    pub(crate) fn push_customer(&mut self, customer: Customer) {
        self.customers.push(customer);
    }

    /// Append `record` to the history and move the vehicle at `index` to the
    /// status the record implies.
    pub(crate) fn apply(&mut self, index: usize, record: RentalRecord) {
        self.vehicles[index].set_status(record.kind.resulting_status());
        self.history.push(record);
    }

    pub(crate) fn counts(&self) -> (usize, usize, usize) {
        (self.vehicles.len(), self.customers.len(), self.history.len())
    }
}

impl Registry {
    /// Empty registry persisting to `stores`. Existing store contents are not read.
    pub fn new(stores: Stores) -> Self {
        Self::from_parts(stores, State::default())
    }

    /// Rebuild the registry from `stores` by replaying them.
    pub fn open(stores: Stores) -> Result<(Self, LoadReport)> {
        Loader::new(stores).run()
    }

    pub(crate) fn from_parts(stores: Stores, state: State) -> Self {
        Self {
            inner: Arc::new(Shared {
                state: RwLock::new(state),
                stores,
            }),
        }
    }

    /// Whether two handles refer to the same registry.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Register a vehicle and append it to the vehicle store.
    pub fn add_vehicle(&self, vehicle: Vehicle) -> Result<(), RegistryError> {
        let mut state = self.inner.state.write();
        if state.vehicle_index(vehicle.plate.as_str()).is_some() {
            return Err(RegistryError::DuplicateVehicle(vehicle.plate.to_string()));
        }

        let line = codec::encode_vehicle(&vehicle)?;
        self.append(StoreKind::Vehicles, &line)?;
        debug!(plate = %vehicle.plate, kind = vehicle.kind.type_name(), "vehicle added");
        state.push_vehicle(vehicle);
        Ok(())
    }

    /// Register a customer and append it to the customer store.
    pub fn add_customer(&self, customer: Customer) -> Result<(), RegistryError> {
        let mut state = self.inner.state.write();
        if state.customer_by_id(customer.id).is_some() {
            return Err(RegistryError::DuplicateCustomer(customer.id));
        }
        if let Some(existing) = state.customer_by_name(&customer.name) {
            warn!(
                id = customer.id,
                existing = existing.id,
                "customer name {:?} is already in use; its records reload as customer {}",
                customer.name,
                existing.id
            );
        }

        let line = codec::encode_customer(&customer)?;
        self.append(StoreKind::Customers, &line)?;
        debug!(id = customer.id, "customer added");
        state.push_customer(customer);
        Ok(())
    }

    /// Rent an available vehicle to a registered customer.
    pub fn rent_vehicle(
        &self,
        plate: &str,
        customer_id: u32,
        date: NaiveDate,
        amount: f64,
    ) -> Result<RentalRecord, RegistryError> {
        self.transition(RecordKind::Rent, plate, customer_id, date, amount)
    }

    /// Take back a rented vehicle, charging `fee`.
    pub fn return_vehicle(
        &self,
        plate: &str,
        customer_id: u32,
        date: NaiveDate,
        fee: f64,
    ) -> Result<RentalRecord, RegistryError> {
        self.transition(RecordKind::Return, plate, customer_id, date, fee)
    }

    fn transition(
        &self,
        kind: RecordKind,
        plate: &str,
        customer_id: u32,
        date: NaiveDate,
        amount: f64,
    ) -> Result<RentalRecord, RegistryError> {
        let mut state = self.inner.state.write();
        let index = state
            .vehicle_index(plate)
            .ok_or_else(|| RegistryError::UnknownVehicle(plate.to_string()))?;
        let customer = state
            .customer_by_id(customer_id)
            .ok_or(RegistryError::UnknownCustomer(customer_id))?;

        let vehicle = state.vehicle(index);
        if vehicle.status() != kind.required_status() {
            return Err(RegistryError::InvalidState {
                plate: vehicle.plate.to_string(),
                status: vehicle.status(),
                kind,
            });
        }

        let record = RentalRecord::new(kind, vehicle, customer, date, amount);
        let line = codec::encode_record(&record)?;
        self.append(StoreKind::Records, &line)?;
        debug!(plate = %record.plate, customer = customer_id, %kind, "rental recorded");
        state.apply(index, record.clone());
        Ok(record)
    }

    fn append(&self, kind: StoreKind, line: &str) -> Result<(), RegistryError> {
        let store = self.inner.stores.get(kind);
        store.append_line(line).map_err(|source| {
            warn!("failed to append to {kind} at {}: {source}", store.location());
            RegistryError::Persistence {
                store: kind,
                location: store.location(),
                source,
            }
        })
    }

    /// Vehicle with `plate`, compared case-insensitively.
    pub fn find_vehicle_by_plate(&self, plate: &str) -> Option<Vehicle> {
        let state = self.inner.state.read();
        state
            .vehicle_index(plate)
            .map(|index| state.vehicle(index).clone())
    }

    /// Customer with `id`.
    pub fn find_customer_by_id(&self, id: u32) -> Option<Customer> {
        self.inner.state.read().customer_by_id(id).cloned()
    }

    /// First customer whose name matches `name`, ignoring case.
    pub fn find_customer_by_name(&self, name: &str) -> Option<Customer> {
        self.inner.state.read().customer_by_name(name).cloned()
    }

    /// All vehicles in registration order.
    pub fn vehicles(&self) -> Vec<Vehicle> {
        self.inner.state.read().vehicles.clone()
    }

    /// Vehicles that can be rented right now.
    pub fn available_vehicles(&self) -> Vec<Vehicle> {
        self.inner
            .state
            .read()
            .vehicles
            .iter()
            .filter(|vehicle| vehicle.status() == VehicleStatus::Available)
            .cloned()
            .collect()
    }

    /// All customers in registration order.
    pub fn customers(&self) -> Vec<Customer> {
        self.inner.state.read().customers.clone()
    }

    /// Full rental history, oldest first.
    pub fn history(&self) -> Vec<RentalRecord> {
        self.inner.state.read().history.clone()
    }

    /// History entries for the vehicle with `plate`.
    pub fn history_for_vehicle(&self, plate: &str) -> Vec<RentalRecord> {
        self.inner
            .state
            .read()
            .history
            .iter()
            .filter(|record| record.plate.matches(plate))
            .cloned()
            .collect()
    }

    /// History entries for the customer with `id`.
    pub fn history_for_customer(&self, id: u32) -> Vec<RentalRecord> {
        self.inner
            .state
            .read()
            .history
            .iter()
            .filter(|record| record.customer_id == id)
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (vehicles, customers, records) = self.inner.state.read().counts();
        f.debug_struct("Registry")
            .field("stores", &self.inner.stores)
            .field("vehicles", &vehicles)
            .field("customers", &customers)
            .field("records", &records)
            .finish()
    }
}
