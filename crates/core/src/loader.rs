//! Startup replay of the persisted stores.
//!
//! Stores are read in dependency order: vehicles, customers, then rental
//! records. Replaying the records is what determines each vehicle's final
//! status; the status column of the vehicle store only matters for vehicles
//! that never appear in a record.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::{
    codec::{self, DecodeError, RecordLine},
    models::RentalRecord,
    registry::{Registry, State},
    store::{LineStore, StoreKind, Stores},
};

/// Summary of a completed load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Vehicles loaded.
    pub vehicles: usize,
    /// Customers loaded.
    pub customers: usize,
    /// Rental records replayed.
    pub records: usize,
    /// Vehicle lines skipped.
    pub skipped_vehicles: usize,
    /// Customer lines skipped.
    pub skipped_customers: usize,
    /// Record lines skipped.
    pub skipped_records: usize,
}

impl LoadReport {
    /// Total number of skipped lines across all stores.
    pub fn skipped(&self) -> usize {
        self.skipped_vehicles + self.skipped_customers + self.skipped_records
    }
}

/// Rebuilds a [`Registry`] from its stores.
pub struct Loader {
    stores: Stores,
    state: State,
    report: LoadReport,
}

impl Loader {
    /// Prepare a load from `stores`.
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            state: State::default(),
            report: LoadReport::default(),
        }
    }

    /// Read all three stores and hand back the ready registry.
    pub fn run(mut self) -> Result<(Registry, LoadReport)> {
        self.load_vehicles()?;
        self.load_customers()?;
        self.replay_records()?;

        let report = self.report;
        info!(
            vehicles = report.vehicles,
            customers = report.customers,
            records = report.records,
            skipped = report.skipped(),
            "registry loaded"
        );
        Ok((Registry::from_parts(self.stores, self.state), report))
    }

    fn load_vehicles(&mut self) -> Result<()> {
        let store = self.stores.get(StoreKind::Vehicles);
        for (number, line) in read_store(store, StoreKind::Vehicles)? {
            let vehicle = match line.and_then(|text| codec::decode_vehicle(&text)) {
                Ok(vehicle) => vehicle,
                Err(err) => {
                    skip(store, number, &err);
                    self.report.skipped_vehicles += 1;
                    continue;
                }
            };
            if self.state.vehicle_index(vehicle.plate.as_str()).is_some() {
                warn!(
                    "skipping {} line {number}: duplicate plate {}",
                    store.location(),
                    vehicle.plate
                );
                self.report.skipped_vehicles += 1;
                continue;
            }
            self.state.push_vehicle(vehicle);
            self.report.vehicles += 1;
        }
        Ok(())
    }

    fn load_customers(&mut self) -> Result<()> {
        let store = self.stores.get(StoreKind::Customers);
        for (number, line) in read_store(store, StoreKind::Customers)? {
            let customer = match line.and_then(|text| codec::decode_customer(&text)) {
                Ok(customer) => customer,
                Err(err) => {
                    skip(store, number, &err);
                    self.report.skipped_customers += 1;
                    continue;
                }
            };
            if self.state.customer_by_id(customer.id).is_some() {
                warn!(
                    "skipping {} line {number}: duplicate customer id {}",
                    store.location(),
                    customer.id
                );
                self.report.skipped_customers += 1;
                continue;
            }
            self.state.push_customer(customer);
            self.report.customers += 1;
        }
        Ok(())
    }

    fn replay_records(&mut self) -> Result<()> {
        let store = self.stores.get(StoreKind::Records);
        for (number, line) in read_store(store, StoreKind::Records)? {
            let resolved = line
                .and_then(|text| codec::decode_record(&text))
                .and_then(|decoded| resolve(&self.state, decoded));
            match resolved {
                Ok((index, record)) => {
                    let current = self.state.vehicle(index).status();
                    if current != record.kind.required_status() {
                        debug!(
                            "{} line {number}: {} while {} {current}",
                            store.location(),
                            record.kind,
                            record.plate
                        );
                    }
                    self.state.apply(index, record);
                    self.report.records += 1;
                }
                Err(err) => {
                    skip(store, number, &err);
                    self.report.skipped_records += 1;
                }
            }
        }
        Ok(())
    }
}

/// Resolve a decoded record against the vehicles and customers loaded so far.
fn resolve(state: &State, line: RecordLine) -> Result<(usize, RentalRecord), DecodeError> {
    let index = state
        .vehicle_index(line.plate.as_str())
        .ok_or_else(|| DecodeError::UnknownVehicle(line.plate.to_string()))?;
    let customer = state
        .customer_by_name(&line.customer_name)
        .ok_or_else(|| DecodeError::UnknownCustomer(line.customer_name.clone()))?;
    let record = RentalRecord::new(
        line.kind,
        state.vehicle(index),
        customer,
        line.date,
        line.amount,
    );
    Ok((index, record))
}

/// Numbered, non-blank lines of `store`. Lines that are not UTF-8 come back
/// as [`DecodeError::NotUtf8`] so they are skipped like any other bad line.
fn read_store(
    store: &dyn LineStore,
    kind: StoreKind,
) -> Result<Vec<(usize, Result<String, DecodeError>)>> {
    let lines = store
        .read_lines()
        .with_context(|| format!("failed to read {kind} at {}", store.location()))?;
    Ok(lines
        .into_iter()
        .enumerate()
        .filter(|(_, line)| line.as_ref().map_or(true, |text| !text.trim().is_empty()))
        .map(|(index, line)| (index + 1, line.map_err(|_| DecodeError::NotUtf8)))
        .collect())
}

fn skip(store: &dyn LineStore, number: usize, err: &DecodeError) {
    warn!("skipping {} line {number}: {err}", store.location());
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;
    use tempfile::tempdir;

    use super::*;
    use crate::{
        models::{Customer, LicensePlate, RecordKind, Vehicle, VehicleStatus},
        store::MemoryStore,
    };

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, day).unwrap()
    }

    #[test]
    fn missing_stores_load_as_empty() -> Result<()> {
        let dir = tempdir()?;
        let (registry, report) = Registry::open(Stores::in_dir(dir.path()))?;
        assert_eq!(report, LoadReport::default());
        assert!(registry.vehicles().is_empty());
        Ok(())
    }

    #[test]
    fn malformed_lines_are_skipped() -> Result<()> {
        let stores = Stores::new(
            MemoryStore::with_lines([
                "Car | AAA100 | Toyota | Corolla | 2025 | AVAILABLE | 4 |",
                "Car | BBB200 | Honda | Civic | not-a-year | AVAILABLE | 5 |",
            ]),
            MemoryStore::with_lines(["Customer ID: 7 | Name: James Bond", "garbage"]),
            MemoryStore::with_lines([
                "RENT | Plate: AAA100 | Customer: James Bond | Date: 2025-05-01 | Amount: $oops",
            ]),
        );

        let (registry, report) = Registry::open(stores)?;
        assert_eq!(registry.vehicles().len(), 1);
        assert_eq!(registry.customers().len(), 1);
        assert!(registry.history().is_empty());
        assert_eq!(report.skipped_vehicles, 1);
        assert_eq!(report.skipped_customers, 1);
        assert_eq!(report.skipped_records, 1);
        Ok(())
    }

    #[test]
    fn blank_lines_are_ignored_silently() -> Result<()> {
        let stores = Stores::new(
            MemoryStore::with_lines([
                "",
                "Car | AAA100 | Toyota | Corolla | 2025 | AVAILABLE | 4 |",
                "   ",
            ]),
            MemoryStore::new(),
            MemoryStore::new(),
        );
        let (_, report) = Registry::open(stores)?;
        assert_eq!(report.vehicles, 1);
        assert_eq!(report.skipped(), 0);
        Ok(())
    }

    #[test]
    fn last_record_for_a_plate_determines_status() -> Result<()> {
        let stores = Stores::new(
            MemoryStore::with_lines([
                // Stale status columns: replay must override both.
                "Car | AAA100 | Toyota | Corolla | 2025 | AVAILABLE | 4 |",
                "Truck | TRK001 | Ford | F-150 | 2019 | RENTED | 1.5 |",
                "Motorcycle | MOT001 | Ducati | Monster | 2023 | RENTED | false |",
            ]),
            MemoryStore::with_lines(["Customer ID: 1 | Name: Ann", "Customer ID: 2 | Name: Bob"]),
            MemoryStore::with_lines([
                "RENT | Plate: AAA100 | Customer: Ann | Date: 2025-05-01 | Amount: $80.00",
                "RENT | Plate: TRK001 | Customer: bob | Date: 2025-05-02 | Amount: $120.00",
                "RETURN | Plate: TRK001 | Customer: Bob | Date: 2025-05-03 | Amount: $0.00",
                "RETURN | Plate: AAA100 | Customer: Ann | Date: 2025-05-04 | Amount: $15.00",
                "RENT | Plate: aaa100 | Customer: Bob | Date: 2025-05-05 | Amount: $90.00",
            ]),
        );

        let (registry, report) = Registry::open(stores)?;
        assert_eq!(report.records, 5);
        let status = |plate: &str| registry.find_vehicle_by_plate(plate).map(|v| v.status());
        assert_eq!(status("AAA100"), Some(VehicleStatus::Rented));
        assert_eq!(status("TRK001"), Some(VehicleStatus::Available));
        // No records: the stored status column stands.
        assert_eq!(status("MOT001"), Some(VehicleStatus::Rented));

        let history = registry.history();
        assert_eq!(history[1].customer_id, 2);
        assert_eq!(history[1].customer_name, "Bob");
        assert_eq!(history[4].plate.as_str(), "AAA100");
        Ok(())
    }

    #[test]
    fn unresolvable_records_are_dropped() -> Result<()> {
        let stores = Stores::new(
            MemoryStore::with_lines(["Car | AAA100 | Toyota | Corolla | 2025 | AVAILABLE | 4 |"]),
            MemoryStore::with_lines(["Customer ID: 1 | Name: Ann"]),
            MemoryStore::with_lines([
                "RENT | Plate: ZZZ999 | Customer: Ann | Date: 2025-05-01 | Amount: $1.00",
                "RENT | Plate: AAA100 | Customer: Nobody | Date: 2025-05-01 | Amount: $1.00",
            ]),
        );
        let (registry, report) = Registry::open(stores)?;
        assert!(registry.history().is_empty());
        assert_eq!(report.skipped_records, 2);
        assert_eq!(
            registry.find_vehicle_by_plate("AAA100").map(|v| v.status()),
            Some(VehicleStatus::Available)
        );
        Ok(())
    }

    #[test]
    fn duplicate_keys_in_stores_keep_the_first_entry() -> Result<()> {
        let stores = Stores::new(
            MemoryStore::with_lines([
                "Car | AAA100 | Toyota | Corolla | 2025 | AVAILABLE | 4 |",
                "Car | aaa100 | Honda | Civic | 2020 | AVAILABLE | 5 |",
            ]),
            MemoryStore::with_lines(["Customer ID: 1 | Name: Ann", "Customer ID: 1 | Name: Bob"]),
            MemoryStore::new(),
        );
        let (registry, report) = Registry::open(stores)?;
        assert_eq!(
            registry.find_vehicle_by_plate("AAA100").map(|v| v.make),
            Some("Toyota".to_string())
        );
        assert_eq!(
            registry.find_customer_by_id(1).map(|c| c.name),
            Some("Ann".to_string())
        );
        assert_eq!(report.skipped(), 2);
        Ok(())
    }

    #[test]
    fn replay_matches_direct_application() -> Result<()> {
        let dir = tempdir()?;
        let plan = [
            (RecordKind::Rent, "AAA100", 1),
            (RecordKind::Rent, "TRK001", 2),
            (RecordKind::Return, "AAA100", 1),
            (RecordKind::Rent, "AAA100", 2),
            (RecordKind::Return, "TRK001", 2),
        ];

        let expected = {
            let registry = Registry::new(Stores::in_dir(dir.path()));
            registry.add_vehicle(Vehicle::car(
                LicensePlate::parse("AAA100")?,
                "Toyota",
                "Corolla",
                2025,
                4,
            ))?;
            registry.add_vehicle(Vehicle::truck(
                LicensePlate::parse("TRK001")?,
                "Ford",
                "F-150",
                2019,
                1.5,
            ))?;
            registry.add_customer(Customer::new(1, "Ann"))?;
            registry.add_customer(Customer::new(2, "Bob"))?;
            for (day, (kind, plate, customer)) in (1..).zip(plan) {
                match kind {
                    RecordKind::Rent => registry.rent_vehicle(plate, customer, date(day), 50.0)?,
                    RecordKind::Return => registry.return_vehicle(plate, customer, date(day), 5.0)?,
                };
            }
            (registry.vehicles(), registry.history())
        };

        let (reloaded, report) = Registry::open(Stores::in_dir(dir.path()))?;
        assert_eq!(report.skipped(), 0);
        assert_eq!(reloaded.vehicles(), expected.0);
        assert_eq!(reloaded.history(), expected.1);

        // The vehicle store still carries the status captured at registration.
        let vehicle_lines = fs::read_to_string(dir.path().join("vehicles.txt"))?;
        assert!(vehicle_lines.lines().all(|line| line.contains("AVAILABLE")));
        Ok(())
    }

    #[test]
    fn non_utf8_lines_are_skipped_and_counted() -> Result<()> {
        let dir = tempdir()?;
        let mut vehicles = b"Car | AAA100 | Toyota | Corolla | 2025 | AVAILABLE | 4 |\n".to_vec();
        vehicles.extend_from_slice(b"Car | BBB200 | Fo\xff | Focus | 2021 | AVAILABLE | 5 |\n");
        fs::write(dir.path().join("vehicles.txt"), vehicles)?;

        let (registry, report) = Registry::open(Stores::in_dir(dir.path()))?;
        assert_eq!(report.vehicles, 1);
        assert_eq!(report.skipped_vehicles, 1);
        assert!(registry.find_vehicle_by_plate("AAA100").is_some());
        assert!(registry.find_vehicle_by_plate("BBB200").is_none());
        Ok(())
    }

    #[test]
    fn fractional_cents_survive_a_reload_unchanged() -> Result<()> {
        let dir = tempdir()?;
        let registry = Registry::new(Stores::in_dir(dir.path()));
        registry.add_vehicle(Vehicle::car(
            LicensePlate::parse("AAA100")?,
            "Toyota",
            "Corolla",
            2025,
            4,
        ))?;
        registry.add_customer(Customer::new(1, "Ann"))?;
        let rented = registry.rent_vehicle("AAA100", 1, date(1), 19.999)?;
        assert_eq!(rented.amount, 20.0);
        registry.return_vehicle("AAA100", 1, date(2), 0.125)?;

        let (reloaded, _) = Registry::open(Stores::in_dir(dir.path()))?;
        assert_eq!(reloaded.history(), registry.history());
        Ok(())
    }

    #[test]
    fn unreadable_store_aborts_the_load() -> Result<()> {
        let dir = tempdir()?;
        // A directory where the vehicle file should be cannot be read as lines.
        fs::create_dir_all(dir.path().join("vehicles.txt"))?;
        assert!(Registry::open(Stores::in_dir(dir.path())).is_err());
        Ok(())
    }
}
