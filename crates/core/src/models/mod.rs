//! Shared domain models.

use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static PLATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{3}[0-9]{3}$").expect("invalid plate regex"));

/// Reasons a licence plate is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlateError {
    /// The plate was empty.
    #[error("licence plate must not be empty")]
    Empty,
    /// The plate was not three letters followed by three digits.
    #[error("licence plate {0:?} must be three letters followed by three digits")]
    Format(String),
}

/// Validated licence plate. Equality ignores ASCII case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicensePlate(String);

impl LicensePlate {
    /// Validate `value` as a plate, keeping the caller's casing.
    pub fn parse(value: &str) -> Result<Self, PlateError> {
        if value.is_empty() {
            return Err(PlateError::Empty);
        }
        if !PLATE_RE.is_match(value) {
            return Err(PlateError::Format(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Borrow the plate text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against raw user input.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl PartialEq for LicensePlate {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for LicensePlate {}

impl fmt::Display for LicensePlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LicensePlate {
    type Error = PlateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LicensePlate> for String {
    fn from(plate: LicensePlate) -> Self {
        plate.0
    }
}

/// Whether a vehicle can currently be rented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    /// On the lot.
    Available,
    /// Out with a customer.
    Rented,
}

impl VehicleStatus {
    /// Token used in the vehicle store.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Rented => "RENTED",
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific payload of a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VehicleKind {
    /// Passenger car.
    Car {
        /// Number of seats.
        seats: u32,
    },
    /// Motorcycle, optionally with a sidecar.
    Motorcycle {
        /// Whether a sidecar is fitted.
        has_sidecar: bool,
    },
    /// Truck with a payload rating.
    Truck {
        /// Cargo capacity in tonnes.
        cargo_capacity: f64,
    },
}

impl VehicleKind {
    /// Type name written as the first field of a vehicle line.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Car { .. } => "Car",
            Self::Motorcycle { .. } => "Motorcycle",
            Self::Truck { .. } => "Truck",
        }
    }
}

/// A rentable vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Unique licence plate.
    pub plate: LicensePlate,
    /// Manufacturer.
    pub make: String,
    /// Model name.
    pub model: String,
    /// Model year.
    pub year: u16,
    /// Variant payload.
    #[serde(flatten)]
    pub kind: VehicleKind,
    status: VehicleStatus,
}

impl Vehicle {
    /// Build an available vehicle of the given kind.
    pub fn new(
        kind: VehicleKind,
        plate: LicensePlate,
        make: impl Into<String>,
        model: impl Into<String>,
        year: u16,
    ) -> Self {
        Self {
            plate,
            make: make.into(),
            model: model.into(),
            year,
            kind,
            status: VehicleStatus::Available,
        }
    }

    /// Build an available car.
    pub fn car(
        plate: LicensePlate,
        make: impl Into<String>,
        model: impl Into<String>,
        year: u16,
        seats: u32,
    ) -> Self {
        Self::new(VehicleKind::Car { seats }, plate, make, model, year)
    }

    /// Build an available motorcycle.
    pub fn motorcycle(
        plate: LicensePlate,
        make: impl Into<String>,
        model: impl Into<String>,
        year: u16,
        has_sidecar: bool,
    ) -> Self {
        Self::new(VehicleKind::Motorcycle { has_sidecar }, plate, make, model, year)
    }

    /// Build an available truck.
    pub fn truck(
        plate: LicensePlate,
        make: impl Into<String>,
        model: impl Into<String>,
        year: u16,
        cargo_capacity: f64,
    ) -> Self {
        Self::new(VehicleKind::Truck { cargo_capacity }, plate, make, model, year)
    }

    /// Current rental status.
    pub fn status(&self) -> VehicleStatus {
        self.status
    }

    pub(crate) fn with_status(mut self, status: VehicleStatus) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn set_status(&mut self, status: VehicleStatus) {
        self.status = status;
    }
}

/// A registered customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Unique customer number.
    pub id: u32,
    /// Display name, also used to reference the customer from rental records.
    pub name: String,
}

impl Customer {
    /// Build a customer.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Direction of a rental transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    /// Vehicle handed to a customer.
    Rent,
    /// Vehicle brought back.
    Return,
}

impl RecordKind {
    /// Token used in the record store.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rent => "RENT",
            Self::Return => "RETURN",
        }
    }

    /// Status a vehicle must have for this transaction to be accepted.
    pub fn required_status(self) -> VehicleStatus {
        match self {
            Self::Rent => VehicleStatus::Available,
            Self::Return => VehicleStatus::Rented,
        }
    }

    /// Status a vehicle has once this transaction is applied.
    pub fn resulting_status(self) -> VehicleStatus {
        match self {
            Self::Rent => VehicleStatus::Rented,
            Self::Return => VehicleStatus::Available,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the rental history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalRecord {
    /// RENT or RETURN.
    pub kind: RecordKind,
    /// Plate of the vehicle involved.
    pub plate: LicensePlate,
    /// Id of the customer involved.
    pub customer_id: u32,
    /// Customer name as written to the record store.
    pub customer_name: String,
    /// Transaction date.
    pub date: NaiveDate,
    /// Rental price or return fee, in whole cents.
    pub amount: f64,
}

impl RentalRecord {
    /// Build a record referencing `vehicle` and `customer`. The amount is
    /// rounded to cents, the precision the record store keeps.
    pub fn new(
        kind: RecordKind,
        vehicle: &Vehicle,
        customer: &Customer,
        date: NaiveDate,
        amount: f64,
    ) -> Self {
        Self {
            kind,
            plate: vehicle.plate.clone(),
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            date,
            amount: (amount * 100.0).round() / 100.0,
        }
    }
}
