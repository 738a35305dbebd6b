//! Line codec for the vehicle, customer and rental-record stores.
//!
//! Each entity maps to exactly one line. Decoding never panics; a line that
//! cannot be decoded yields a [`DecodeError`] and the caller decides whether to
//! skip it.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::models::{
    Customer, LicensePlate, PlateError, RecordKind, RentalRecord, Vehicle, VehicleKind,
    VehicleStatus,
};

const VEHICLE_FIELDS: usize = 7;
const CUSTOMER_FIELDS: usize = 2;
const RECORD_FIELDS: usize = 5;

/// Separator between customer and record fields.
const FIELD_SEPARATOR: &str = " | ";

const CUSTOMER_ID_LABEL: &str = "Customer ID:";
const NAME_LABEL: &str = "Name:";
const PLATE_LABEL: &str = "Plate:";
const CUSTOMER_LABEL: &str = "Customer:";
const DATE_LABEL: &str = "Date:";
const AMOUNT_LABEL: &str = "Amount:";

const DATE_FORMAT: &str = "%Y-%m-%d";

static VEHICLE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\|\s*").expect("invalid separator regex"));

/// Why a persisted line could not be turned back into an entity.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    /// The line did not split into the expected number of fields.
    #[error("expected {expected} fields, found {found}")]
    FieldCount {
        /// Fields required by the format.
        expected: usize,
        /// Fields present in the line.
        found: usize,
    },
    /// First vehicle field was not a known type.
    #[error("unknown vehicle type {0:?}")]
    UnknownVehicleType(String),
    /// Status field was neither AVAILABLE nor RENTED.
    #[error("unknown vehicle status {0:?}")]
    UnknownStatus(String),
    /// First record field was neither RENT nor RETURN.
    #[error("unknown record kind {0:?}")]
    UnknownRecordKind(String),
    /// A labelled field did not start with its label.
    #[error("field {field:?} is missing label {label:?}")]
    MissingLabel {
        /// Expected label.
        label: &'static str,
        /// Raw field text.
        field: String,
    },
    /// A field could not be parsed as its type.
    #[error("invalid {field} {value:?}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Raw field text.
        value: String,
    },
    /// The line was not valid UTF-8.
    #[error("line is not valid UTF-8")]
    NotUtf8,
    /// The plate field failed validation.
    #[error(transparent)]
    Plate(#[from] PlateError),
    /// A record referenced a plate that is not registered.
    #[error("no vehicle with plate {0}")]
    UnknownVehicle(String),
    /// A record referenced a customer name that is not registered.
    #[error("no customer named {0:?}")]
    UnknownCustomer(String),
}

/// Why an entity cannot be written as a line.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EncodeError {
    /// A text field was blank or would break the line format.
    #[error("{field} {value:?} must be non-blank and contain no '|' or line breaks")]
    Field {
        /// Name of the field.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// Amounts must be finite and non-negative.
    #[error("amount {0} must be a finite, non-negative number")]
    Amount(f64),
}

/// A decoded rental record whose vehicle and customer have not been resolved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLine {
    /// RENT or RETURN.
    pub kind: RecordKind,
    /// Referenced plate.
    pub plate: LicensePlate,
    /// Referenced customer name.
    pub customer_name: String,
    /// Transaction date.
    pub date: NaiveDate,
    /// Transaction amount.
    pub amount: f64,
}

/// Encode a vehicle as `<Type> | <Plate> | <Make> | <Model> | <Year> | <Status> | <Extra> |`.
pub fn encode_vehicle(vehicle: &Vehicle) -> Result<String, EncodeError> {
    check_text("make", &vehicle.make)?;
    check_text("model", &vehicle.model)?;
    let extra = match &vehicle.kind {
        VehicleKind::Car { seats } => seats.to_string(),
        VehicleKind::Motorcycle { has_sidecar } => has_sidecar.to_string(),
        VehicleKind::Truck { cargo_capacity } => {
            if !cargo_capacity.is_finite() {
                return Err(EncodeError::Field {
                    field: "cargo capacity",
                    value: cargo_capacity.to_string(),
                });
            }
            cargo_capacity.to_string()
        }
    };
    Ok(format!(
        "{} | {} | {} | {} | {} | {} | {} |",
        vehicle.kind.type_name(),
        vehicle.plate,
        vehicle.make,
        vehicle.model,
        vehicle.year,
        vehicle.status(),
        extra
    ))
}

/// Decode one vehicle-store line, tolerating optional `|` padding at either end.
pub fn decode_vehicle(line: &str) -> Result<Vehicle, DecodeError> {
    let body = line.trim();
    let body = body.strip_prefix('|').unwrap_or(body).trim_start();
    let body = body.strip_suffix('|').unwrap_or(body).trim_end();

    let parts: Vec<&str> = VEHICLE_SEPARATOR.split(body).collect();
    if parts.len() != VEHICLE_FIELDS {
        return Err(DecodeError::FieldCount {
            expected: VEHICLE_FIELDS,
            found: parts.len(),
        });
    }

    let plate = LicensePlate::parse(parts[1])?;
    let year = parse_value::<u16>("year", parts[4])?;
    let status = parse_status(parts[5])?;
    let extra = parts[6];

    let kind = if parts[0].eq_ignore_ascii_case("car") {
        VehicleKind::Car {
            seats: parse_value("seat count", extra)?,
        }
    } else if parts[0].eq_ignore_ascii_case("motorcycle") {
        VehicleKind::Motorcycle {
            has_sidecar: parse_bool("sidecar flag", extra)?,
        }
    } else if parts[0].eq_ignore_ascii_case("truck") {
        let cargo_capacity = parse_value::<f64>("cargo capacity", extra)?;
        if !cargo_capacity.is_finite() {
            return Err(invalid("cargo capacity", extra));
        }
        VehicleKind::Truck { cargo_capacity }
    } else {
        return Err(DecodeError::UnknownVehicleType(parts[0].to_string()));
    };

    Ok(Vehicle::new(kind, plate, parts[2], parts[3], year).with_status(status))
}

/// Encode a customer as `Customer ID: <id> | Name: <name>`.
pub fn encode_customer(customer: &Customer) -> Result<String, EncodeError> {
    check_text("name", &customer.name)?;
    Ok(format!(
        "{CUSTOMER_ID_LABEL} {}{FIELD_SEPARATOR}{NAME_LABEL} {}",
        customer.id, customer.name
    ))
}

/// Decode one customer-store line.
pub fn decode_customer(line: &str) -> Result<Customer, DecodeError> {
    let parts = split_fields(line, CUSTOMER_FIELDS)?;
    let id = parse_value("customer id", strip_label(parts[0], CUSTOMER_ID_LABEL)?)?;
    let name = strip_label(parts[1], NAME_LABEL)?;
    if name.is_empty() {
        return Err(invalid("customer name", name));
    }
    Ok(Customer::new(id, name))
}

/// Encode a record as
/// `<KIND> | Plate: <plate> | Customer: <name> | Date: <date> | Amount: $<amount>`.
pub fn encode_record(record: &RentalRecord) -> Result<String, EncodeError> {
    check_text("customer name", &record.customer_name)?;
    check_amount(record.amount)?;
    let fields = [
        record.kind.to_string(),
        format!("{PLATE_LABEL} {}", record.plate),
        format!("{CUSTOMER_LABEL} {}", record.customer_name),
        format!("{DATE_LABEL} {}", record.date.format(DATE_FORMAT)),
        format!("{AMOUNT_LABEL} ${:.2}", record.amount),
    ];
    Ok(fields.join(FIELD_SEPARATOR))
}

/// Decode one record-store line. The result still has to be resolved against
/// the registered vehicles and customers.
pub fn decode_record(line: &str) -> Result<RecordLine, DecodeError> {
    let parts = split_fields(line, RECORD_FIELDS)?;

    let kind_text = parts[0].trim();
    let kind = if kind_text.eq_ignore_ascii_case("rent") {
        RecordKind::Rent
    } else if kind_text.eq_ignore_ascii_case("return") {
        RecordKind::Return
    } else {
        return Err(DecodeError::UnknownRecordKind(kind_text.to_string()));
    };

    let plate = LicensePlate::parse(strip_label(parts[1], PLATE_LABEL)?)?;
    let customer_name = strip_label(parts[2], CUSTOMER_LABEL)?.to_string();

    let date_text = strip_label(parts[3], DATE_LABEL)?;
    let date = NaiveDate::parse_from_str(date_text, DATE_FORMAT)
        .map_err(|_| invalid("date", date_text))?;

    let amount_text = strip_label(parts[4], AMOUNT_LABEL)?;
    let amount_text = amount_text.strip_prefix('$').unwrap_or(amount_text).trim();
    let amount = parse_value::<f64>("amount", amount_text)?;
    if check_amount(amount).is_err() {
        return Err(invalid("amount", amount_text));
    }

    Ok(RecordLine {
        kind,
        plate,
        customer_name,
        date,
        amount,
    })
}

fn split_fields(line: &str, expected: usize) -> Result<Vec<&str>, DecodeError> {
    let parts: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(FIELD_SEPARATOR).collect();
    if parts.len() != expected {
        return Err(DecodeError::FieldCount {
            expected,
            found: parts.len(),
        });
    }
    Ok(parts)
}

fn strip_label<'a>(field: &'a str, label: &'static str) -> Result<&'a str, DecodeError> {
    field
        .trim()
        .strip_prefix(label)
        .map(str::trim)
        .ok_or_else(|| DecodeError::MissingLabel {
            label,
            field: field.to_string(),
        })
}

fn parse_status(value: &str) -> Result<VehicleStatus, DecodeError> {
    match value {
        "AVAILABLE" => Ok(VehicleStatus::Available),
        "RENTED" => Ok(VehicleStatus::Rented),
        other => Err(DecodeError::UnknownStatus(other.to_string())),
    }
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, DecodeError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(invalid(field, value))
    }
}

fn parse_value<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, DecodeError> {
    value.trim().parse().map_err(|_| invalid(field, value))
}

fn invalid(field: &'static str, value: &str) -> DecodeError {
    DecodeError::InvalidValue {
        field,
        value: value.to_string(),
    }
}

fn check_text(field: &'static str, value: &str) -> Result<(), EncodeError> {
    let blank = value.trim().is_empty();
    let breaks_format = value.contains(['|', '\n', '\r']);
    // Decoding trims fields, so surrounding whitespace would not survive a reload.
    if blank || breaks_format || value.trim() != value {
        return Err(EncodeError::Field {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_amount(amount: f64) -> Result<(), EncodeError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(EncodeError::Amount(amount))
    }
}
