//! Command-line surface over the registry.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use rental_core::{
    Customer, LicensePlate, RecordKind, Registry, RentalRecord, Vehicle, VehicleKind,
};

#[derive(Debug, Parser)]
#[command(name = "rental")]
#[command(about = "Vehicle rental registry backed by flat text stores")]
pub struct Cli {
    /// Directory holding the store files, overriding the configuration
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List vehicles
    Vehicles {
        /// Only vehicles that can be rented now
        #[arg(long)]
        available: bool,
        #[arg(long)]
        json: bool,
    },
    /// List customers
    Customers {
        #[arg(long)]
        json: bool,
    },
    /// Show rental history, optionally filtered
    History {
        #[arg(long)]
        plate: Option<String>,
        #[arg(long)]
        customer: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Register a car
    AddCar {
        #[command(flatten)]
        vehicle: VehicleArgs,
        #[arg(long)]
        seats: u32,
    },
    /// Register a motorcycle
    AddMotorcycle {
        #[command(flatten)]
        vehicle: VehicleArgs,
        /// The motorcycle has a sidecar
        #[arg(long)]
        sidecar: bool,
    },
    /// Register a truck
    AddTruck {
        #[command(flatten)]
        vehicle: VehicleArgs,
        /// Cargo capacity in tonnes
        #[arg(long)]
        capacity: f64,
    },
    /// Register a customer
    AddCustomer {
        #[arg(long)]
        id: u32,
        #[arg(long)]
        name: String,
    },
    /// Rent a vehicle to a customer
    Rent(TransactionArgs),
    /// Return a rented vehicle
    Return(TransactionArgs),
}

#[derive(Debug, Args)]
pub struct VehicleArgs {
    /// Three letters followed by three digits
    #[arg(long, value_parser = LicensePlate::parse)]
    pub plate: LicensePlate,
    #[arg(long)]
    pub make: String,
    #[arg(long)]
    pub model: String,
    #[arg(long)]
    pub year: u16,
}

#[derive(Debug, Args)]
pub struct TransactionArgs {
    #[arg(long)]
    pub plate: String,
    /// Customer id
    #[arg(long)]
    pub customer: u32,
    /// Rental price, or the fee charged on return
    #[arg(long, alias = "fee")]
    pub amount: f64,
    /// Transaction date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

pub fn run(command: Command, registry: &Registry) -> Result<()> {
    match command {
        Command::Vehicles { available, json } => {
            let vehicles = if available {
                registry.available_vehicles()
            } else {
                registry.vehicles()
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&vehicles)?);
            } else {
                vehicles.iter().for_each(|vehicle| println!("{}", vehicle_row(vehicle)));
            }
        }
        Command::Customers { json } => {
            let customers = registry.customers();
            if json {
                println!("{}", serde_json::to_string_pretty(&customers)?);
            } else {
                for customer in &customers {
                    println!("{:>6}  {}", customer.id, customer.name);
                }
            }
        }
        Command::History {
            plate,
            customer,
            json,
        } => {
            let history: Vec<RentalRecord> = match (&plate, customer) {
                (Some(plate), _) => registry
                    .history_for_vehicle(plate)
                    .into_iter()
                    .filter(|record| customer.map_or(true, |id| record.customer_id == id))
                    .collect(),
                (None, Some(id)) => registry.history_for_customer(id),
                (None, None) => registry.history(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                history.iter().for_each(|record| println!("{}", record_row(record)));
            }
        }
        Command::AddCar { vehicle, seats } => {
            add_vehicle(registry, vehicle, VehicleKind::Car { seats })?;
        }
        Command::AddMotorcycle { vehicle, sidecar } => {
            add_vehicle(
                registry,
                vehicle,
                VehicleKind::Motorcycle {
                    has_sidecar: sidecar,
                },
            )?;
        }
        Command::AddTruck { vehicle, capacity } => {
            add_vehicle(
                registry,
                vehicle,
                VehicleKind::Truck {
                    cargo_capacity: capacity,
                },
            )?;
        }
        Command::AddCustomer { id, name } => {
            registry.add_customer(Customer::new(id, name.trim()))?;
            println!("Customer {id} added.");
        }
        Command::Rent(args) => {
            let record = transact(registry, RecordKind::Rent, args)?;
            println!("Vehicle {} rented to {}.", record.plate, record.customer_name);
        }
        Command::Return(args) => {
            let record = transact(registry, RecordKind::Return, args)?;
            println!("Vehicle {} returned by {}.", record.plate, record.customer_name);
        }
    }
    Ok(())
}

fn add_vehicle(registry: &Registry, args: VehicleArgs, kind: VehicleKind) -> Result<()> {
    let vehicle = Vehicle::new(kind, args.plate, args.make.trim(), args.model.trim(), args.year);
    let plate = vehicle.plate.clone();
    registry.add_vehicle(vehicle)?;
    println!("Vehicle {plate} added.");
    Ok(())
}

fn transact(registry: &Registry, kind: RecordKind, args: TransactionArgs) -> Result<RentalRecord> {
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let record = match kind {
        RecordKind::Rent => registry.rent_vehicle(&args.plate, args.customer, date, args.amount)?,
        RecordKind::Return => {
            registry.return_vehicle(&args.plate, args.customer, date, args.amount)?
        }
    };
    Ok(record)
}

fn vehicle_row(vehicle: &Vehicle) -> String {
    let extra = match &vehicle.kind {
        VehicleKind::Car { seats } => format!("{seats} seats"),
        VehicleKind::Motorcycle { has_sidecar: true } => "sidecar".to_string(),
        VehicleKind::Motorcycle { has_sidecar: false } => "no sidecar".to_string(),
        VehicleKind::Truck { cargo_capacity } => format!("{cargo_capacity} t"),
    };
    format!(
        "{:<10} {:<6} {:<12} {:<12} {:<4}  {:<9}  {}",
        vehicle.kind.type_name(),
        vehicle.plate,
        vehicle.make,
        vehicle.model,
        vehicle.year,
        vehicle.status(),
        extra
    )
}

fn record_row(record: &RentalRecord) -> String {
    format!(
        "{}  {:<6} {:<6} {}  ${:.2}",
        record.date, record.kind, record.plate, record.customer_name, record.amount
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rental_core::{MemoryStore, Stores, VehicleStatus};

    fn registry() -> Registry {
        Registry::new(Stores::new(
            MemoryStore::new(),
            MemoryStore::new(),
            MemoryStore::new(),
        ))
    }

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once("rental").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn invalid_plates_are_rejected_at_parse_time() {
        let result = Cli::try_parse_from([
            "rental", "add-car", "--plate", "AB12", "--make", "Fiat", "--model", "Panda",
            "--year", "2020", "--seats", "4",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn commands_drive_the_registry() -> Result<()> {
        let registry = registry();
        run(
            parse(&[
                "add-car", "--plate", "AAA100", "--make", "Toyota", "--model", "Corolla",
                "--year", "2025", "--seats", "4",
            ]),
            &registry,
        )?;
        run(parse(&["add-customer", "--id", "7", "--name", "James Bond"]), &registry)?;
        run(
            parse(&[
                "rent", "--plate", "aaa100", "--customer", "7", "--amount", "100", "--date",
                "2025-03-14",
            ]),
            &registry,
        )?;

        let vehicle = registry.find_vehicle_by_plate("AAA100").unwrap();
        assert_eq!(vehicle.status(), VehicleStatus::Rented);
        assert_eq!(
            registry.history()[0].date,
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
        );

        let again = run(
            parse(&["rent", "--plate", "AAA100", "--customer", "7", "--amount", "100"]),
            &registry,
        );
        assert!(again.is_err());

        run(
            parse(&["return", "--plate", "AAA100", "--customer", "7", "--fee", "25.5"]),
            &registry,
        )?;
        assert_eq!(registry.history()[1].amount, 25.5);
        run(parse(&["history", "--plate", "AAA100", "--json"]), &registry)?;
        Ok(())
    }
}
