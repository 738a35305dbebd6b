#![warn(clippy::all, missing_docs)]

//! Core persistence and reconciliation layer for the vehicle rental registry.
//!
//! This crate hosts the domain models, the line codec for the three
//! append-only stores, the in-memory registry, the startup loader that
//! replays rental history, and configuration handling used by the CLI.

pub mod codec;
pub mod config;
pub mod loader;
pub mod models;
pub mod registry;
pub mod store;

pub use config::AppConfig;
pub use loader::{LoadReport, Loader};
pub use models::{
    Customer, LicensePlate, PlateError, RecordKind, RentalRecord, Vehicle, VehicleKind,
    VehicleStatus,
};
pub use registry::{Registry, RegistryError};
pub use store::{FileStore, LineStore, MemoryStore, StoreKind, StoredLine, Stores};
