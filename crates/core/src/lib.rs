#![warn(clippy::all, missing_docs)]

//! Core domain logic for the shipyard design manager.
//!
//! This crate hosts the ordered design and hull catalogs, the obsolescence
//! ledgers layered over them, the file-backed saved design store and the
//! configuration used by the command-line frontend.

pub mod availability;
pub mod catalog;
pub mod config;
pub mod error;
pub mod manifest;
pub mod models;
pub mod save;

pub use availability::{
    Availability, AvailabilityToggles, DisplayedAvailability, UnknownAvailability,
};
pub use catalog::{CatalogSnapshot, DesignCatalog, ObsolescenceMark, OrderedIndex};
pub use config::AppConfig;
pub use error::DesignError;
pub use manifest::DesignManifest;
pub use models::{DesignId, DesignLookup, DesignSummary, SavedDesign};
pub use save::PersistentDesignStore;
