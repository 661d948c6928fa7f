//! Ordered design catalogs and obsolescence tracking.

/// Session catalog combining design/hull order with obsolescence decisions.
pub mod designs;
/// Obsolescence marks and the shared event counter.
pub mod ledger;
/// Ordered registry with constant-time reordering.
pub mod ordered;

pub use designs::{CatalogSnapshot, DesignCatalog, MarkedEntry};
pub use ledger::{EventCounter, EventOrdinal, ObsolescenceLedger, ObsolescenceMark};
pub use ordered::OrderedIndex;
