//! Dynamic routing: table snapshots, registry-driven locator, refresh.
//!
//! The [`table`] module holds the immutable [`RouteTable`](table::RouteTable)
//! snapshot and prefix matching; [`locator`] builds tables from the registry
//! and swaps them atomically; [`refresh`] turns topology-change
//! notifications into staleness.

pub mod locator;
pub mod refresh;
pub mod table;

pub use locator::RouteLocator;
pub use refresh::{RefreshController, RefreshSignal};
pub use table::{Route, RouteTable};
