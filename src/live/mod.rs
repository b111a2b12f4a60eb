//! Live mode
//!
//! Keeps a snapshot fresh in the background while the dashboard renders. The engine is
//! owned by a single driver task; the interface only ever sees the latest published
//! snapshot.

pub mod driver;

pub use driver::{spawn_driver, DriverHandle, PublishedSnapshot, SnapshotSource};
