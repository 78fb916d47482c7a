//! Trellis Driver - Connection boundary for the Trellis graph mapper
//!
//! The mapper never talks to a database directly. It goes through the
//! [`Pool`], [`Connection`] and [`Transaction`] traits defined here, which
//! run Cypher text with named parameters and hand back rows of
//! [`trellis_core::Value`]s.
//!
//! [`MemoryPool`] is an in-process implementation that understands the
//! statement shapes the mapper emits. It backs the test suites and local
//! experiments.

#![allow(clippy::result_large_err)]

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{DriverError, DriverResult};
pub use memory::{MemoryConnection, MemoryPool, MemoryTransaction};
pub use traits::{Connection, Pool, Runner, Transaction};
pub use types::{AccessMode, Row, Statement, Summary};
