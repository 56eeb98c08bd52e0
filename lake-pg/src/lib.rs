//! Engine boundary of the BemiDB gateway.
//!
//! The analytical engine is treated as an opaque SQL executor behind the
//! [`LakeEngine`] trait; this crate also owns the mapping from engine
//! column types to Postgres OIDs and the textual row encoding used on the
//! wire.

pub mod datatypes;
pub mod encoder;
pub mod engine;
pub mod row_encoder;
pub mod value;

#[cfg(feature = "duckdb")]
pub mod duck;

#[cfg(feature = "mock")]
pub mod mock;

pub use engine::{EngineError, EngineResult, LakeEngine, PreparedQuery, QueryResult};
pub use value::{EngineColumn, EngineValue};

/// re-export for downstream crates
pub use pgwire;
