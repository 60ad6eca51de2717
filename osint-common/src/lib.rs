//! # OSINT Common Library
//!
//! Shared code for the identity-lookup aggregator:
//! - Error type and result alias
//! - Configuration loading (TOML + environment)
//! - Query classification
//! - Partial and aggregated record value types
//! - Storage gateway over SQLite or PostgreSQL, with a degraded mode

pub mod config;
pub mod error;
pub mod query;
pub mod record;
pub mod storage;
pub mod time;

pub use error::{Error, Result};
pub use query::{Query, QueryType};
pub use record::{AggregatedRecord, Confidence, LeakEntry, PartialRecord};
pub use storage::StorageGateway;
