//! connpool core - shared traits and types for connection pooling
//!
//! This crate defines what every other connpool crate depends on:
//!
//! - `ResourceHandle` - a native connection owned by the pool
//! - `Driver` - opens native handles; looked up through `DriverRegistry`
//! - `ConfigSource` - key/value lookup supplying pool parameters
//! - `PoolError` - the error taxonomy for initialize/acquire/release/destroy
//! - `Value`, `Row`, `QueryResult` - data exchanged through a connection

pub mod config;
mod error;
mod handle;
mod registry;
mod types;

pub use config::{ConfigSource, Properties};
pub use error::*;
pub use handle::*;
pub use registry::DriverRegistry;
pub use types::*;
