//! adminkit core - shared data structures, capability traits and infrastructure
//!
//! Everything the state containers, the HTTP adapter and the command line front end
//! agree on lives here: domain types, the `ConsoleApi` / `CredentialSource` /
//! `KeyValueStore` seams, the error taxonomy, configuration and logging.

pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tracing;
