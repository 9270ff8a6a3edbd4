//! # DataChain Core
//!
//! Core building blocks of the DataChain dataset marketplace: content
//! protection, the dataset registry, access tokens, catalog sources and the
//! marketplace flows that tie them to external storage and chain services.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod external;
pub mod fixtures;
pub mod marketplace;
pub mod models;
pub mod query;
pub mod registry;
pub mod sources;

/// Re-export common types for ease of use
pub use config::CoreConfig;
pub use crypto::{AccessTokenIssuer, ContentProtector, EncryptionEnvelope};
pub use error::{CoreError, ErrorKind, Result};
pub use external::{BlobStore, ChainService, MemoryBlobStore};
pub use marketplace::{Marketplace, UploadRequest};
pub use models::{AccessStatus, DatasetRecord, NewDataset};
pub use query::{DatasetQuery, SortBy};
pub use registry::{DatasetRegistry, RegistryStats};

/// Version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging
///
/// `RUST_LOG` takes precedence over the configured level. Calling this more
/// than once is harmless.
pub fn init_logging(config: &CoreConfig) {
    let mut builder = env_logger::Builder::new();
    match std::env::var("RUST_LOG") {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) => {
            builder.parse_filters(&config.log_level);
        }
    }
    if builder.try_init().is_ok() {
        log::debug!("Logging initialized for datachain-core {}", VERSION);
    }
}
