//! A backend-agnostic caching layer with stale-while-revalidate semantics,
//! tag-based bulk invalidation, and a registry of named caches.
//!
//! # Features
//! - **Three-way freshness policy**: records are fresh, stale (served while one
//!   background refresh runs), or missing (filled synchronously), decided from
//!   the remaining time-to-live the backend reports.
//! - **Refresh de-duplication**: concurrent stale reads of the same key start
//!   at most one background refresh.
//! - **Pluggable storage**: any type implementing [`Driver`] can back a cache.
//!   [`MemoryDriver`](driver::memory::MemoryDriver) ships in the crate.
//! - **Pluggable encoding**: values travel through a serde-based [`Codec`];
//!   `bincode` by default, JSON with the `json` feature.
//! - **Registry and tags**: a [`Manager`] owns named caches and fans out
//!   whole-cache and tag invalidation.
//!
//! ```
//! use fibre_swr::driver::memory::MemoryDriver;
//! use fibre_swr::{CacheBuilder, Manager};
//! use std::convert::Infallible;
//! use std::time::Duration;
//!
//! let manager = Manager::new();
//! manager
//!   .add([CacheBuilder::new("squares")
//!     .fresh_for(Duration::from_secs(1))
//!     .lifetime(Duration::from_secs(3))
//!     .driver(MemoryDriver::new())
//!     .build()
//!     .unwrap()])
//!   .unwrap();
//!
//! let cache = manager.get("squares").unwrap();
//! let mut value = 0u64;
//! cache
//!   .get(12u64, &mut value, |n| Ok::<_, Infallible>(n * n))
//!   .unwrap();
//! assert_eq!(value, 144);
//! ```

// Public modules that form the API
pub mod builder;
pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod key;
pub mod manager;
pub mod metrics;
pub mod runtime;

mod cache;
mod refresh;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use cache::Cache;
pub use codec::{BincodeCodec, Codec};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use config::{CacheConfig, ManagerConfig};
pub use driver::{Driver, Record};
pub use error::{BoxError, BuildError, CodecError, ConfigError, DriverError, Error, RegistryError, Result};
pub use key::{canonicalize, CacheKey};
pub use manager::Manager;
pub use metrics::MetricsSnapshot;
pub use runtime::{TaskSpawner, ThreadSpawner};
#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;
