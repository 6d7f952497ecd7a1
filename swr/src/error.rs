use thiserror::Error;

/// A boxed, thread-safe error used at the fetch, codec and driver boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by a storage [`Driver`](crate::driver::Driver).
#[derive(Debug, Error)]
pub enum DriverError {
  /// The backend holds no live record for the key.
  #[error("record not found")]
  NotFound,

  /// Any other backend failure (connection, protocol, serialization inside the backend).
  #[error("storage backend failure: {0}")]
  Backend(#[source] BoxError),
}

impl DriverError {
  /// Wraps an arbitrary backend error.
  pub fn backend<E>(err: E) -> Self
  where
    E: Into<BoxError>,
  {
    DriverError::Backend(err.into())
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, DriverError::NotFound)
  }
}

/// Errors reported by a [`Codec`](crate::codec::Codec).
#[derive(Debug, Error)]
pub enum CodecError {
  /// The value could not be represented in the codec's byte format.
  #[error("failed to encode value: {0}")]
  Encode(#[source] BoxError),

  /// The bytes were malformed or did not match the destination's shape.
  #[error("failed to decode value: {0}")]
  Decode(#[source] BoxError),
}

/// The error type returned by [`Cache`](crate::Cache) operations.
///
/// On any error from `Cache::get`, the destination's contents are unspecified
/// and callers must not assume a value was written.
#[derive(Debug, Error)]
pub enum Error {
  /// The caller-supplied fetch function failed. The original error is kept as-is.
  #[error("fetch failed: {0}")]
  Fetch(#[source] BoxError),

  #[error(transparent)]
  Codec(#[from] CodecError),

  /// A driver `set`, re-read or `invalidate` failed on the synchronous path.
  #[error(transparent)]
  Storage(#[from] DriverError),
}

impl Error {
  pub fn is_fetch(&self) -> bool {
    matches!(self, Error::Fetch(_))
  }

  /// Returns the fetch function's own error, if this is a fetch failure.
  pub fn into_fetch_error(self) -> Option<BoxError> {
    match self {
      Error::Fetch(err) => Some(err),
      _ => None,
    }
  }
}

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// Every cache needs a non-empty name to scope its records in the backend.
  #[error("cache name cannot be empty")]
  EmptyName,
  /// A zero lifetime would expire every record the moment it is written.
  #[error("cache '{0}': lifetime cannot be zero")]
  ZeroLifetime(String),
  /// The fresh window must fit inside the lifetime.
  #[error("cache '{name}': fresh window {fresh_for:?} exceeds lifetime {lifetime:?}")]
  FreshExceedsLifetime {
    name: String,
    fresh_for: std::time::Duration,
    lifetime: std::time::Duration,
  },
  /// No storage driver was configured.
  #[error("cache '{0}': a storage driver is required")]
  MissingDriver(String),
}

/// Errors raised when registering caches with a [`Manager`](crate::Manager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
  #[error("a cache named '{0}' is already registered")]
  DuplicateName(String),
}

/// Errors raised while loading a YAML cache configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read configuration file: {0}")]
  Read(#[from] std::io::Error),

  #[error("failed to parse configuration: {0}")]
  Parse(String),

  #[error("invalid duration for '{cache}.{field}': {message}")]
  InvalidDuration {
    cache: String,
    field: &'static str,
    message: String,
  },

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  Registry(#[from] RegistryError),
}

/// A specialized `Result` type for cache operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
