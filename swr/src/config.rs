//! Cache configuration, in code and from YAML.
//!
//! A manager's caches can be described in a file:
//!
//! ```yaml
//! caches:
//!   users:
//!     fresh_for: 1m
//!     lifetime: 5m
//!     tags: [accounts]
//!   sessions:
//!     fresh_for: 30s
//!     lifetime: 30s
//! ```
//!
//! Durations use `humantime` syntax. The raw document is parsed first and then
//! validated into [`ManagerConfig`].

use crate::error::{BuildError, ConfigError};

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// The freshness policy and tags of a single cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
  /// How long after a write a record is served without refreshing.
  pub fresh_for: Duration,
  /// The total lifetime of a record in the backend.
  pub lifetime: Duration,
  /// Labels used for group invalidation.
  pub tags: BTreeSet<String>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      fresh_for: Duration::from_secs(60),
      lifetime: Duration::from_secs(300),
      tags: BTreeSet::new(),
    }
  }
}

impl CacheConfig {
  pub fn new(fresh_for: Duration, lifetime: Duration) -> Self {
    Self {
      fresh_for,
      lifetime,
      tags: BTreeSet::new(),
    }
  }

  pub fn with_tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.tags.extend(tags.into_iter().map(Into::into));
    self
  }

  /// Remaining-TTL cutoff between fresh and stale records.
  #[inline]
  pub fn soft_threshold(&self) -> Duration {
    self.lifetime.saturating_sub(self.fresh_for)
  }

  /// Checks the invariants a cache named `name` relies on.
  pub fn validate(&self, name: &str) -> Result<(), BuildError> {
    if name.is_empty() {
      return Err(BuildError::EmptyName);
    }
    if self.lifetime.is_zero() {
      return Err(BuildError::ZeroLifetime(name.to_owned()));
    }
    if self.fresh_for > self.lifetime {
      return Err(BuildError::FreshExceedsLifetime {
        name: name.to_owned(),
        fresh_for: self.fresh_for,
        lifetime: self.lifetime,
      });
    }
    Ok(())
  }
}

// --- Raw document ---

#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
struct ManagerConfigRaw {
  #[serde(default)]
  caches: BTreeMap<String, CacheConfigRaw>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct CacheConfigRaw {
  fresh_for: String,
  lifetime: String,
  #[serde(default)]
  tags: Vec<String>,
}

// --- Processed ---

/// Validated configuration for every cache a manager should own.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ManagerConfig {
  pub caches: BTreeMap<String, CacheConfig>,
}

impl ManagerConfig {
  pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
    let raw: ManagerConfigRaw = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
    process_raw_config(raw)
  }

  pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
    let raw: ManagerConfigRaw =
      serde_yaml::from_reader(reader).map_err(|e| ConfigError::Parse(e.to_string()))?;
    process_raw_config(raw)
  }

  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let file = File::open(path)?;
    Self::from_reader(io::BufReader::new(file))
  }
}

fn parse_duration(cache: &str, field: &'static str, value: &str) -> Result<Duration, ConfigError> {
  humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidDuration {
    cache: cache.to_owned(),
    field,
    message: e.to_string(),
  })
}

fn process_raw_config(raw: ManagerConfigRaw) -> Result<ManagerConfig, ConfigError> {
  let mut caches = BTreeMap::new();
  for (name, raw_cache) in raw.caches {
    let config = CacheConfig {
      fresh_for: parse_duration(&name, "fresh_for", &raw_cache.fresh_for)?,
      lifetime: parse_duration(&name, "lifetime", &raw_cache.lifetime)?,
      tags: raw_cache.tags.into_iter().collect(),
    };
    config.validate(&name)?;
    caches.insert(name, config);
  }
  Ok(ManagerConfig { caches })
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use std::io::Write;

  const SAMPLE: &str = r#"
caches:
  users:
    fresh_for: 1m
    lifetime: 5m
    tags: [accounts, people]
  sessions:
    fresh_for: 30s
    lifetime: 30s
"#;

  #[test]
  fn parses_caches_with_humantime_durations() {
    let config = ManagerConfig::from_yaml_str(SAMPLE).unwrap();
    assert_eq!(config.caches.len(), 2);

    let users = &config.caches["users"];
    assert_eq!(users.fresh_for, Duration::from_secs(60));
    assert_eq!(users.lifetime, Duration::from_secs(300));
    assert_eq!(
      users.tags,
      ["accounts", "people"].into_iter().map(String::from).collect::<BTreeSet<_>>()
    );

    let sessions = &config.caches["sessions"];
    assert_eq!(sessions.soft_threshold(), Duration::ZERO);
    assert!(sessions.tags.is_empty());
  }

  #[test]
  fn empty_document_has_no_caches() {
    let config = ManagerConfig::from_yaml_str("{}").unwrap();
    assert!(config.caches.is_empty());
  }

  #[test]
  fn rejects_bad_durations() {
    let err = ManagerConfig::from_yaml_str("caches:\n  c:\n    fresh_for: soon\n    lifetime: 1s\n").unwrap_err();
    match err {
      ConfigError::InvalidDuration { cache, field, .. } => {
        assert_eq!(cache, "c");
        assert_eq!(field, "fresh_for");
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn rejects_fresh_window_longer_than_lifetime() {
    let err = ManagerConfig::from_yaml_str("caches:\n  c:\n    fresh_for: 10s\n    lifetime: 1s\n").unwrap_err();
    assert!(matches!(
      err,
      ConfigError::Build(BuildError::FreshExceedsLifetime { .. })
    ));
  }

  #[test]
  fn rejects_unknown_fields() {
    let err = ManagerConfig::from_yaml_str("caches:\n  c:\n    fresh_for: 1s\n    lifetime: 1s\n    ttl: 3s\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
  }

  #[test]
  fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SAMPLE.as_bytes()).unwrap();
    let config = ManagerConfig::from_file(file.path()).unwrap();
    assert!(config.caches.contains_key("users"));
  }

  #[test]
  fn missing_file_is_a_read_error() {
    let err = ManagerConfig::from_file(Path::new("/definitely/not/here.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read(_)));
  }

  #[test]
  fn validate_checks_name_and_lifetime() {
    let config = CacheConfig::new(Duration::ZERO, Duration::ZERO);
    assert_eq!(config.validate(""), Err(BuildError::EmptyName));
    assert_eq!(config.validate("c"), Err(BuildError::ZeroLifetime("c".into())));
    assert!(CacheConfig::new(Duration::from_secs(3), Duration::from_secs(3))
      .validate("c")
      .is_ok());
  }
}
