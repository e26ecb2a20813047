// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grant cache configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Upper bound on how long a cached grant lookup may be served.
pub const MAX_CACHE_TTL_SECS: u64 = 86400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
	pub enabled: bool,
	pub max_ttl_secs: u64,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			max_ttl_secs: 60,
		}
	}
}

impl CacheConfig {
	pub fn max_ttl(&self) -> Duration {
		Duration::from_secs(self.max_ttl_secs)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_ttl_secs > MAX_CACHE_TTL_SECS {
			return Err(ConfigError::InvalidValue {
				key: "cache.max_ttl_secs".to_string(),
				message: format!(
					"{} exceeds the maximum of {MAX_CACHE_TTL_SECS}",
					self.max_ttl_secs
				),
			});
		}
		Ok(())
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfigLayer {
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub max_ttl_secs: Option<u64>,
}

impl CacheConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.max_ttl_secs.is_some() {
			self.max_ttl_secs = other.max_ttl_secs;
		}
	}

	pub fn finalize(self) -> CacheConfig {
		let defaults = CacheConfig::default();
		CacheConfig {
			enabled: self.enabled.unwrap_or(defaults.enabled),
			max_ttl_secs: self.max_ttl_secs.unwrap_or(defaults.max_ttl_secs),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn disabled_by_default() {
		let config = CacheConfigLayer::default().finalize();
		assert!(!config.enabled);
		assert_eq!(config.max_ttl(), Duration::from_secs(60));
	}

	#[test]
	fn rejects_excessive_ttl() {
		let config = CacheConfig {
			enabled: true,
			max_ttl_secs: MAX_CACHE_TTL_SECS + 1,
		};
		assert!(matches!(
			config.validate(),
			Err(ConfigError::InvalidValue { ref key, .. }) if key == "cache.max_ttl_secs"
		));
	}
}
