// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access engine configuration.
//!
//! ```toml
//! [engine]
//! arn_namespace = "tollgate"
//! content_resource_types = ["content"]
//! # Replaces the built-in action catalog used for enumeration.
//! action_catalog = ["resource:Read", "resource:Write"]
//! ```

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_NAMESPACE: &str = "tollgate";
const DEFAULT_CONTENT_TYPE: &str = "content";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
	pub arn_namespace: String,
	pub content_resource_types: Vec<String>,
	/// `None` keeps the engine's built-in catalog.
	pub action_catalog: Option<Vec<String>>,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			arn_namespace: DEFAULT_NAMESPACE.to_string(),
			content_resource_types: vec![DEFAULT_CONTENT_TYPE.to_string()],
			action_catalog: None,
		}
	}
}

fn invalid(key: &str, message: String) -> ConfigError {
	ConfigError::InvalidValue {
		key: format!("engine.{key}"),
		message,
	}
}

fn is_identifier(segment: &str) -> bool {
	!segment.is_empty() && !segment.contains([':', '/', '*'])
}

impl EngineConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !is_identifier(&self.arn_namespace) {
			return Err(invalid(
				"arn_namespace",
				format!("'{}' is not a valid namespace", self.arn_namespace),
			));
		}
		if let Some(bad) = self
			.content_resource_types
			.iter()
			.find(|t| !is_identifier(t))
		{
			return Err(invalid(
				"content_resource_types",
				format!("'{bad}' is not a valid resource type"),
			));
		}
		if let Some(catalog) = &self.action_catalog {
			let malformed = catalog.iter().find(|action| {
				action
					.split_once(':')
					.is_none_or(|(service, verb)| !is_identifier(service) || !is_identifier(verb))
			});
			if let Some(bad) = malformed {
				return Err(invalid(
					"action_catalog",
					format!("'{bad}' is not a concrete <service>:<Verb> action"),
				));
			}
		}
		Ok(())
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfigLayer {
	#[serde(default)]
	pub arn_namespace: Option<String>,
	#[serde(default)]
	pub content_resource_types: Option<Vec<String>>,
	#[serde(default)]
	pub action_catalog: Option<Vec<String>>,
}

impl EngineConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.arn_namespace.is_some() {
			self.arn_namespace = other.arn_namespace;
		}
		if other.content_resource_types.is_some() {
			self.content_resource_types = other.content_resource_types;
		}
		if other.action_catalog.is_some() {
			self.action_catalog = other.action_catalog;
		}
	}

	pub fn finalize(self) -> EngineConfig {
		let defaults = EngineConfig::default();
		EngineConfig {
			arn_namespace: self.arn_namespace.unwrap_or(defaults.arn_namespace),
			content_resource_types: self
				.content_resource_types
				.unwrap_or(defaults.content_resource_types),
			action_catalog: self.action_catalog,
		}
	}
}
