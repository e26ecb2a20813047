// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource identifiers.
//!
//! Every governable resource is named by an ARN of the form
//! `arn:<namespace>:<service>:<organization>:<type>/<id>`. Callers may also
//! use the relative `<type>/<id>` form, which is qualified with the
//! deployment namespace and the caller's organization.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AccessError, Result};
use crate::pattern::has_wildcard;
use crate::types::OrgId;

/// Default ARN namespace.
pub const DEFAULT_NAMESPACE: &str = "tollgate";

const ARN_PREFIX: &str = "arn:";

/// A concrete (wildcard-free) resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResourceName {
	namespace: String,
	service: String,
	org_id: OrgId,
	resource_type: String,
	resource_id: String,
}

impl ResourceName {
	pub fn new(
		namespace: impl Into<String>,
		org_id: OrgId,
		resource_type: impl Into<String>,
		resource_id: impl Into<String>,
	) -> Self {
		let resource_type = resource_type.into();
		Self {
			namespace: namespace.into(),
			service: resource_type.clone(),
			org_id,
			resource_type,
			resource_id: resource_id.into(),
		}
	}

	/// Parses a full ARN.
	pub fn parse_arn(raw: &str) -> Result<Self> {
		let invalid = || AccessError::InvalidResource(raw.to_string());

		if has_wildcard(raw) {
			return Err(invalid());
		}
		let rest = raw.strip_prefix(ARN_PREFIX).ok_or_else(invalid)?;
		let mut parts = rest.splitn(4, ':');
		let namespace = parts.next().ok_or_else(invalid)?;
		let service = parts.next().ok_or_else(invalid)?;
		let org = parts.next().ok_or_else(invalid)?;
		let path = parts.next().ok_or_else(invalid)?;
		let (resource_type, resource_id) = split_path(path).ok_or_else(invalid)?;

		if namespace.is_empty() || service.is_empty() {
			return Err(invalid());
		}
		let org_id: OrgId = org.parse().map_err(|_| invalid())?;

		Ok(Self {
			namespace: namespace.to_string(),
			service: service.to_string(),
			org_id,
			resource_type: resource_type.to_string(),
			resource_id: resource_id.to_string(),
		})
	}

	/// Resolves a full ARN or a relative `<type>/<id>` name.
	///
	/// Relative names are qualified with `namespace` and `org_id`; the service
	/// segment defaults to the resource type.
	pub fn resolve(raw: &str, namespace: &str, org_id: OrgId) -> Result<Self> {
		if raw.starts_with(ARN_PREFIX) {
			return Self::parse_arn(raw);
		}
		if has_wildcard(raw) {
			return Err(AccessError::InvalidResource(raw.to_string()));
		}
		let (resource_type, resource_id) =
			split_path(raw).ok_or_else(|| AccessError::InvalidResource(raw.to_string()))?;
		Ok(Self::new(namespace, org_id, resource_type, resource_id))
	}

	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	pub fn service(&self) -> &str {
		&self.service
	}

	pub fn org_id(&self) -> OrgId {
		self.org_id
	}

	pub fn resource_type(&self) -> &str {
		&self.resource_type
	}

	pub fn resource_id(&self) -> &str {
		&self.resource_id
	}
}

fn split_path(path: &str) -> Option<(&str, &str)> {
	let (resource_type, resource_id) = path.split_once('/')?;
	if resource_type.is_empty() || resource_id.is_empty() || resource_type.contains(':') {
		return None;
	}
	Some((resource_type, resource_id))
}

impl fmt::Display for ResourceName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"arn:{}:{}:{}:{}/{}",
			self.namespace, self.service, self.org_id, self.resource_type, self.resource_id
		)
	}
}

impl From<ResourceName> for String {
	fn from(name: ResourceName) -> Self {
		name.to_string()
	}
}

impl TryFrom<String> for ResourceName {
	type Error = AccessError;

	fn try_from(raw: String) -> Result<Self> {
		Self::parse_arn(&raw)
	}
}

/// Qualifies a resource pattern from a policy document.
///
/// Full ARN patterns and the bare `*` pass through. Relative patterns
/// (`resource/123`, `resource/*`) are pinned to the policy's organization so
/// that they can never match a resource of another organization.
pub fn qualify_resource_pattern(pattern: &str, namespace: &str, org_id: OrgId) -> String {
	if pattern == "*" || pattern.starts_with(ARN_PREFIX) {
		return pattern.to_string();
	}
	let service = pattern
		.split_once('/')
		.map(|(ty, _)| ty)
		.unwrap_or(pattern);
	format!("arn:{namespace}:{service}:{org_id}:{pattern}")
}
