// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Action names (`<service>:<Verb>`) and the action catalog.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::pattern::has_wildcard;

/// Returns the service part of `<service>:<Verb>`.
pub fn action_service(action: &str) -> Option<&str> {
	action.split_once(':').map(|(service, _)| service)
}

/// Returns the verb part of `<service>:<Verb>`.
pub fn action_verb(action: &str) -> Option<&str> {
	action.split_once(':').map(|(_, verb)| verb)
}

/// The known concrete actions of a deployment.
///
/// Enumeration of effective permissions needs a finite action universe to
/// expand wildcard grants against; the catalog provides it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionCatalog(BTreeSet<String>);

impl ActionCatalog {
	pub fn new(actions: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self(
			actions
				.into_iter()
				.map(Into::into)
				.filter(|a: &String| !has_wildcard(a) && action_verb(a).is_some())
				.collect(),
		)
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	pub fn contains(&self, action: &str) -> bool {
		self.0.contains(action)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Adds an action. Wildcards and names without a verb are ignored.
	pub fn insert(&mut self, action: impl Into<String>) {
		let action = action.into();
		if !has_wildcard(&action) && action_verb(&action).is_some() {
			self.0.insert(action);
		}
	}
}

impl Default for ActionCatalog {
	fn default() -> Self {
		Self::new([
			"resource:Read",
			"resource:List",
			"resource:Write",
			"resource:Delete",
			"resource:Share",
			"content:Read",
			"content:List",
			"content:Update",
			"content:Comment",
			"content:Delete",
			"content:ManageCollaborators",
			"policy:Read",
			"policy:List",
			"policy:Attach",
			"policy:Detach",
			"role:Read",
			"role:List",
			"role:Assume",
			"group:Read",
			"group:List",
			"group:ManageMembers",
		])
	}
}
