// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for access resolution.

use thiserror::Error;

use crate::types::PolicyId;

/// Result type for access-core operations.
pub type Result<T> = std::result::Result<T, AccessError>;

/// Errors raised while parsing policies or resolving identifiers.
///
/// None of these are raised by the decision procedure itself: at evaluation
/// time every error degrades to a Deny decision instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
	#[error("invalid policy document: {0}")]
	InvalidDocument(String),

	#[error("empty {0} pattern set")]
	EmptyPatternSet(&'static str),

	#[error("invalid pattern '{0}'")]
	InvalidPattern(String),

	#[error("invalid resource identifier '{0}'")]
	InvalidResource(String),

	#[error("policy {0} is system-managed and cannot be detached or deleted")]
	SystemPolicy(PolicyId),

	#[error("access denied: {0}")]
	Denied(String),
}

impl AccessError {
	/// Returns true for errors that indicate a malformed policy configuration.
	///
	/// These are surfaced at policy attach/update time.
	pub fn is_configuration_error(&self) -> bool {
		matches!(
			self,
			AccessError::InvalidDocument(_)
				| AccessError::EmptyPatternSet(_)
				| AccessError::InvalidPattern(_)
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn configuration_errors_are_classified() {
		assert!(AccessError::InvalidDocument("x".into()).is_configuration_error());
		assert!(AccessError::EmptyPatternSet("action").is_configuration_error());
		assert!(AccessError::InvalidPattern(String::new()).is_configuration_error());
		assert!(!AccessError::InvalidResource("x".into()).is_configuration_error());
		assert!(!AccessError::Denied("no".into()).is_configuration_error());
	}

	#[test]
	fn messages_name_the_problem() {
		let err = AccessError::EmptyPatternSet("resource");
		assert_eq!(err.to_string(), "empty resource pattern set");
	}
}
