// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy documents.
//!
//! Wire format:
//!
//! ```json
//! {
//!   "Version": "2025-01-01",
//!   "Statement": [
//!     {
//!       "Sid": "ReadDocs",
//!       "Effect": "Allow",
//!       "Action": ["content:Read", "content:List"],
//!       "Resource": "content/*",
//!       "Condition": { "IpAddress": { "source_ip": "10.0.0.0/8" } }
//!     }
//!   ]
//! }
//! ```
//!
//! `Action` and `Resource` take a string or an array of strings, and
//! `Statement` a single object or an array. Parsed documents are immutable;
//! every statement keeps the index it had in the raw document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::arn::qualify_resource_pattern;
use crate::condition::ConditionBlock;
use crate::error::{AccessError, Result};
use crate::pattern::PatternSet;
use crate::types::OrgId;

/// Version assumed when a document omits `Version`.
pub const DEFAULT_VERSION: &str = "1";

/// Statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
	Allow,
	Deny,
}

impl fmt::Display for Effect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Effect::Allow => write!(f, "Allow"),
			Effect::Deny => write!(f, "Deny"),
		}
	}
}

impl FromStr for Effect {
	type Err = AccessError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"Allow" => Ok(Effect::Allow),
			"Deny" => Ok(Effect::Deny),
			other => Err(AccessError::InvalidDocument(format!(
				"Effect must be Allow or Deny, got '{other}'"
			))),
		}
	}
}

/// A parsed policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
	/// Position of the statement in its document.
	pub index: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sid: Option<String>,
	pub effect: Effect,
	pub actions: PatternSet,
	pub resources: PatternSet,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub condition: Option<ConditionBlock>,
}

impl Statement {
	/// Builds a statement directly, as done for synthesized grants.
	pub fn new(index: usize, effect: Effect, actions: PatternSet, resources: PatternSet) -> Self {
		Self {
			index,
			sid: None,
			effect,
			actions,
			resources,
			condition: None,
		}
	}

	pub fn with_condition(mut self, condition: ConditionBlock) -> Self {
		self.condition = Some(condition);
		self
	}

	/// Returns a copy whose relative resource patterns are pinned to `org_id`.
	pub fn qualify_resources(&self, namespace: &str, org_id: OrgId) -> Self {
		Self {
			resources: self
				.resources
				.map(|p| qualify_resource_pattern(p, namespace, org_id)),
			..self.clone()
		}
	}

	/// ANDs `extra` onto this statement's condition.
	pub fn restrict(mut self, extra: &ConditionBlock) -> Self {
		if extra.is_empty() {
			return self;
		}
		self.condition = Some(match self.condition {
			Some(existing) => existing.and(extra),
			None => extra.clone(),
		});
		self
	}

	fn from_json(index: usize, value: &Value) -> Result<Self> {
		let fields = value.as_object().ok_or_else(|| {
			AccessError::InvalidDocument(format!("statement {index} must be an object"))
		})?;

		let effect = match fields.get("Effect") {
			None => {
				return Err(AccessError::InvalidDocument(format!(
					"statement {index} is missing Effect"
				)))
			}
			Some(Value::String(s)) => s.parse()?,
			Some(_) => {
				return Err(AccessError::InvalidDocument(format!(
					"statement {index} has a non-string Effect"
				)))
			}
		};

		let sid = match fields.get("Sid") {
			None | Some(Value::Null) => None,
			Some(Value::String(s)) => Some(s.clone()),
			Some(_) => {
				return Err(AccessError::InvalidDocument(format!(
					"statement {index} has a non-string Sid"
				)))
			}
		};

		let actions = PatternSet::new("action", string_list(fields, "Action", index)?)?;
		let resources = PatternSet::new("resource", string_list(fields, "Resource", index)?)?;

		let condition = match fields.get("Condition") {
			None | Some(Value::Null) => None,
			Some(value) => Some(ConditionBlock::from_json(value)?),
		};

		Ok(Self {
			index,
			sid,
			effect,
			actions,
			resources,
			condition,
		})
	}
}

fn string_list(fields: &Map<String, Value>, key: &str, index: usize) -> Result<Vec<String>> {
	let malformed = || {
		AccessError::InvalidDocument(format!(
			"statement {index} {key} must be a string or an array of strings"
		))
	};
	match fields.get(key) {
		None => Err(AccessError::InvalidDocument(format!(
			"statement {index} is missing {key}"
		))),
		Some(Value::String(s)) => Ok(vec![s.clone()]),
		Some(Value::Array(items)) => items
			.iter()
			.map(|item| item.as_str().map(str::to_string).ok_or_else(malformed))
			.collect(),
		Some(_) => Err(malformed()),
	}
}

/// A parsed policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
	pub version: String,
	pub statements: Vec<Statement>,
}

impl PolicyDocument {
	/// Parses a raw JSON policy document.
	pub fn parse(raw: &str) -> Result<Self> {
		let value: Value = serde_json::from_str(raw)
			.map_err(|e| AccessError::InvalidDocument(format!("not valid JSON: {e}")))?;
		Self::from_json(&value)
	}

	pub fn from_json(value: &Value) -> Result<Self> {
		let fields = value
			.as_object()
			.ok_or_else(|| AccessError::InvalidDocument("document must be an object".into()))?;

		let version = match fields.get("Version") {
			None | Some(Value::Null) => DEFAULT_VERSION.to_string(),
			Some(Value::String(s)) => s.clone(),
			Some(_) => {
				return Err(AccessError::InvalidDocument(
					"Version must be a string".into(),
				))
			}
		};

		let statements = match fields.get("Statement") {
			None => {
				return Err(AccessError::InvalidDocument(
					"document is missing Statement".into(),
				))
			}
			Some(Value::Array(items)) => items
				.iter()
				.enumerate()
				.map(|(index, item)| Statement::from_json(index, item))
				.collect::<Result<Vec<_>>>()?,
			Some(single @ Value::Object(_)) => vec![Statement::from_json(0, single)?],
			Some(_) => {
				return Err(AccessError::InvalidDocument(
					"Statement must be an object or an array".into(),
				))
			}
		};

		Ok(Self {
			version,
			statements,
		})
	}

	pub fn statements(&self) -> &[Statement] {
		&self.statements
	}
}
