// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Statement conditions.
//!
//! A condition block is a small interpreted predicate structure: a list of
//! `(operator, key, expected values)` clauses. There is no expression
//! language, so evaluation time is bounded by the size of the block.
//!
//! Semantics:
//!
//! - all clauses must hold (AND)
//! - a clause holds if the context value matches any expected value (OR)
//! - a key missing from the context fails positive operators and satisfies
//!   negated ones (`StringNotEquals`, `StringNotLike`, `NotIpAddress`)
//! - a context value that cannot be read for the operator fails the clause

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AccessError, Result};
use crate::pattern::matches_unsegmented;

/// Supported condition operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
	StringEquals,
	StringNotEquals,
	StringLike,
	StringNotLike,
	NumericEquals,
	NumericLessThan,
	NumericGreaterThan,
	DateLessThan,
	DateGreaterThan,
	Bool,
	IpAddress,
	NotIpAddress,
}

impl ConditionOperator {
	pub fn all() -> &'static [ConditionOperator] {
		&[
			ConditionOperator::StringEquals,
			ConditionOperator::StringNotEquals,
			ConditionOperator::StringLike,
			ConditionOperator::StringNotLike,
			ConditionOperator::NumericEquals,
			ConditionOperator::NumericLessThan,
			ConditionOperator::NumericGreaterThan,
			ConditionOperator::DateLessThan,
			ConditionOperator::DateGreaterThan,
			ConditionOperator::Bool,
			ConditionOperator::IpAddress,
			ConditionOperator::NotIpAddress,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ConditionOperator::StringEquals => "StringEquals",
			ConditionOperator::StringNotEquals => "StringNotEquals",
			ConditionOperator::StringLike => "StringLike",
			ConditionOperator::StringNotLike => "StringNotLike",
			ConditionOperator::NumericEquals => "NumericEquals",
			ConditionOperator::NumericLessThan => "NumericLessThan",
			ConditionOperator::NumericGreaterThan => "NumericGreaterThan",
			ConditionOperator::DateLessThan => "DateLessThan",
			ConditionOperator::DateGreaterThan => "DateGreaterThan",
			ConditionOperator::Bool => "Bool",
			ConditionOperator::IpAddress => "IpAddress",
			ConditionOperator::NotIpAddress => "NotIpAddress",
		}
	}

	/// Negated operators hold when the context key is absent.
	pub fn is_negated(&self) -> bool {
		matches!(
			self,
			ConditionOperator::StringNotEquals
				| ConditionOperator::StringNotLike
				| ConditionOperator::NotIpAddress
		)
	}

	/// Checks that an expected value is well-formed for this operator.
	fn validate_expected(&self, value: &str) -> bool {
		match self {
			ConditionOperator::StringEquals
			| ConditionOperator::StringNotEquals
			| ConditionOperator::StringLike
			| ConditionOperator::StringNotLike => true,
			ConditionOperator::NumericEquals
			| ConditionOperator::NumericLessThan
			| ConditionOperator::NumericGreaterThan => value.parse::<f64>().is_ok(),
			ConditionOperator::DateLessThan | ConditionOperator::DateGreaterThan => {
				parse_date(value).is_some()
			}
			ConditionOperator::Bool => parse_bool(value).is_some(),
			ConditionOperator::IpAddress | ConditionOperator::NotIpAddress => {
				parse_network(value).is_some()
			}
		}
	}
}

impl fmt::Display for ConditionOperator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ConditionOperator {
	type Err = AccessError;

	fn from_str(s: &str) -> Result<Self> {
		ConditionOperator::all()
			.iter()
			.copied()
			.find(|op| op.as_str() == s)
			.ok_or_else(|| AccessError::InvalidDocument(format!("unknown condition operator '{s}'")))
	}
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.ok()
		.map(|d| d.with_timezone(&Utc))
}

fn parse_bool(value: &str) -> Option<bool> {
	if value.eq_ignore_ascii_case("true") {
		Some(true)
	} else if value.eq_ignore_ascii_case("false") {
		Some(false)
	} else {
		None
	}
}

fn parse_network(value: &str) -> Option<IpNet> {
	value
		.parse::<IpNet>()
		.ok()
		.or_else(|| value.parse::<IpAddr>().ok().map(IpNet::from))
}

/// One `(operator, key, expected values)` predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionClause {
	pub operator: ConditionOperator,
	pub key: String,
	pub values: Vec<String>,
}

impl ConditionClause {
	pub fn new(
		operator: ConditionOperator,
		key: impl Into<String>,
		values: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		Self {
			operator,
			key: key.into(),
			values: values.into_iter().map(Into::into).collect(),
		}
	}

	fn validate(&self) -> Result<()> {
		if self.values.is_empty() {
			return Err(AccessError::InvalidDocument(format!(
				"condition {} on '{}' has no expected values",
				self.operator, self.key
			)));
		}
		if let Some(bad) = self
			.values
			.iter()
			.find(|v| !self.operator.validate_expected(v))
		{
			return Err(AccessError::InvalidDocument(format!(
				"condition {} on '{}' has malformed value '{}'",
				self.operator, self.key, bad
			)));
		}
		Ok(())
	}

	/// Evaluates the clause against the request context.
	pub fn holds(&self, context: &RequestContext) -> bool {
		let Some(actual) = context.get(&self.key) else {
			return self.operator.is_negated();
		};
		let any = |f: &dyn Fn(&str) -> bool| self.values.iter().any(|v| f(v));

		match self.operator {
			ConditionOperator::StringEquals => any(&|v| v == actual),
			ConditionOperator::StringNotEquals => !any(&|v| v == actual),
			ConditionOperator::StringLike => any(&|v| matches_unsegmented(v, actual)),
			ConditionOperator::StringNotLike => !any(&|v| matches_unsegmented(v, actual)),
			ConditionOperator::NumericEquals
			| ConditionOperator::NumericLessThan
			| ConditionOperator::NumericGreaterThan => {
				let Ok(actual) = actual.parse::<f64>() else {
					return false;
				};
				any(&|v| {
					v.parse::<f64>().is_ok_and(|expected| match self.operator {
						ConditionOperator::NumericEquals => actual == expected,
						ConditionOperator::NumericLessThan => actual < expected,
						_ => actual > expected,
					})
				})
			}
			ConditionOperator::DateLessThan | ConditionOperator::DateGreaterThan => {
				let Some(actual) = parse_date(actual) else {
					return false;
				};
				any(&|v| {
					parse_date(v).is_some_and(|expected| match self.operator {
						ConditionOperator::DateLessThan => actual < expected,
						_ => actual > expected,
					})
				})
			}
			ConditionOperator::Bool => {
				let Some(actual) = parse_bool(actual) else {
					return false;
				};
				any(&|v| parse_bool(v) == Some(actual))
			}
			ConditionOperator::IpAddress | ConditionOperator::NotIpAddress => {
				let Ok(addr) = actual.parse::<IpAddr>() else {
					return false;
				};
				let inside = any(&|v| parse_network(v).is_some_and(|net| net.contains(&addr)));
				if self.operator == ConditionOperator::IpAddress {
					inside
				} else {
					!inside
				}
			}
		}
	}
}

/// A statement's condition block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionBlock {
	clauses: Vec<ConditionClause>,
}

impl ConditionBlock {
	/// Builds a block from clauses, validating each.
	pub fn new(clauses: Vec<ConditionClause>) -> Result<Self> {
		for clause in &clauses {
			clause.validate()?;
		}
		Ok(Self { clauses })
	}

	/// Parses the wire form `{ "<operator>": { "<key>": "<value>" | ["<value>", ...] } }`.
	pub fn from_json(value: &Value) -> Result<Self> {
		let operators = value
			.as_object()
			.ok_or_else(|| AccessError::InvalidDocument("Condition must be an object".into()))?;

		let mut clauses = Vec::new();
		for (operator, keys) in operators {
			let operator: ConditionOperator = operator.parse()?;
			let keys = keys.as_object().ok_or_else(|| {
				AccessError::InvalidDocument(format!("condition {operator} must map keys to values"))
			})?;
			for (key, expected) in keys {
				let values = match expected {
					Value::String(s) => vec![s.clone()],
					Value::Bool(b) => vec![b.to_string()],
					Value::Number(n) => vec![n.to_string()],
					Value::Array(items) => items
						.iter()
						.map(|item| match item {
							Value::String(s) => Ok(s.clone()),
							Value::Bool(b) => Ok(b.to_string()),
							Value::Number(n) => Ok(n.to_string()),
							_ => Err(AccessError::InvalidDocument(format!(
								"condition {operator} on '{key}' has a non-scalar value"
							))),
						})
						.collect::<Result<Vec<_>>>()?,
					_ => {
						return Err(AccessError::InvalidDocument(format!(
							"condition {operator} on '{key}' has a non-scalar value"
						)))
					}
				};
				clauses.push(ConditionClause {
					operator,
					key: key.clone(),
					values,
				});
			}
		}

		Self::new(clauses)
	}

	pub fn clauses(&self) -> &[ConditionClause] {
		&self.clauses
	}

	pub fn is_empty(&self) -> bool {
		self.clauses.is_empty()
	}

	/// Returns a block requiring both `self` and `other`.
	pub fn and(&self, other: &ConditionBlock) -> ConditionBlock {
		let mut clauses = self.clauses.clone();
		clauses.extend(other.clauses.iter().cloned());
		ConditionBlock { clauses }
	}

	/// Evaluates the block, reporting the first clause that fails.
	pub fn evaluate(&self, context: &RequestContext) -> ConditionResult {
		match self.clauses.iter().find(|c| !c.holds(context)) {
			Some(failed) => ConditionResult::NotMet {
				operator: failed.operator,
				key: failed.key.clone(),
			},
			None => ConditionResult::Met,
		}
	}
}

/// Outcome of evaluating a statement's condition block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ConditionResult {
	/// The statement has no condition block.
	Absent,
	Met,
	NotMet {
		operator: ConditionOperator,
		key: String,
	},
	/// The statement's action or resource did not match, so its condition was
	/// never evaluated.
	Skipped,
}

impl ConditionResult {
	/// Returns true if the statement may take part in the decision.
	pub fn is_satisfied(&self) -> bool {
		matches!(self, ConditionResult::Absent | ConditionResult::Met)
	}
}

impl fmt::Display for ConditionResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConditionResult::Absent => write!(f, "no condition"),
			ConditionResult::Met => write!(f, "condition met"),
			ConditionResult::NotMet { operator, key } => {
				write!(f, "condition not met ({operator} on '{key}')")
			}
			ConditionResult::Skipped => write!(f, "not evaluated"),
		}
	}
}

/// Request attributes that conditions are evaluated against.
///
/// `request_time` is also the clock used for lazy expiry of grants; when
/// unset, evaluation uses the current time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
	#[serde(default)]
	pub values: BTreeMap<String, String>,
	#[serde(default)]
	pub request_time: Option<DateTime<Utc>>,
}

impl RequestContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder: set a context value.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.values.insert(key.into(), value.into());
		self
	}

	/// Builder: pin the evaluation instant.
	pub fn at(mut self, time: DateTime<Utc>) -> Self {
		self.request_time = Some(time);
		self
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.values.get(key).map(String::as_str)
	}

	/// The instant grants are checked for expiry against.
	pub fn evaluation_time(&self) -> DateTime<Utc> {
		self.request_time.unwrap_or_else(Utc::now)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn block(value: Value) -> ConditionBlock {
		ConditionBlock::from_json(&value).unwrap()
	}

	mod parsing {
		use super::*;

		#[test]
		fn scalar_and_array_values() {
			let b = block(json!({
				"StringEquals": { "team": "infra" },
				"IpAddress": { "source_ip": ["10.0.0.0/8", "192.168.1.1"] }
			}));
			assert_eq!(b.clauses().len(), 2);
		}

		#[test]
		fn unknown_operator_is_invalid_document() {
			let err = ConditionBlock::from_json(&json!({ "Regex": { "k": ".*" } })).unwrap_err();
			assert!(matches!(err, AccessError::InvalidDocument(_)));
		}

		#[test]
		fn malformed_cidr_is_invalid_document() {
			let err =
				ConditionBlock::from_json(&json!({ "IpAddress": { "ip": "10.0.0.0/99" } })).unwrap_err();
			assert!(err.to_string().contains("malformed value"));
		}

		#[test]
		fn empty_value_list_is_invalid_document() {
			let err = ConditionBlock::from_json(&json!({ "StringEquals": { "k": [] } })).unwrap_err();
			assert!(err.to_string().contains("no expected values"));
		}

		#[test]
		fn non_object_condition_is_rejected() {
			assert!(ConditionBlock::from_json(&json!(["StringEquals"])).is_err());
		}
	}

	mod evaluation {
		use super::*;

		#[test]
		fn string_equals_any_value() {
			let b = block(json!({ "StringEquals": { "team": ["infra", "sre"] } }));
			assert_eq!(
				b.evaluate(&RequestContext::new().with("team", "sre")),
				ConditionResult::Met
			);
			assert!(!b
				.evaluate(&RequestContext::new().with("team", "web"))
				.is_satisfied());
		}

		#[test]
		fn missing_key_fails_positive_operator() {
			let b = block(json!({ "StringEquals": { "team": "infra" } }));
			assert_eq!(
				b.evaluate(&RequestContext::new()),
				ConditionResult::NotMet {
					operator: ConditionOperator::StringEquals,
					key: "team".into(),
				}
			);
		}

		#[test]
		fn missing_key_satisfies_negated_operator() {
			let b = block(json!({ "NotIpAddress": { "source_ip": "10.0.0.0/8" } }));
			assert!(b.evaluate(&RequestContext::new()).is_satisfied());
		}

		#[test]
		fn ip_ranges() {
			let b = block(json!({ "IpAddress": { "source_ip": "10.0.0.0/8" } }));
			assert!(b
				.evaluate(&RequestContext::new().with("source_ip", "10.1.2.3"))
				.is_satisfied());
			assert!(!b
				.evaluate(&RequestContext::new().with("source_ip", "192.168.0.1"))
				.is_satisfied());
			assert!(!b
				.evaluate(&RequestContext::new().with("source_ip", "not-an-ip"))
				.is_satisfied());
		}

		#[test]
		fn ipv6_and_single_address() {
			let b = block(json!({ "IpAddress": { "ip": ["2001:db8::/32", "127.0.0.1"] } }));
			assert!(b
				.evaluate(&RequestContext::new().with("ip", "2001:db8::1"))
				.is_satisfied());
			assert!(b
				.evaluate(&RequestContext::new().with("ip", "127.0.0.1"))
				.is_satisfied());
		}

		#[test]
		fn numeric_and_bool() {
			let b = block(json!({
				"NumericLessThan": { "risk": 50 },
				"Bool": { "mfa": true }
			}));
			let ok = RequestContext::new().with("risk", "10").with("mfa", "true");
			let risky = RequestContext::new().with("risk", "90").with("mfa", "true");
			let no_mfa = RequestContext::new().with("risk", "10").with("mfa", "false");
			assert!(b.evaluate(&ok).is_satisfied());
			assert!(!b.evaluate(&risky).is_satisfied());
			assert!(!b.evaluate(&no_mfa).is_satisfied());
		}

		#[test]
		fn dates() {
			let b = block(json!({ "DateLessThan": { "now": "2030-01-01T00:00:00Z" } }));
			assert!(b
				.evaluate(&RequestContext::new().with("now", "2029-06-01T00:00:00Z"))
				.is_satisfied());
			assert!(!b
				.evaluate(&RequestContext::new().with("now", "2031-06-01T00:00:00Z"))
				.is_satisfied());
		}

		#[test]
		fn string_like_spans_delimiters() {
			let b = block(json!({ "StringLike": { "host": "*.example.com" } }));
			assert!(b
				.evaluate(&RequestContext::new().with("host", "a.b.example.com"))
				.is_satisfied());
		}

		#[test]
		fn and_combines_blocks() {
			let a = block(json!({ "StringEquals": { "team": "infra" } }));
			let b = block(json!({ "Bool": { "mfa": "true" } }));
			let both = a.and(&b);
			assert_eq!(both.clauses().len(), 2);
			let ctx = RequestContext::new().with("team", "infra");
			assert_eq!(
				both.evaluate(&ctx),
				ConditionResult::NotMet {
					operator: ConditionOperator::Bool,
					key: "mfa".into(),
				}
			);
		}
	}

	#[test]
	fn operator_names_roundtrip() {
		for op in ConditionOperator::all() {
			assert_eq!(op.as_str().parse::<ConditionOperator>().unwrap(), *op);
		}
	}

	#[test]
	fn evaluation_time_prefers_pinned_instant() {
		let pinned = parse_date("2024-05-01T12:00:00Z").unwrap();
		assert_eq!(RequestContext::new().at(pinned).evaluation_time(), pinned);
	}
}
