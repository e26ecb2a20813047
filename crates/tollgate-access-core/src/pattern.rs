// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wildcard matching for action and resource patterns.
//!
//! Patterns are matched segment by segment, where `:` and `/` delimit
//! segments:
//!
//! - `*` matches any run of characters within one segment
//! - a `*` at the very end of the pattern also matches any remaining segments
//! - a bare `*` matches everything
//! - everything else is compared literally and case-sensitively
//!
//! Because a non-trailing `*` never crosses a delimiter, a pattern and a
//! candidate must have the same number of segments unless the pattern ends in
//! a wildcard.

use serde::Serialize;

use crate::error::{AccessError, Result};

/// The wildcard character.
pub const WILDCARD: char = '*';

fn is_delimiter(c: char) -> bool {
	c == ':' || c == '/'
}

/// Returns true if `candidate` matches the segmented `pattern`.
pub fn matches(pattern: &str, candidate: &str) -> bool {
	glob(pattern, candidate, true)
}

/// Returns true if `candidate` matches `pattern` where `*` may span delimiters.
///
/// Used by `StringLike` conditions, whose values are not identifiers.
pub fn matches_unsegmented(pattern: &str, candidate: &str) -> bool {
	glob(pattern, candidate, false)
}

/// Returns true if the pattern contains a wildcard.
pub fn has_wildcard(pattern: &str) -> bool {
	pattern.contains(WILDCARD)
}

/// Returns true if every candidate matched by `specific` is also matched by
/// `general`.
///
/// Exact for a wildcard-free `specific`; otherwise only recognises a
/// `general` that is a literal prefix followed by the trailing `*`, so a
/// `false` answer does not prove the converse.
pub fn subsumes(general: &str, specific: &str) -> bool {
	if general == "*" || general == specific {
		return true;
	}
	if !has_wildcard(specific) {
		return matches(general, specific);
	}
	let Some(prefix) = general.strip_suffix(WILDCARD) else {
		return false;
	};
	if has_wildcard(prefix) {
		return false;
	}
	let literal_head = specific.split(WILDCARD).next().unwrap_or_default();
	literal_head.starts_with(prefix)
}

/// Returns false only if no candidate can match both patterns.
///
/// Exact when either pattern is wildcard-free; otherwise two patterns are
/// only told apart by differing literal first segments.
pub fn may_overlap(a: &str, b: &str) -> bool {
	if !has_wildcard(a) {
		return matches(b, a);
	}
	if !has_wildcard(b) {
		return matches(a, b);
	}
	match (literal_first_segment(a), literal_first_segment(b)) {
		(Some(x), Some(y)) => x == y,
		_ => true,
	}
}

/// The first `:`-delimited segment, if the pattern has one without a wildcard.
fn literal_first_segment(pattern: &str) -> Option<&str> {
	let (head, _) = pattern.split_once(':')?;
	(!has_wildcard(head) && !head.contains('/')).then_some(head)
}

/// Glob match over a rolling pair of rows. After processing pattern position
/// `i`, `next[j]` records whether `pattern[i..]` matches `text[j..]`, so memory
/// is bounded by the candidate length.
fn glob(pattern: &str, text: &str, segmented: bool) -> bool {
	if pattern == "*" {
		return true;
	}

	let p: Vec<char> = pattern.chars().collect();
	let t: Vec<char> = text.chars().collect();
	let mut next = vec![false; t.len() + 1];
	let mut current = vec![false; t.len() + 1];
	next[t.len()] = true;

	for i in (0..p.len()).rev() {
		let trailing = i + 1 == p.len();
		for j in (0..=t.len()).rev() {
			current[j] = if p[i] == WILDCARD {
				if trailing && segmented {
					true
				} else {
					let consume =
						j < t.len() && !(segmented && is_delimiter(t[j])) && current[j + 1];
					next[j] || consume
				}
			} else {
				j < t.len() && p[i] == t[j] && next[j + 1]
			};
		}
		std::mem::swap(&mut next, &mut current);
	}

	next[0]
}

/// A non-empty set of patterns, matched disjunctively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PatternSet(Vec<String>);

impl PatternSet {
	/// Builds a pattern set.
	///
	/// `kind` names the set in errors (`"action"`, `"resource"`). An empty set
	/// or an empty pattern is a configuration error.
	pub fn new(kind: &'static str, patterns: Vec<String>) -> Result<Self> {
		if patterns.is_empty() {
			return Err(AccessError::EmptyPatternSet(kind));
		}
		if let Some(empty) = patterns.iter().find(|p| p.trim().is_empty()) {
			return Err(AccessError::InvalidPattern(empty.clone()));
		}
		Ok(Self(patterns))
	}

	/// Returns true if any pattern matches the candidate.
	pub fn matches(&self, candidate: &str) -> bool {
		self.0.iter().any(|p| matches(p, candidate))
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	pub fn as_slice(&self) -> &[String] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Never true for a set built through [`PatternSet::new`].
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns a new set with every pattern passed through `f`.
	pub fn map(&self, f: impl Fn(&str) -> String) -> Self {
		Self(self.0.iter().map(|p| f(p)).collect())
	}
}
