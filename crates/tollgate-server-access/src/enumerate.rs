// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Effective-permission enumeration.
//!
//! The result has two parts. `actions` expands wildcard grants against a
//! finite candidate set: the configured action catalog plus every literal
//! action named by an Allow statement on the resource. Each candidate is
//! decided with [`decide`] over a single aggregation, the same routine
//! [`AccessEngine::evaluate`] uses.
//!
//! Wildcards also reach actions no catalog lists, so the Allow patterns in
//! force are returned as well, minus any wholly covered by a Deny, together
//! with the Deny patterns that still cut into them.
//! [`EffectivePermissions::allows`] over that pair agrees with `evaluate` for
//! every action in scope.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use tollgate_access_core::pattern::has_wildcard;
use tollgate_access_core::{
	action_service, action_verb, may_overlap, subsumes, CollaboratorRole, Effect,
	EffectivePermissions, EvaluationPath, Principal, RequestContext,
};

use crate::collaboration::{decide_content, CO_AUTHOR_VERBS};
use crate::engine::{decide, store_unavailable, AccessEngine};
use crate::store::GrantStore;

/// What to enumerate: one concrete resource, optionally one service's actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationScope {
	pub resource: String,
	#[serde(default)]
	pub service: Option<String>,
}

impl EnumerationScope {
	pub fn resource(resource: impl Into<String>) -> Self {
		Self {
			resource: resource.into(),
			service: None,
		}
	}

	pub fn with_service(mut self, service: impl Into<String>) -> Self {
		self.service = Some(service.into());
		self
	}

	fn includes(&self, action: &str) -> bool {
		self.service
			.as_deref()
			.is_none_or(|service| action_service(action) == Some(service))
	}

	/// False only for patterns that cannot match any action in scope.
	fn may_include(&self, pattern: &str) -> bool {
		match self.service.as_deref() {
			None => true,
			Some(service) => may_overlap(pattern, &format!("{service}:*")),
		}
	}
}

impl<S: GrantStore> AccessEngine<S> {
	/// Lists what `principal` may currently do in scope.
	#[instrument(
		level = "debug",
		skip(self, principal, scope, context),
		fields(principal_id = %principal.id, resource = %scope.resource)
	)]
	pub async fn effective_permissions(
		&self,
		principal: &Principal,
		scope: &EnumerationScope,
		context: &RequestContext,
	) -> EffectivePermissions {
		let target = match self.target(principal, &scope.resource) {
			Ok(target) => target,
			Err(denied) => return EffectivePermissions::empty(scope.resource.clone(), denied.reason),
		};
		let resource = target.to_string();
		let catalog = &self.settings().action_catalog;

		match self.overlay(principal, &target).await {
			Ok(Some(role)) => {
				let actions = catalog
					.iter()
					.filter(|a| scope.includes(a))
					.filter(|a| decide_content(role, &target, a).is_allowed())
					.map(str::to_string)
					.collect();
				let service = target.service();
				let role_patterns: Vec<String> = match role {
					CollaboratorRole::Owner => vec![format!("{service}:*")],
					CollaboratorRole::CoAuthor => CO_AUTHOR_VERBS
						.iter()
						.map(|verb| format!("{service}:{verb}"))
						.collect(),
				};
				let granted_patterns = role_patterns
					.into_iter()
					.filter(|p| scope.may_include(p))
					.collect();
				return EffectivePermissions {
					resource,
					actions,
					granted_patterns,
					denied_patterns: BTreeSet::new(),
					path: EvaluationPath::ContentOverlay { role },
					reason: None,
				};
			}
			Ok(None) => {}
			Err(e) => return EffectivePermissions::empty(resource, store_unavailable(&e).reason),
		}

		let grants = match self.collect_grants(principal, &target, context).await {
			Ok(grants) => grants,
			Err(e) => return EffectivePermissions::empty(resource, store_unavailable(&e).reason),
		};

		let mut candidates: BTreeSet<String> = catalog.iter().map(str::to_string).collect();
		let mut allow_patterns = BTreeSet::new();
		let mut deny_patterns = BTreeSet::new();
		for collected in grants.iter() {
			let statement = &collected.statement;
			if !statement.resources.matches(&resource) {
				continue;
			}
			if statement.effect == Effect::Allow {
				for pattern in statement.actions.iter() {
					if !has_wildcard(pattern) && action_verb(pattern).is_some() {
						candidates.insert(pattern.to_string());
					}
				}
			}
			let condition_holds = statement
				.condition
				.as_ref()
				.is_none_or(|block| block.evaluate(context).is_satisfied());
			if !condition_holds {
				continue;
			}
			let patterns = match statement.effect {
				Effect::Allow => &mut allow_patterns,
				Effect::Deny => &mut deny_patterns,
			};
			patterns.extend(
				statement
					.actions
					.iter()
					.filter(|p| scope.may_include(p))
					.map(str::to_string),
			);
		}

		let actions: BTreeSet<String> = candidates
			.into_iter()
			.filter(|a| scope.includes(a))
			.filter(|a| decide(grants.iter(), a, &resource, context, None).is_allowed())
			.collect();

		let granted_patterns: BTreeSet<String> = allow_patterns
			.into_iter()
			.filter(|allow| !deny_patterns.iter().any(|deny| subsumes(deny, allow)))
			.collect();
		let denied_patterns = deny_patterns
			.into_iter()
			.filter(|deny| granted_patterns.iter().any(|allow| may_overlap(allow, deny)))
			.collect();

		tracing::debug!(
			actions = actions.len(),
			patterns = granted_patterns.len(),
			"effective permissions enumerated"
		);

		EffectivePermissions {
			resource,
			actions,
			granted_patterns,
			denied_patterns,
			path: EvaluationPath::Grants,
			reason: None,
		}
	}
}
