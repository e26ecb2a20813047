// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bulk evaluation.
//!
//! Decides many (action, resource) pairs for one principal. Identity grants
//! are aggregated once for the whole batch and resource grants once per
//! distinct resource, and each pair is decided against only its own
//! resource's statements. Results match individual
//! [`AccessEngine::evaluate`] calls, index for index.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::instrument;

use tollgate_access_core::{CollaboratorRole, Decision, Principal, RequestContext, ResourceName};

use crate::aggregate::CollectedStatement;
use crate::collaboration::decide_content;
use crate::engine::{decide, store_unavailable, AccessEngine};
use crate::error::Result as StoreResult;
use crate::store::GrantStore;

/// One (action, resource) pair of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCheck {
	pub action: String,
	pub resource: String,
}

impl BulkCheck {
	pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
		Self {
			action: action.into(),
			resource: resource.into(),
		}
	}
}

/// Per-resource lookups shared by every pair naming that resource.
struct ResourceGrants {
	role: StoreResult<Option<CollaboratorRole>>,
	statements: OnceCell<StoreResult<Vec<CollectedStatement>>>,
}

impl<S: GrantStore> AccessEngine<S> {
	/// Decides every pair; the output has the same length and order as
	/// `checks`.
	#[instrument(
		level = "debug",
		skip(self, principal, checks, context),
		fields(principal_id = %principal.id, pairs = checks.len())
	)]
	pub async fn bulk_evaluate(
		&self,
		principal: &Principal,
		checks: &[BulkCheck],
		context: &RequestContext,
	) -> Vec<Decision> {
		let now = context.evaluation_time();
		let aggregator = self.aggregator();

		let identity_grants: OnceCell<StoreResult<Vec<CollectedStatement>>> = OnceCell::new();
		let mut per_resource: HashMap<ResourceName, ResourceGrants> = HashMap::new();
		let mut decisions = Vec::with_capacity(checks.len());

		for check in checks {
			let target = match self.target(principal, &check.resource) {
				Ok(target) => target,
				Err(denied) => {
					decisions.push(denied);
					continue;
				}
			};

			let grants = match per_resource.entry(target.clone()) {
				Entry::Occupied(entry) => entry.into_mut(),
				Entry::Vacant(entry) => {
					let role = self.overlay(principal, &target).await;
					entry.insert(ResourceGrants {
						role,
						statements: OnceCell::new(),
					})
				}
			};

			match &grants.role {
				Ok(Some(role)) => {
					decisions.push(decide_content(*role, &target, &check.action));
					continue;
				}
				Ok(None) => {}
				Err(e) => {
					decisions.push(store_unavailable(e));
					continue;
				}
			}

			let identity = identity_grants
				.get_or_init(|| aggregator.collect_identity(principal, now))
				.await;
			let resource = grants
				.statements
				.get_or_init(|| aggregator.collect_resource(principal, &target, now))
				.await;

			let decision = match (identity, resource) {
				(Ok(identity), Ok(resource)) => decide(
					identity.iter().chain(resource.iter()),
					&check.action,
					&target.to_string(),
					context,
					None,
				),
				(Err(e), _) | (_, Err(e)) => store_unavailable(e),
			};
			decisions.push(decision);
		}

		tracing::debug!(
			resources = per_resource.len(),
			allowed = decisions.iter().filter(|d| d.is_allowed()).count(),
			"bulk evaluation complete"
		);
		decisions
	}
}
