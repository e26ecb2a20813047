// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The access decision engine.
//!
//! [`AccessEngine::evaluate`] answers whether a principal may perform an
//! action on a resource:
//!
//! 1. Resolve the resource; a malformed identifier or a resource of another
//!    organization is denied before any lookup.
//! 2. For content resources, consult the collaboration overlay. If the
//!    principal has a role on the item, that role decides.
//! 3. Otherwise aggregate the principal's grants and keep the statements whose
//!    action and resource patterns match and whose condition holds.
//! 4. Any surviving Deny wins; else any surviving Allow allows; else deny.
//!
//! Every failure path denies.

use std::collections::BTreeSet;

use tracing::{instrument, warn};

use tollgate_access_core::{
	AccessError, ActionCatalog, CollaboratorRole, ConditionResult, Decision, DecisionReason,
	Effect, EvaluationPath, Principal, RequestContext, ResourceName, TraceEntry, DEFAULT_NAMESPACE,
};

use crate::aggregate::{Aggregator, CollectedStatement, GrantSet};
use crate::collaboration::{decide_content, resolve_role};
use crate::error::{Result as StoreResult, StoreError};
use crate::store::GrantStore;

/// Resource type treated as collaborative content by default.
pub const DEFAULT_CONTENT_TYPE: &str = "content";

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
	/// Namespace used to qualify relative resource names and patterns.
	pub arn_namespace: String,
	/// Resource types routed through the collaboration overlay.
	pub content_resource_types: BTreeSet<String>,
	/// Action universe for effective-permission enumeration.
	pub action_catalog: ActionCatalog,
}

impl Default for EngineSettings {
	fn default() -> Self {
		Self {
			arn_namespace: DEFAULT_NAMESPACE.to_string(),
			content_resource_types: BTreeSet::from([DEFAULT_CONTENT_TYPE.to_string()]),
			action_catalog: ActionCatalog::default(),
		}
	}
}

impl EngineSettings {
	pub fn is_content(&self, resource: &ResourceName) -> bool {
		self.content_resource_types.contains(resource.resource_type())
	}
}

/// Applies deny-overrides to a statement set.
///
/// When `trace` is given, every statement is recorded with its match and
/// condition outcome, in input order.
pub fn decide<'a>(
	statements: impl IntoIterator<Item = &'a CollectedStatement>,
	action: &str,
	resource: &str,
	context: &RequestContext,
	mut trace: Option<&mut Vec<TraceEntry>>,
) -> Decision {
	let mut denies = Vec::new();
	let mut allows = Vec::new();

	for collected in statements {
		let statement = &collected.statement;
		let action_matched = statement.actions.matches(action);
		let resource_matched = statement.resources.matches(resource);
		let condition = if !(action_matched && resource_matched) {
			ConditionResult::Skipped
		} else {
			match &statement.condition {
				None => ConditionResult::Absent,
				Some(block) => block.evaluate(context),
			}
		};

		if action_matched && resource_matched && condition.is_satisfied() {
			match statement.effect {
				Effect::Deny => denies.push(collected.provenance.clone()),
				Effect::Allow => allows.push(collected.provenance.clone()),
			}
		}

		if let Some(trace) = trace.as_deref_mut() {
			trace.push(TraceEntry {
				provenance: collected.provenance.clone(),
				effect: statement.effect,
				actions: statement.actions.as_slice().to_vec(),
				resources: statement.resources.as_slice().to_vec(),
				action_matched,
				resource_matched,
				condition,
			});
		}
	}

	if !denies.is_empty() {
		Decision::deny(denies, DecisionReason::ExplicitDeny)
	} else if !allows.is_empty() {
		Decision::allow(allows, DecisionReason::ExplicitAllow)
	} else {
		Decision::deny(vec![], DecisionReason::DefaultDeny)
	}
}

pub(crate) fn store_unavailable(err: &StoreError) -> Decision {
	warn!(error = %err, "grant store unavailable, denying");
	Decision::deny(
		vec![],
		DecisionReason::GrantStoreUnavailable {
			message: err.to_string(),
		},
	)
}

/// Resolves access decisions against a grant store.
pub struct AccessEngine<S> {
	store: S,
	settings: EngineSettings,
}

impl<S: GrantStore> AccessEngine<S> {
	pub fn new(store: S) -> Self {
		Self::with_settings(store, EngineSettings::default())
	}

	pub fn with_settings(store: S, settings: EngineSettings) -> Self {
		Self { store, settings }
	}

	pub fn store(&self) -> &S {
		&self.store
	}

	pub fn settings(&self) -> &EngineSettings {
		&self.settings
	}

	pub fn aggregator(&self) -> Aggregator<'_, S> {
		Aggregator::new(&self.store, &self.settings.arn_namespace)
	}

	/// Resolves a raw resource identifier in the principal's organization.
	///
	/// Returns the Deny decision for malformed or foreign resources.
	pub(crate) fn target(
		&self,
		principal: &Principal,
		raw: &str,
	) -> std::result::Result<ResourceName, Decision> {
		let name = ResourceName::resolve(raw, &self.settings.arn_namespace, principal.org_id)
			.map_err(|e| {
				Decision::deny(
					vec![],
					DecisionReason::InvalidResource {
						message: e.to_string(),
					},
				)
			})?;
		if name.org_id() != principal.org_id {
			return Err(Decision::deny(vec![], DecisionReason::OrganizationMismatch));
		}
		Ok(name)
	}

	/// The principal's collaborator role, if the resource is content.
	pub(crate) async fn overlay(
		&self,
		principal: &Principal,
		target: &ResourceName,
	) -> StoreResult<Option<CollaboratorRole>> {
		if !self.settings.is_content(target) {
			return Ok(None);
		}
		resolve_role(&self.store, target, principal).await
	}

	/// The full decision procedure for a resolved resource.
	pub(crate) async fn resolve(
		&self,
		principal: &Principal,
		action: &str,
		target: &ResourceName,
		context: &RequestContext,
		trace: Option<&mut Vec<TraceEntry>>,
	) -> (Decision, EvaluationPath) {
		match self.overlay(principal, target).await {
			Ok(Some(role)) => {
				return (
					decide_content(role, target, action),
					EvaluationPath::ContentOverlay { role },
				)
			}
			Ok(None) => {}
			Err(e) => return (store_unavailable(&e), EvaluationPath::Grants),
		}

		let grants = match self
			.aggregator()
			.collect(principal, target, context.evaluation_time())
			.await
		{
			Ok(grants) => grants,
			Err(e) => return (store_unavailable(&e), EvaluationPath::Grants),
		};

		(
			decide(grants.iter(), action, &target.to_string(), context, trace),
			EvaluationPath::Grants,
		)
	}

	/// Decides whether `principal` may perform `action` on `resource`.
	///
	/// `resource` is a full ARN or a `<type>/<id>` name in the principal's
	/// organization.
	#[instrument(
		level = "debug",
		skip(self, principal, context),
		fields(
			principal_id = %principal.id,
			principal_type = %principal.principal_type,
			org_id = %principal.org_id,
			effect = tracing::field::Empty,
		)
	)]
	pub async fn evaluate(
		&self,
		principal: &Principal,
		action: &str,
		resource: &str,
		context: &RequestContext,
	) -> Decision {
		let decision = match self.target(principal, resource) {
			Ok(target) => {
				self.resolve(principal, action, &target, context, None)
					.await
					.0
			}
			Err(denied) => denied,
		};

		tracing::Span::current().record("effect", tracing::field::display(decision.effect));
		tracing::debug!(reason = %decision.reason, "access decision");
		decision
	}

	/// Per-request authorization hook: `Ok(())` on Allow.
	pub async fn check(
		&self,
		principal: &Principal,
		action: &str,
		resource: &str,
		context: &RequestContext,
	) -> std::result::Result<(), AccessError> {
		let decision = self.evaluate(principal, action, resource, context).await;
		if decision.is_allowed() {
			Ok(())
		} else {
			Err(AccessError::Denied(format!(
				"{action} on {resource}: {}",
				decision.reason
			)))
		}
	}

	/// Every statement that applies to `principal` on `resource`.
	pub async fn collect_grants(
		&self,
		principal: &Principal,
		resource: &ResourceName,
		context: &RequestContext,
	) -> StoreResult<GrantSet> {
		self.aggregator()
			.collect(principal, resource, context.evaluation_time())
			.await
	}

	async fn content_role(&self, principal: &Principal, content: &str) -> Option<CollaboratorRole> {
		let target = self.target(principal, content).ok()?;
		if !self.settings.is_content(&target) {
			return None;
		}
		match resolve_role(&self.store, &target, principal).await {
			Ok(role) => role,
			Err(e) => {
				warn!(error = %e, content = %target, "collaborator lookup failed");
				None
			}
		}
	}

	/// Owner-only check for content items.
	pub async fn is_content_owner(&self, principal: &Principal, content: &str) -> bool {
		self.content_role(principal, content).await == Some(CollaboratorRole::Owner)
	}

	/// Collaborator check for content items; owners are collaborators too.
	pub async fn is_content_collaborator(&self, principal: &Principal, content: &str) -> bool {
		self.content_role(principal, content).await.is_some()
	}
}
