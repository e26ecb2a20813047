// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grant aggregation.
//!
//! Collects every statement that applies to a principal from four sources:
//!
//! 1. policies of roles reached through the principal's role assignments
//! 2. policies reached through group memberships (the group's roles, then
//!    policies attached to the group directly)
//! 3. direct resource permissions, each synthesized as one statement
//! 4. resource shares, synthesized as Allow statements for the share level
//!
//! Discovery only reads the store. Filtering (expiry, organization,
//! assumability, principal identity, policy status) happens in one place,
//! [`GrantSource::admits`] plus the policy filter in [`merge`].
//!
//! Sources 1 and 2 depend only on the principal and are collected by
//! [`Aggregator::collect_identity`]; sources 3 and 4 depend on the resource
//! and are collected by [`Aggregator::collect_resource`].

use chrono::{DateTime, Utc};
use tracing::{instrument, warn};

use tollgate_access_core::{
	ConditionBlock, Effect, GrantOrigin, Group, GroupMembership, PatternSet, Policy, Principal,
	Provenance, ResourceName, ResourcePermission, ResourceShare, Role, RoleAssignment, Statement,
};

use crate::error::Result;
use crate::store::GrantStore;

/// One discovered grant, before filtering.
#[derive(Debug, Clone)]
pub enum GrantSource {
	RoleAssignment {
		assignment: RoleAssignment,
		role: Role,
		policies: Vec<Policy>,
	},
	GroupRole {
		membership: GroupMembership,
		group: Group,
		role: Role,
		policies: Vec<Policy>,
	},
	GroupPolicy {
		membership: GroupMembership,
		group: Group,
		policies: Vec<Policy>,
	},
	ResourcePermission(ResourcePermission),
	ResourceShare(ResourceShare),
}

impl GrantSource {
	/// Returns true if the grant is in force for `principal` at `now`.
	pub fn admits(&self, principal: &Principal, now: DateTime<Utc>) -> bool {
		let org = principal.org_id;
		match self {
			GrantSource::RoleAssignment {
				assignment, role, ..
			} => {
				principal.is(&assignment.principal)
					&& assignment.is_live(now)
					&& role.org_id == org
					&& role.can_be_assumed_by(principal.principal_type)
			}
			GrantSource::GroupRole {
				membership,
				group,
				role,
				..
			} => {
				principal.is(&membership.principal)
					&& membership.is_live(now)
					&& group.org_id == org
					&& role.org_id == org
					&& role.can_be_assumed_by(principal.principal_type)
			}
			GrantSource::GroupPolicy {
				membership, group, ..
			} => {
				principal.is(&membership.principal) && membership.is_live(now) && group.org_id == org
			}
			GrantSource::ResourcePermission(permission) => {
				principal.is(&permission.principal) && permission.resource.org_id() == org
			}
			GrantSource::ResourceShare(share) => {
				principal.is(&share.principal)
					&& share.is_live(now)
					&& share.resource.org_id() == org
			}
		}
	}
}

/// A statement together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedStatement {
	pub statement: Statement,
	pub provenance: Provenance,
}

/// The statements that apply to one (principal, resource) request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantSet {
	pub statements: Vec<CollectedStatement>,
}

impl GrantSet {
	pub fn new(identity: &[CollectedStatement], resource: &[CollectedStatement]) -> Self {
		Self {
			statements: identity.iter().chain(resource).cloned().collect(),
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = &CollectedStatement> {
		self.statements.iter()
	}

	pub fn len(&self) -> usize {
		self.statements.len()
	}

	pub fn is_empty(&self) -> bool {
		self.statements.is_empty()
	}
}

/// Filters discovered sources and expands them into statements.
///
/// Policies that are suspended, belong to another organization, or fail to
/// parse contribute nothing.
pub fn merge(
	sources: Vec<GrantSource>,
	principal: &Principal,
	namespace: &str,
	now: DateTime<Utc>,
) -> Vec<CollectedStatement> {
	let mut out = Vec::new();
	for source in sources {
		if !source.admits(principal, now) {
			continue;
		}
		match source {
			GrantSource::RoleAssignment {
				assignment,
				role,
				policies,
			} => {
				let origin = GrantOrigin::RoleAssignment {
					assignment_id: assignment.id,
					role_id: role.id,
				};
				expand_policies(
					&mut out,
					&policies,
					&origin,
					principal,
					namespace,
					assignment.condition_overrides.as_ref(),
				);
			}
			GrantSource::GroupRole {
				membership,
				group,
				role,
				policies,
			} => {
				let origin = GrantOrigin::GroupRole {
					membership_id: membership.id,
					group_id: group.id,
					role_id: role.id,
				};
				expand_policies(&mut out, &policies, &origin, principal, namespace, None);
			}
			GrantSource::GroupPolicy {
				membership,
				group,
				policies,
			} => {
				let origin = GrantOrigin::GroupPolicy {
					membership_id: membership.id,
					group_id: group.id,
				};
				expand_policies(&mut out, &policies, &origin, principal, namespace, None);
			}
			GrantSource::ResourcePermission(permission) => {
				if let Some(collected) = synthesize_permission(&permission) {
					out.push(collected);
				}
			}
			GrantSource::ResourceShare(share) => {
				if let Some(collected) = synthesize_share(&share) {
					out.push(collected);
				}
			}
		}
	}
	out
}

fn expand_policies(
	out: &mut Vec<CollectedStatement>,
	policies: &[Policy],
	origin: &GrantOrigin,
	principal: &Principal,
	namespace: &str,
	overrides: Option<&ConditionBlock>,
) {
	for policy in policies {
		if !policy.is_active() || policy.org_id != principal.org_id {
			continue;
		}
		let document = match policy.parse_document() {
			Ok(document) => document,
			Err(e) => {
				warn!(policy_id = %policy.id, error = %e, "dropping unparseable policy");
				continue;
			}
		};
		for statement in document.statements() {
			let mut statement = statement.qualify_resources(namespace, policy.org_id);
			if let Some(overrides) = overrides {
				statement = statement.restrict(overrides);
			}
			out.push(CollectedStatement {
				provenance: Provenance {
					origin: origin.clone(),
					policy_id: Some(policy.id),
					statement_index: statement.index,
					sid: statement.sid.clone(),
				},
				statement,
			});
		}
	}
}

fn synthesize_permission(permission: &ResourcePermission) -> Option<CollectedStatement> {
	let actions = match PatternSet::new("action", vec![permission.permission.clone()]) {
		Ok(actions) => actions,
		Err(e) => {
			warn!(permission_id = %permission.id, error = %e, "dropping malformed resource permission");
			return None;
		}
	};
	let resources = PatternSet::new("resource", vec![permission.resource.to_string()]).ok()?;
	Some(CollectedStatement {
		statement: Statement::new(0, permission.effect, actions, resources),
		provenance: Provenance {
			origin: GrantOrigin::ResourcePermission {
				permission_id: permission.id,
			},
			policy_id: None,
			statement_index: 0,
			sid: None,
		},
	})
}

fn synthesize_share(share: &ResourceShare) -> Option<CollectedStatement> {
	let actions = share
		.access_level
		.actions()
		.iter()
		.map(|a| a.to_string())
		.collect();
	let actions = PatternSet::new("action", actions).ok()?;
	let resources = PatternSet::new("resource", vec![share.resource.to_string()]).ok()?;
	Some(CollectedStatement {
		statement: Statement::new(0, Effect::Allow, actions, resources),
		provenance: Provenance {
			origin: GrantOrigin::ResourceShare {
				share_id: share.id,
				access_level: share.access_level,
			},
			policy_id: None,
			statement_index: 0,
			sid: None,
		},
	})
}

/// Reads grant sources from a store.
pub struct Aggregator<'a, S: ?Sized> {
	store: &'a S,
	namespace: &'a str,
}

impl<'a, S: GrantStore + ?Sized> Aggregator<'a, S> {
	pub fn new(store: &'a S, namespace: &'a str) -> Self {
		Self { store, namespace }
	}

	/// Collects every statement that applies to `principal` on `resource`.
	pub async fn collect(
		&self,
		principal: &Principal,
		resource: &ResourceName,
		now: DateTime<Utc>,
	) -> Result<GrantSet> {
		let identity = self.collect_identity(principal, now).await?;
		let resource = self.collect_resource(principal, resource, now).await?;
		Ok(GrantSet::new(&identity, &resource))
	}

	/// Statements reached through role assignments and group memberships.
	#[instrument(level = "debug", skip(self, principal), fields(principal_id = %principal.id))]
	pub async fn collect_identity(
		&self,
		principal: &Principal,
		now: DateTime<Utc>,
	) -> Result<Vec<CollectedStatement>> {
		let principal_ref = principal.to_ref();
		let mut sources = Vec::new();

		for assignment in self.store.list_role_assignments(&principal_ref).await? {
			// A role deleted after its assignment was listed contributes nothing.
			let Some(role) = self.store.get_role(assignment.role_id).await? else {
				continue;
			};
			let policies = self.store.list_role_policies(role.id).await?;
			sources.push(GrantSource::RoleAssignment {
				assignment,
				role,
				policies,
			});
		}

		for membership in self.store.list_group_memberships(&principal_ref).await? {
			let Some(group) = self.store.get_group(membership.group_id).await? else {
				continue;
			};
			for role in self.store.list_group_roles(group.id).await? {
				let policies = self.store.list_role_policies(role.id).await?;
				sources.push(GrantSource::GroupRole {
					membership: membership.clone(),
					group: group.clone(),
					role,
					policies,
				});
			}
			let policies = self.store.list_group_policies(group.id).await?;
			sources.push(GrantSource::GroupPolicy {
				membership,
				group,
				policies,
			});
		}

		let collected = merge(sources, principal, self.namespace, now);
		tracing::debug!(statements = collected.len(), "identity grants collected");
		Ok(collected)
	}

	/// Statements synthesized from the resource's permissions and shares.
	#[instrument(level = "debug", skip(self, principal), fields(principal_id = %principal.id, resource = %resource))]
	pub async fn collect_resource(
		&self,
		principal: &Principal,
		resource: &ResourceName,
		now: DateTime<Utc>,
	) -> Result<Vec<CollectedStatement>> {
		let mut sources = Vec::new();
		for permission in self.store.list_resource_permissions(resource).await? {
			sources.push(GrantSource::ResourcePermission(permission));
		}
		for share in self.store.list_resource_shares(resource).await? {
			sources.push(GrantSource::ResourceShare(share));
		}

		let collected = merge(sources, principal, self.namespace, now);
		tracing::debug!(statements = collected.len(), "resource grants collected");
		Ok(collected)
	}
}
