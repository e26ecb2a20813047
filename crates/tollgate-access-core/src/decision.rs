// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decisions, provenance and simulation traces.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::ConditionResult;
use crate::document::Effect;
use crate::grant::{AccessLevel, CollaboratorRole};
use crate::pattern::matches;
use crate::types::{AssignmentId, GroupId, MembershipId, PermissionId, PolicyId, RoleId, ShareId};

/// Where a collected statement came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum GrantOrigin {
	RoleAssignment {
		assignment_id: AssignmentId,
		role_id: RoleId,
	},
	GroupRole {
		membership_id: MembershipId,
		group_id: GroupId,
		role_id: RoleId,
	},
	GroupPolicy {
		membership_id: MembershipId,
		group_id: GroupId,
	},
	ResourcePermission {
		permission_id: PermissionId,
	},
	ResourceShare {
		share_id: ShareId,
		access_level: AccessLevel,
	},
}

impl fmt::Display for GrantOrigin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			GrantOrigin::RoleAssignment {
				assignment_id,
				role_id,
			} => write!(f, "role {role_id} via assignment {assignment_id}"),
			GrantOrigin::GroupRole {
				group_id, role_id, ..
			} => write!(f, "role {role_id} via group {group_id}"),
			GrantOrigin::GroupPolicy { group_id, .. } => write!(f, "group {group_id}"),
			GrantOrigin::ResourcePermission { permission_id } => {
				write!(f, "resource permission {permission_id}")
			}
			GrantOrigin::ResourceShare {
				share_id,
				access_level,
			} => write!(f, "{access_level} share {share_id}"),
		}
	}
}

/// Identifies one statement that took part in a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
	pub origin: GrantOrigin,
	/// Absent for statements synthesized from permissions and shares.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub policy_id: Option<PolicyId>,
	pub statement_index: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sid: Option<String>,
}

impl fmt::Display for Provenance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.policy_id {
			Some(policy_id) => write!(
				f,
				"policy {policy_id} statement {} ({})",
				self.statement_index, self.origin
			)?,
			None => write!(f, "{}", self.origin)?,
		}
		if let Some(sid) = &self.sid {
			write!(f, " [{sid}]")?;
		}
		Ok(())
	}
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionReason {
	ExplicitDeny,
	ExplicitAllow,
	DefaultDeny,
	ContentOwner,
	ContentCoAuthor,
	/// The principal co-authors the content but the action is owner-only.
	ContentCoAuthorRestricted,
	/// The action belongs to another service than the content item.
	ContentActionOutOfScope,
	OrganizationMismatch,
	InvalidResource { message: String },
	GrantStoreUnavailable { message: String },
}

impl fmt::Display for DecisionReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DecisionReason::ExplicitDeny => write!(f, "explicit deny"),
			DecisionReason::ExplicitAllow => write!(f, "explicit allow"),
			DecisionReason::DefaultDeny => write!(f, "no matching allow, default deny"),
			DecisionReason::ContentOwner => write!(f, "content owner"),
			DecisionReason::ContentCoAuthor => write!(f, "content co-author"),
			DecisionReason::ContentCoAuthorRestricted => {
				write!(f, "action is reserved for the content owner")
			}
			DecisionReason::ContentActionOutOfScope => {
				write!(f, "action is not a content action")
			}
			DecisionReason::OrganizationMismatch => {
				write!(f, "resource belongs to another organization")
			}
			DecisionReason::InvalidResource { message } => {
				write!(f, "invalid resource: {message}")
			}
			DecisionReason::GrantStoreUnavailable { message } => {
				write!(f, "grant store unavailable: {message}")
			}
		}
	}
}

/// The outcome of evaluating one (principal, action, resource) request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
	pub effect: Effect,
	/// Statements that decided the outcome: every surviving Deny for an
	/// explicit deny, every surviving Allow otherwise.
	pub matched: Vec<Provenance>,
	pub reason: DecisionReason,
}

impl Decision {
	pub fn allow(matched: Vec<Provenance>, reason: DecisionReason) -> Self {
		Self {
			effect: Effect::Allow,
			matched,
			reason,
		}
	}

	pub fn deny(matched: Vec<Provenance>, reason: DecisionReason) -> Self {
		Self {
			effect: Effect::Deny,
			matched,
			reason,
		}
	}

	pub fn is_allowed(&self) -> bool {
		self.effect == Effect::Allow
	}
}

impl fmt::Display for Decision {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.effect, self.reason)
	}
}

/// Which branch of the decision procedure produced a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationPath {
	/// The content collaboration overlay decided without consulting grants.
	ContentOverlay { role: CollaboratorRole },
	Grants,
}

/// One considered statement in a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
	pub provenance: Provenance,
	pub effect: Effect,
	pub actions: Vec<String>,
	pub resources: Vec<String>,
	pub action_matched: bool,
	pub resource_matched: bool,
	pub condition: ConditionResult,
}

impl TraceEntry {
	/// Returns true if the statement survived matching and its condition.
	pub fn applies(&self) -> bool {
		self.action_matched && self.resource_matched && self.condition.is_satisfied()
	}
}

/// A decision together with every statement that was considered for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationTrace {
	pub decision: Decision,
	pub path: EvaluationPath,
	pub entries: Vec<TraceEntry>,
	pub evaluated_at: DateTime<Utc>,
}

/// What a principal may do on a resource.
///
/// `actions` lists the allowed concrete actions known to the deployment.
/// Wildcard grants may also cover actions outside that list, so the complete
/// answer is `granted_patterns` minus `denied_patterns`, which
/// [`EffectivePermissions::allows`] checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermissions {
	/// The qualified ARN, or the raw input if it could not be resolved.
	pub resource: String,
	pub actions: BTreeSet<String>,
	/// Allow patterns in force, without those wholly covered by a Deny.
	pub granted_patterns: BTreeSet<String>,
	/// Deny patterns carving exceptions out of `granted_patterns`.
	#[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
	pub denied_patterns: BTreeSet<String>,
	pub path: EvaluationPath,
	/// Set when enumeration short-circuited to nothing (wrong organization,
	/// store failure).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<DecisionReason>,
}

impl EffectivePermissions {
	pub fn empty(resource: impl Into<String>, reason: DecisionReason) -> Self {
		Self {
			resource: resource.into(),
			actions: BTreeSet::new(),
			granted_patterns: BTreeSet::new(),
			denied_patterns: BTreeSet::new(),
			path: EvaluationPath::Grants,
			reason: Some(reason),
		}
	}

	/// Returns true if the concrete action was enumerated.
	pub fn contains(&self, action: &str) -> bool {
		self.actions.contains(action)
	}

	/// Returns true if `action` is allowed, whether or not it was enumerated.
	pub fn allows(&self, action: &str) -> bool {
		self.granted_patterns.iter().any(|p| matches(p, action))
			&& !self.denied_patterns.iter().any(|p| matches(p, action))
	}
}
