// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grant entities: policies, roles, groups and the records linking them to
//! principals and resources.
//!
//! Role assignments, group memberships and resource shares lapse by expiry.
//! Expiry is never an error; it is checked lazily with [`is_live`] at
//! evaluation time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::arn::ResourceName;
use crate::condition::ConditionBlock;
use crate::document::{Effect, PolicyDocument};
use crate::error::{AccessError, Result};
use crate::types::{
	AssignmentId, GroupId, MembershipId, OrgId, PermissionId, PolicyId, PrincipalId, PrincipalRef,
	PrincipalType, RoleId, ShareId,
};

/// Returns true if a grant with the given expiry is still in force at `now`.
pub fn is_live(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
	expires_at.is_none_or(|at| at > now)
}

// =============================================================================
// Policies
// =============================================================================

/// Lifecycle state of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
	Active,
	Suspended,
}

impl fmt::Display for PolicyStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PolicyStatus::Active => write!(f, "active"),
			PolicyStatus::Suspended => write!(f, "suspended"),
		}
	}
}

impl std::str::FromStr for PolicyStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"active" => Ok(PolicyStatus::Active),
			"suspended" => Ok(PolicyStatus::Suspended),
			other => Err(format!("unknown policy status '{other}'")),
		}
	}
}

/// A stored policy. The document is kept raw and parsed on use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
	pub id: PolicyId,
	pub org_id: OrgId,
	pub name: String,
	pub version: u32,
	pub document: String,
	pub status: PolicyStatus,
	#[serde(default)]
	pub system_managed: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Policy {
	pub fn parse_document(&self) -> Result<PolicyDocument> {
		PolicyDocument::parse(&self.document)
	}

	/// Attach/update-time validation of the document.
	pub fn validate(&self) -> Result<()> {
		self.parse_document().map(|_| ())
	}

	pub fn is_active(&self) -> bool {
		self.status == PolicyStatus::Active
	}

	pub fn ensure_detachable(&self) -> Result<()> {
		if self.system_managed {
			return Err(AccessError::SystemPolicy(self.id));
		}
		Ok(())
	}

	pub fn ensure_deletable(&self) -> Result<()> {
		self.ensure_detachable()
	}
}

// =============================================================================
// Roles and assignments
// =============================================================================

/// A named bundle of policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	pub id: RoleId,
	pub org_id: OrgId,
	pub name: String,
	/// Principal types that may assume the role. Empty means any.
	#[serde(default)]
	pub assumable_by: Vec<PrincipalType>,
	#[serde(default)]
	pub policy_ids: Vec<PolicyId>,
}

impl Role {
	pub fn can_be_assumed_by(&self, principal_type: PrincipalType) -> bool {
		self.assumable_by.is_empty() || self.assumable_by.contains(&principal_type)
	}
}

/// Grants a role to a principal, optionally until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
	pub id: AssignmentId,
	pub role_id: RoleId,
	pub principal: PrincipalRef,
	pub assigned_by: Option<PrincipalId>,
	pub expires_at: Option<DateTime<Utc>>,
	/// ANDed onto every statement reached through this assignment.
	#[serde(default)]
	pub condition_overrides: Option<ConditionBlock>,
	pub created_at: DateTime<Utc>,
}

impl RoleAssignment {
	pub fn is_live(&self, now: DateTime<Utc>) -> bool {
		is_live(self.expires_at, now)
	}
}

// =============================================================================
// Groups
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
	pub id: GroupId,
	pub org_id: OrgId,
	pub name: String,
}

/// A member's standing within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
	Member,
	Admin,
}

impl fmt::Display for GroupRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			GroupRole::Member => write!(f, "member"),
			GroupRole::Admin => write!(f, "admin"),
		}
	}
}

impl std::str::FromStr for GroupRole {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"member" => Ok(GroupRole::Member),
			"admin" => Ok(GroupRole::Admin),
			other => Err(format!("unknown group role '{other}'")),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
	pub id: MembershipId,
	pub group_id: GroupId,
	pub principal: PrincipalRef,
	pub role_in_group: GroupRole,
	pub expires_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

impl GroupMembership {
	pub fn is_live(&self, now: DateTime<Utc>) -> bool {
		is_live(self.expires_at, now)
	}
}

// =============================================================================
// Resource-scoped grants
// =============================================================================

/// A single action granted (or denied) on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePermission {
	pub id: PermissionId,
	pub resource: ResourceName,
	pub principal: PrincipalRef,
	pub permission: String,
	pub effect: Effect,
	pub created_at: DateTime<Utc>,
}

/// Share access levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
	Read,
	Write,
	Admin,
}

impl AccessLevel {
	/// Action patterns a share of this level allows.
	pub fn actions(&self) -> &'static [&'static str] {
		match self {
			AccessLevel::Read => &["*:Read", "*:List"],
			AccessLevel::Write => &["*:Read", "*:List", "*:Write"],
			AccessLevel::Admin => &["*"],
		}
	}
}

impl fmt::Display for AccessLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AccessLevel::Read => write!(f, "read"),
			AccessLevel::Write => write!(f, "write"),
			AccessLevel::Admin => write!(f, "admin"),
		}
	}
}

impl std::str::FromStr for AccessLevel {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"read" => Ok(AccessLevel::Read),
			"write" => Ok(AccessLevel::Write),
			"admin" => Ok(AccessLevel::Admin),
			other => Err(format!("unknown access level '{other}'")),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceShare {
	pub id: ShareId,
	pub resource: ResourceName,
	pub principal: PrincipalRef,
	pub access_level: AccessLevel,
	pub expires_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

impl ResourceShare {
	pub fn is_live(&self, now: DateTime<Utc>) -> bool {
		is_live(self.expires_at, now)
	}
}

// =============================================================================
// Content collaboration
// =============================================================================

/// A user's role on a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollaboratorRole {
	#[serde(rename = "owner")]
	Owner,
	#[serde(rename = "co-author")]
	CoAuthor,
}

impl fmt::Display for CollaboratorRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CollaboratorRole::Owner => write!(f, "owner"),
			CollaboratorRole::CoAuthor => write!(f, "co-author"),
		}
	}
}

impl std::str::FromStr for CollaboratorRole {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"owner" => Ok(CollaboratorRole::Owner),
			"co-author" => Ok(CollaboratorRole::CoAuthor),
			other => Err(format!("unknown collaborator role '{other}'")),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCollaborator {
	pub content: ResourceName,
	pub user_id: PrincipalId,
	pub role: CollaboratorRole,
}
