// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier newtypes and principals.
//!
//! Every entity that takes part in access resolution is keyed by a UUID
//! newtype ([`PrincipalId`], [`OrgId`], [`PolicyId`], ...) so that ids of
//! different kinds cannot be mixed up. All of them serialize transparently as
//! UUID strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(PrincipalId, "Unique identifier for a user or service account.");
define_id_type!(OrgId, "Unique identifier for an organization.");
define_id_type!(PolicyId, "Unique identifier for a policy.");
define_id_type!(RoleId, "Unique identifier for a role.");
define_id_type!(GroupId, "Unique identifier for a group.");
define_id_type!(AssignmentId, "Unique identifier for a role assignment.");
define_id_type!(MembershipId, "Unique identifier for a group membership.");
define_id_type!(PermissionId, "Unique identifier for a direct resource permission.");
define_id_type!(ShareId, "Unique identifier for a resource share.");

// =============================================================================
// Principals
// =============================================================================

/// Kind of principal that can receive permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
	User,
	ServiceAccount,
}

impl PrincipalType {
	/// Returns all principal types.
	pub fn all() -> &'static [PrincipalType] {
		&[PrincipalType::User, PrincipalType::ServiceAccount]
	}
}

impl fmt::Display for PrincipalType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PrincipalType::User => write!(f, "user"),
			PrincipalType::ServiceAccount => write!(f, "service_account"),
		}
	}
}

impl FromStr for PrincipalType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"user" => Ok(PrincipalType::User),
			"service_account" => Ok(PrincipalType::ServiceAccount),
			other => Err(format!("unknown principal type '{other}'")),
		}
	}
}

/// Reference to a principal as stored on grant-linking records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalRef {
	pub id: PrincipalId,
	pub principal_type: PrincipalType,
}

impl PrincipalRef {
	pub fn new(id: PrincipalId, principal_type: PrincipalType) -> Self {
		Self { id, principal_type }
	}
}

impl fmt::Display for PrincipalRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.principal_type, self.id)
	}
}

/// The principal an access decision is made for.
///
/// Group memberships and role assignments are not carried here; they are read
/// from the grant store by [`PrincipalRef`] at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
	pub id: PrincipalId,
	pub principal_type: PrincipalType,
	pub org_id: OrgId,
}

impl Principal {
	pub fn new(id: PrincipalId, principal_type: PrincipalType, org_id: OrgId) -> Self {
		Self {
			id,
			principal_type,
			org_id,
		}
	}

	/// Creates a user principal.
	pub fn user(id: PrincipalId, org_id: OrgId) -> Self {
		Self::new(id, PrincipalType::User, org_id)
	}

	/// Creates a service-account principal.
	pub fn service_account(id: PrincipalId, org_id: OrgId) -> Self {
		Self::new(id, PrincipalType::ServiceAccount, org_id)
	}

	/// Returns the reference used to look up this principal's grants.
	pub fn to_ref(self) -> PrincipalRef {
		PrincipalRef::new(self.id, self.principal_type)
	}

	/// Returns true if the given record reference names this principal.
	pub fn is(&self, other: &PrincipalRef) -> bool {
		self.id == other.id && self.principal_type == other.principal_type
	}
}
