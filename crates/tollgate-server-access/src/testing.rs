// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fixture builders for tests.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use tollgate_access_core::{
	AccessLevel, AssignmentId, Effect, Group, GroupId, GroupMembership, GroupRole, MembershipId,
	OrgId, PermissionId, Policy, PolicyId, PolicyStatus, Principal, ResourceName,
	ResourcePermission, ResourceShare, Role, RoleAssignment, RoleId, ShareId,
};

use crate::repository::SqliteGrantStore;
use crate::store::InMemoryGrantStore;

pub const ALLOW_ALL: &str =
	r#"{"Version": "1", "Statement": [{"Effect": "Allow", "Action": "*", "Resource": "*"}]}"#;

/// A single-statement document.
pub fn document(effect: &str, actions: &[&str], resources: &[&str]) -> String {
	serde_json::json!({
		"Version": "1",
		"Statement": [{ "Effect": effect, "Action": actions, "Resource": resources }]
	})
	.to_string()
}

pub fn policy(org_id: OrgId, document: &str) -> Policy {
	let now = Utc::now();
	Policy {
		id: PolicyId::generate(),
		org_id,
		name: "test-policy".to_string(),
		version: 1,
		document: document.to_string(),
		status: PolicyStatus::Active,
		system_managed: false,
		created_at: now,
		updated_at: now,
	}
}

pub fn role(org_id: OrgId, policy_ids: &[PolicyId]) -> Role {
	Role {
		id: RoleId::generate(),
		org_id,
		name: "test-role".to_string(),
		assumable_by: vec![],
		policy_ids: policy_ids.to_vec(),
	}
}

pub fn assignment(
	role_id: RoleId,
	principal: Principal,
	expires_at: Option<DateTime<Utc>>,
) -> RoleAssignment {
	RoleAssignment {
		id: AssignmentId::generate(),
		role_id,
		principal: principal.to_ref(),
		assigned_by: None,
		expires_at,
		condition_overrides: None,
		created_at: Utc::now(),
	}
}

pub fn group(org_id: OrgId) -> Group {
	Group {
		id: GroupId::generate(),
		org_id,
		name: "test-group".to_string(),
	}
}

pub fn membership(
	group_id: GroupId,
	principal: Principal,
	expires_at: Option<DateTime<Utc>>,
) -> GroupMembership {
	GroupMembership {
		id: MembershipId::generate(),
		group_id,
		principal: principal.to_ref(),
		role_in_group: GroupRole::Member,
		expires_at,
		created_at: Utc::now(),
	}
}

pub fn permission(
	resource: &ResourceName,
	principal: Principal,
	action: &str,
	effect: Effect,
) -> ResourcePermission {
	ResourcePermission {
		id: PermissionId::generate(),
		resource: resource.clone(),
		principal: principal.to_ref(),
		permission: action.to_string(),
		effect,
		created_at: Utc::now(),
	}
}

pub fn share(
	resource: &ResourceName,
	principal: Principal,
	access_level: AccessLevel,
	expires_at: Option<DateTime<Utc>>,
) -> ResourceShare {
	ResourceShare {
		id: ShareId::generate(),
		resource: resource.clone(),
		principal: principal.to_ref(),
		access_level,
		expires_at,
		created_at: Utc::now(),
	}
}

/// Grants `document` to `principal` through a fresh role.
///
/// Returns the created assignment.
pub fn grant_via_role(
	store: &InMemoryGrantStore,
	principal: Principal,
	document: &str,
	expires_at: Option<DateTime<Utc>>,
) -> RoleAssignment {
	let p = policy(principal.org_id, document);
	let r = role(principal.org_id, &[p.id]);
	let a = assignment(r.id, principal, expires_at);
	store.insert_policy(p);
	store.insert_role(r);
	store.insert_assignment(a.clone());
	a
}

pub async fn create_test_pool() -> SqlitePool {
	SqlitePool::connect(":memory:").await.unwrap()
}

/// An in-memory SQLite grant store with the schema applied.
pub async fn create_grant_test_store() -> SqliteGrantStore {
	let store = SqliteGrantStore::new(create_test_pool().await);
	store.ensure_schema().await.unwrap();
	store
}
