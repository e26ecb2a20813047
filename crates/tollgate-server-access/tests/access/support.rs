// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use tollgate_server_access::{
	CollaboratorRole, Group, GroupId, GroupMembership, GrantStore, OrgId, Policy, Principal,
	PrincipalId, PrincipalRef, ResourceName, ResourcePermission, ResourceShare, Role,
	RoleAssignment, RoleId, StoreError, DEFAULT_NAMESPACE,
};

pub fn user() -> Principal {
	Principal::user(PrincipalId::generate(), OrgId::generate())
}

pub fn arn(principal: &Principal, path: &str) -> String {
	let (resource_type, resource_id) = path.split_once('/').unwrap();
	ResourceName::new(DEFAULT_NAMESPACE, principal.org_id, resource_type, resource_id).to_string()
}

/// A grant store whose every lookup fails.
pub struct FailingStore;

fn offline<T>() -> tollgate_server_access::Result<T> {
	Err(StoreError::Internal("database offline".to_string()))
}

#[async_trait]
impl GrantStore for FailingStore {
	async fn list_role_assignments(
		&self,
		_: &PrincipalRef,
	) -> tollgate_server_access::Result<Vec<RoleAssignment>> {
		offline()
	}

	async fn list_group_memberships(
		&self,
		_: &PrincipalRef,
	) -> tollgate_server_access::Result<Vec<GroupMembership>> {
		offline()
	}

	async fn get_role(&self, _: RoleId) -> tollgate_server_access::Result<Option<Role>> {
		offline()
	}

	async fn get_group(&self, _: GroupId) -> tollgate_server_access::Result<Option<Group>> {
		offline()
	}

	async fn list_role_policies(&self, _: RoleId) -> tollgate_server_access::Result<Vec<Policy>> {
		offline()
	}

	async fn list_group_roles(&self, _: GroupId) -> tollgate_server_access::Result<Vec<Role>> {
		offline()
	}

	async fn list_group_policies(&self, _: GroupId) -> tollgate_server_access::Result<Vec<Policy>> {
		offline()
	}

	async fn list_resource_permissions(
		&self,
		_: &ResourceName,
	) -> tollgate_server_access::Result<Vec<ResourcePermission>> {
		offline()
	}

	async fn list_resource_shares(
		&self,
		_: &ResourceName,
	) -> tollgate_server_access::Result<Vec<ResourceShare>> {
		offline()
	}

	async fn get_content_collaborator_role(
		&self,
		_: &ResourceName,
		_: PrincipalId,
	) -> tollgate_server_access::Result<Option<CollaboratorRole>> {
		offline()
	}

	async fn get_content_owner(
		&self,
		_: &ResourceName,
	) -> tollgate_server_access::Result<Option<PrincipalId>> {
		offline()
	}
}
