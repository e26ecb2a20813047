// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read access to grant state.
//!
//! [`GrantStore`] is the only way the engine sees policies, roles, groups and
//! grant-linking records. Implementations are expected to be organization
//! scoped and consistent per call; the engine never writes through them.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use tollgate_access_core::{
	AssignmentId, CollaboratorRole, ContentCollaborator, Group, GroupId, GroupMembership,
	MembershipId, Policy, PolicyId, PrincipalId, PrincipalRef, ResourceName, ResourcePermission,
	ResourceShare, Role, RoleAssignment, RoleId,
};

use crate::error::Result;

/// Read-only view of grant state.
///
/// Unknown ids yield `Ok(None)` or an empty list, never an error.
#[async_trait]
pub trait GrantStore: Send + Sync {
	// Identity-scoped lookups
	async fn list_role_assignments(&self, principal: &PrincipalRef) -> Result<Vec<RoleAssignment>>;
	async fn list_group_memberships(&self, principal: &PrincipalRef)
		-> Result<Vec<GroupMembership>>;
	async fn get_role(&self, id: RoleId) -> Result<Option<Role>>;
	async fn get_group(&self, id: GroupId) -> Result<Option<Group>>;

	/// Policies attached to a role, in attachment order.
	async fn list_role_policies(&self, id: RoleId) -> Result<Vec<Policy>>;

	/// Roles attached to a group, in attachment order.
	async fn list_group_roles(&self, id: GroupId) -> Result<Vec<Role>>;

	/// Policies attached directly to a group, in attachment order.
	async fn list_group_policies(&self, id: GroupId) -> Result<Vec<Policy>>;

	// Resource-scoped lookups
	async fn list_resource_permissions(
		&self,
		resource: &ResourceName,
	) -> Result<Vec<ResourcePermission>>;
	async fn list_resource_shares(&self, resource: &ResourceName) -> Result<Vec<ResourceShare>>;

	// Content collaboration
	async fn get_content_collaborator_role(
		&self,
		content: &ResourceName,
		user_id: PrincipalId,
	) -> Result<Option<CollaboratorRole>>;

	/// The content item's `owner_id`, which may exist before the owner's
	/// collaborator row does.
	async fn get_content_owner(&self, content: &ResourceName) -> Result<Option<PrincipalId>>;
}

#[async_trait]
impl<T: GrantStore + ?Sized> GrantStore for Arc<T> {
	async fn list_role_assignments(&self, principal: &PrincipalRef) -> Result<Vec<RoleAssignment>> {
		(**self).list_role_assignments(principal).await
	}

	async fn list_group_memberships(
		&self,
		principal: &PrincipalRef,
	) -> Result<Vec<GroupMembership>> {
		(**self).list_group_memberships(principal).await
	}

	async fn get_role(&self, id: RoleId) -> Result<Option<Role>> {
		(**self).get_role(id).await
	}

	async fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
		(**self).get_group(id).await
	}

	async fn list_role_policies(&self, id: RoleId) -> Result<Vec<Policy>> {
		(**self).list_role_policies(id).await
	}

	async fn list_group_roles(&self, id: GroupId) -> Result<Vec<Role>> {
		(**self).list_group_roles(id).await
	}

	async fn list_group_policies(&self, id: GroupId) -> Result<Vec<Policy>> {
		(**self).list_group_policies(id).await
	}

	async fn list_resource_permissions(
		&self,
		resource: &ResourceName,
	) -> Result<Vec<ResourcePermission>> {
		(**self).list_resource_permissions(resource).await
	}

	async fn list_resource_shares(&self, resource: &ResourceName) -> Result<Vec<ResourceShare>> {
		(**self).list_resource_shares(resource).await
	}

	async fn get_content_collaborator_role(
		&self,
		content: &ResourceName,
		user_id: PrincipalId,
	) -> Result<Option<CollaboratorRole>> {
		(**self)
			.get_content_collaborator_role(content, user_id)
			.await
	}

	async fn get_content_owner(&self, content: &ResourceName) -> Result<Option<PrincipalId>> {
		(**self).get_content_owner(content).await
	}
}

#[derive(Debug, Default)]
struct Inner {
	policies: HashMap<PolicyId, Policy>,
	roles: HashMap<RoleId, Role>,
	groups: HashMap<GroupId, Group>,
	assignments: Vec<RoleAssignment>,
	memberships: Vec<GroupMembership>,
	group_roles: HashMap<GroupId, Vec<RoleId>>,
	group_policies: HashMap<GroupId, Vec<PolicyId>>,
	permissions: Vec<ResourcePermission>,
	shares: Vec<ResourceShare>,
	collaborators: Vec<ContentCollaborator>,
	content_owners: HashMap<ResourceName, PrincipalId>,
}

impl Inner {
	fn policies_in_order(&self, ids: &[PolicyId]) -> Vec<Policy> {
		ids.iter()
			.filter_map(|id| self.policies.get(id).cloned())
			.collect()
	}
}

/// In-memory grant store for tests and dry runs.
///
/// Mutators mirror what the administrative layer would do, so tests can
/// interleave grant changes with evaluations.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
	inner: RwLock<Inner>,
}

impl InMemoryGrantStore {
	pub fn new() -> Self {
		Self::default()
	}

	// A panic while holding the lock cannot leave `Inner` half-updated: every
	// mutator is a single insert or retain.
	fn read(&self) -> RwLockReadGuard<'_, Inner> {
		self.inner.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn write(&self) -> RwLockWriteGuard<'_, Inner> {
		self.inner.write().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn insert_policy(&self, policy: Policy) {
		self.write().policies.insert(policy.id, policy);
	}

	pub fn remove_policy(&self, id: PolicyId) {
		self.write().policies.remove(&id);
	}

	pub fn insert_role(&self, role: Role) {
		self.write().roles.insert(role.id, role);
	}

	pub fn remove_role(&self, id: RoleId) {
		self.write().roles.remove(&id);
	}

	pub fn insert_group(&self, group: Group) {
		self.write().groups.insert(group.id, group);
	}

	pub fn attach_group_role(&self, group_id: GroupId, role_id: RoleId) {
		self.write().group_roles.entry(group_id).or_default().push(role_id);
	}

	pub fn attach_group_policy(&self, group_id: GroupId, policy_id: PolicyId) {
		self.write()
			.group_policies
			.entry(group_id)
			.or_default()
			.push(policy_id);
	}

	pub fn insert_assignment(&self, assignment: RoleAssignment) {
		self.write().assignments.push(assignment);
	}

	pub fn remove_assignment(&self, id: AssignmentId) {
		self.write().assignments.retain(|a| a.id != id);
	}

	pub fn insert_membership(&self, membership: GroupMembership) {
		self.write().memberships.push(membership);
	}

	pub fn remove_membership(&self, id: MembershipId) {
		self.write().memberships.retain(|m| m.id != id);
	}

	pub fn insert_permission(&self, permission: ResourcePermission) {
		self.write().permissions.push(permission);
	}

	pub fn insert_share(&self, share: ResourceShare) {
		self.write().shares.push(share);
	}

	pub fn insert_collaborator(&self, collaborator: ContentCollaborator) {
		self.write().collaborators.push(collaborator);
	}

	pub fn set_content_owner(&self, content: ResourceName, owner: PrincipalId) {
		self.write().content_owners.insert(content, owner);
	}
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
	async fn list_role_assignments(&self, principal: &PrincipalRef) -> Result<Vec<RoleAssignment>> {
		Ok(self
			.read()
			.assignments
			.iter()
			.filter(|a| a.principal == *principal)
			.cloned()
			.collect())
	}

	async fn list_group_memberships(
		&self,
		principal: &PrincipalRef,
	) -> Result<Vec<GroupMembership>> {
		Ok(self
			.read()
			.memberships
			.iter()
			.filter(|m| m.principal == *principal)
			.cloned()
			.collect())
	}

	async fn get_role(&self, id: RoleId) -> Result<Option<Role>> {
		Ok(self.read().roles.get(&id).cloned())
	}

	async fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
		Ok(self.read().groups.get(&id).cloned())
	}

	async fn list_role_policies(&self, id: RoleId) -> Result<Vec<Policy>> {
		let inner = self.read();
		Ok(inner
			.roles
			.get(&id)
			.map(|role| inner.policies_in_order(&role.policy_ids))
			.unwrap_or_default())
	}

	async fn list_group_roles(&self, id: GroupId) -> Result<Vec<Role>> {
		let inner = self.read();
		Ok(inner
			.group_roles
			.get(&id)
			.map(|ids| {
				ids.iter()
					.filter_map(|role_id| inner.roles.get(role_id).cloned())
					.collect()
			})
			.unwrap_or_default())
	}

	async fn list_group_policies(&self, id: GroupId) -> Result<Vec<Policy>> {
		let inner = self.read();
		Ok(inner
			.group_policies
			.get(&id)
			.map(|ids| inner.policies_in_order(ids))
			.unwrap_or_default())
	}

	async fn list_resource_permissions(
		&self,
		resource: &ResourceName,
	) -> Result<Vec<ResourcePermission>> {
		Ok(self
			.read()
			.permissions
			.iter()
			.filter(|p| p.resource == *resource)
			.cloned()
			.collect())
	}

	async fn list_resource_shares(&self, resource: &ResourceName) -> Result<Vec<ResourceShare>> {
		Ok(self
			.read()
			.shares
			.iter()
			.filter(|s| s.resource == *resource)
			.cloned()
			.collect())
	}

	async fn get_content_collaborator_role(
		&self,
		content: &ResourceName,
		user_id: PrincipalId,
	) -> Result<Option<CollaboratorRole>> {
		Ok(self
			.read()
			.collaborators
			.iter()
			.find(|c| c.content == *content && c.user_id == user_id)
			.map(|c| c.role))
	}

	async fn get_content_owner(&self, content: &ResourceName) -> Result<Option<PrincipalId>> {
		Ok(self.read().content_owners.get(content).copied())
	}
}
