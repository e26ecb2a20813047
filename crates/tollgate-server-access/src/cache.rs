// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-through cache for identity grant lookups.
//!
//! [`CachedGrantStore`] caches each principal's role assignments and group
//! memberships. An entry lives until the earlier of `max_ttl` after insertion
//! and the first `expires_at` among its live rows, so a cached grant is never
//! served past its own expiry. Entries are evicted lazily on read, and
//! inserts sweep expired entries once a map grows past a threshold, so the
//! cache stays bounded by the principals active within one TTL.
//!
//! Resource-scoped and content lookups are not cached.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tollgate_access_core::{
	CollaboratorRole, Group, GroupId, GroupMembership, Policy, PrincipalId, PrincipalRef,
	ResourceName, ResourcePermission, ResourceShare, Role, RoleAssignment, RoleId,
};

use crate::error::Result;
use crate::store::GrantStore;

/// Computes when a cache entry inserted at `inserted_at` must be dropped.
pub fn entry_deadline(
	inserted_at: DateTime<Utc>,
	max_ttl: Duration,
	expiries: impl IntoIterator<Item = Option<DateTime<Utc>>>,
) -> DateTime<Utc> {
	let cap = chrono::Duration::from_std(max_ttl)
		.ok()
		.and_then(|ttl| inserted_at.checked_add_signed(ttl))
		.unwrap_or(inserted_at);
	expiries
		.into_iter()
		.flatten()
		.filter(|at| *at > inserted_at)
		.fold(cap, std::cmp::min)
}

/// Map size at which inserts first sweep out expired entries.
const SWEEP_THRESHOLD: usize = 1024;

struct CacheEntry<T> {
	value: T,
	deadline: DateTime<Utc>,
}

/// Per-principal entries. Expired entries are dropped when read, and swept
/// in bulk whenever an insert finds the map at `sweep_at` entries, so
/// principals that are never read again do not accumulate.
struct Entries<T> {
	map: HashMap<PrincipalRef, CacheEntry<Vec<T>>>,
	sweep_at: usize,
}

impl<T> Entries<T> {
	fn new() -> Self {
		Self {
			map: HashMap::new(),
			sweep_at: SWEEP_THRESHOLD,
		}
	}

	fn insert(&mut self, key: PrincipalRef, entry: CacheEntry<Vec<T>>, now: DateTime<Utc>) {
		if self.map.len() >= self.sweep_at {
			self.purge(now);
			// Live entries survive a sweep; back off so inserts stay amortized O(1).
			self.sweep_at = SWEEP_THRESHOLD.max(self.map.len() * 2);
		}
		self.map.insert(key, entry);
	}

	fn purge(&mut self, now: DateTime<Utc>) {
		self.map.retain(|_, entry| now < entry.deadline);
	}
}

type EntryMap<T> = Mutex<Entries<T>>;

fn lock<T>(map: &EntryMap<T>) -> MutexGuard<'_, Entries<T>> {
	map.lock().unwrap_or_else(PoisonError::into_inner)
}

fn cached<T: Clone>(map: &EntryMap<T>, key: &PrincipalRef) -> Option<Vec<T>> {
	let mut entries = lock(map);
	match entries.map.get(key) {
		Some(entry) if Utc::now() < entry.deadline => Some(entry.value.clone()),
		Some(_) => {
			entries.map.remove(key);
			None
		}
		None => None,
	}
}

fn store<T>(
	map: &EntryMap<T>,
	key: PrincipalRef,
	value: Vec<T>,
	deadline: DateTime<Utc>,
	now: DateTime<Utc>,
) {
	lock(map).insert(key, CacheEntry { value, deadline }, now);
}

/// A [`GrantStore`] decorator caching per-principal identity lookups.
pub struct CachedGrantStore<S> {
	inner: S,
	max_ttl: Duration,
	assignments: EntryMap<RoleAssignment>,
	memberships: EntryMap<GroupMembership>,
}

impl<S: GrantStore> CachedGrantStore<S> {
	pub fn new(inner: S, max_ttl: Duration) -> Self {
		Self {
			inner,
			max_ttl,
			assignments: Mutex::new(Entries::new()),
			memberships: Mutex::new(Entries::new()),
		}
	}

	pub fn inner(&self) -> &S {
		&self.inner
	}

	/// Drops everything cached for one principal.
	pub fn invalidate(&self, principal: &PrincipalRef) {
		lock(&self.assignments).map.remove(principal);
		lock(&self.memberships).map.remove(principal);
	}

	pub fn clear(&self) {
		lock(&self.assignments).map.clear();
		lock(&self.memberships).map.clear();
	}

	/// Drops every expired entry.
	pub fn purge_expired(&self) {
		let now = Utc::now();
		lock(&self.assignments).purge(now);
		lock(&self.memberships).purge(now);
	}

	/// Number of cached per-principal entries, live or not yet swept.
	pub fn len(&self) -> usize {
		lock(&self.assignments).map.len() + lock(&self.memberships).map.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[async_trait]
impl<S: GrantStore> GrantStore for CachedGrantStore<S> {
	async fn list_role_assignments(&self, principal: &PrincipalRef) -> Result<Vec<RoleAssignment>> {
		if let Some(hit) = cached(&self.assignments, principal) {
			tracing::trace!(principal = %principal, "role assignment cache hit");
			return Ok(hit);
		}
		let value = self.inner.list_role_assignments(principal).await?;
		let now = Utc::now();
		let deadline = entry_deadline(now, self.max_ttl, value.iter().map(|a| a.expires_at));
		store(&self.assignments, *principal, value.clone(), deadline, now);
		Ok(value)
	}

	async fn list_group_memberships(
		&self,
		principal: &PrincipalRef,
	) -> Result<Vec<GroupMembership>> {
		if let Some(hit) = cached(&self.memberships, principal) {
			tracing::trace!(principal = %principal, "group membership cache hit");
			return Ok(hit);
		}
		let value = self.inner.list_group_memberships(principal).await?;
		let now = Utc::now();
		let deadline = entry_deadline(now, self.max_ttl, value.iter().map(|m| m.expires_at));
		store(&self.memberships, *principal, value.clone(), deadline, now);
		Ok(value)
	}

	async fn get_role(&self, id: RoleId) -> Result<Option<Role>> {
		self.inner.get_role(id).await
	}

	async fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
		self.inner.get_group(id).await
	}

	async fn list_role_policies(&self, id: RoleId) -> Result<Vec<Policy>> {
		self.inner.list_role_policies(id).await
	}

	async fn list_group_roles(&self, id: GroupId) -> Result<Vec<Role>> {
		self.inner.list_group_roles(id).await
	}

	async fn list_group_policies(&self, id: GroupId) -> Result<Vec<Policy>> {
		self.inner.list_group_policies(id).await
	}

	async fn list_resource_permissions(
		&self,
		resource: &ResourceName,
	) -> Result<Vec<ResourcePermission>> {
		self.inner.list_resource_permissions(resource).await
	}

	async fn list_resource_shares(&self, resource: &ResourceName) -> Result<Vec<ResourceShare>> {
		self.inner.list_resource_shares(resource).await
	}

	async fn get_content_collaborator_role(
		&self,
		content: &ResourceName,
		user_id: PrincipalId,
	) -> Result<Option<CollaboratorRole>> {
		self.inner
			.get_content_collaborator_role(content, user_id)
			.await
	}

	async fn get_content_owner(&self, content: &ResourceName) -> Result<Option<PrincipalId>> {
		self.inner.get_content_owner(content).await
	}
}
