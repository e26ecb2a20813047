// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite-backed [`GrantStore`].
//!
//! Ids are stored as UUID strings, timestamps as RFC 3339 text and resource
//! identifiers as full ARNs. Condition overrides use the policy document
//! `Condition` wire form.
//!
//! A row that cannot be read is dropped with a warning rather than failing
//! the whole lookup, so one corrupt grant only loses itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{instrument, warn};

use tollgate_access_core::{
	CollaboratorRole, ConditionBlock, Group, GroupId, GroupMembership, Policy, PrincipalId,
	PrincipalRef, PrincipalType, ResourceName, ResourcePermission, ResourceShare, Role,
	RoleAssignment, RoleId,
};

use crate::error::{Result, StoreError};
use crate::store::GrantStore;

const SCHEMA: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS policies (
		id TEXT PRIMARY KEY,
		org_id TEXT NOT NULL,
		name TEXT NOT NULL,
		version INTEGER NOT NULL DEFAULT 1,
		document TEXT NOT NULL,
		status TEXT NOT NULL DEFAULT 'active',
		system_managed INTEGER NOT NULL DEFAULT 0,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS roles (
		id TEXT PRIMARY KEY,
		org_id TEXT NOT NULL,
		name TEXT NOT NULL,
		assumable_by TEXT NOT NULL DEFAULT '[]'
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS role_policies (
		role_id TEXT NOT NULL,
		policy_id TEXT NOT NULL,
		position INTEGER NOT NULL DEFAULT 0,
		PRIMARY KEY (role_id, policy_id)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS role_assignments (
		id TEXT PRIMARY KEY,
		role_id TEXT NOT NULL,
		principal_id TEXT NOT NULL,
		principal_type TEXT NOT NULL,
		assigned_by TEXT,
		expires_at TEXT,
		condition_overrides TEXT,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE INDEX IF NOT EXISTS idx_role_assignments_principal
		ON role_assignments (principal_id, principal_type)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS groups (
		id TEXT PRIMARY KEY,
		org_id TEXT NOT NULL,
		name TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS group_memberships (
		id TEXT PRIMARY KEY,
		group_id TEXT NOT NULL,
		principal_id TEXT NOT NULL,
		principal_type TEXT NOT NULL,
		role_in_group TEXT NOT NULL DEFAULT 'member',
		expires_at TEXT,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE INDEX IF NOT EXISTS idx_group_memberships_principal
		ON group_memberships (principal_id, principal_type)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS group_roles (
		group_id TEXT NOT NULL,
		role_id TEXT NOT NULL,
		position INTEGER NOT NULL DEFAULT 0,
		PRIMARY KEY (group_id, role_id)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS group_policies (
		group_id TEXT NOT NULL,
		policy_id TEXT NOT NULL,
		position INTEGER NOT NULL DEFAULT 0,
		PRIMARY KEY (group_id, policy_id)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS resource_permissions (
		id TEXT PRIMARY KEY,
		resource TEXT NOT NULL,
		principal_id TEXT NOT NULL,
		principal_type TEXT NOT NULL,
		permission TEXT NOT NULL,
		effect TEXT NOT NULL DEFAULT 'Allow',
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE INDEX IF NOT EXISTS idx_resource_permissions_resource
		ON resource_permissions (resource)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS resource_shares (
		id TEXT PRIMARY KEY,
		resource TEXT NOT NULL,
		principal_id TEXT NOT NULL,
		principal_type TEXT NOT NULL,
		access_level TEXT NOT NULL,
		expires_at TEXT,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE INDEX IF NOT EXISTS idx_resource_shares_resource
		ON resource_shares (resource)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS content_items (
		content TEXT PRIMARY KEY,
		owner_id TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS content_collaborators (
		content TEXT NOT NULL,
		user_id TEXT NOT NULL,
		role TEXT NOT NULL,
		PRIMARY KEY (content, user_id)
	)
	"#,
];

pub struct SqliteGrantStore {
	pool: SqlitePool,
}

impl SqliteGrantStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Creates the grant tables if they do not exist.
	#[instrument(skip(self))]
	pub async fn ensure_schema(&self) -> Result<()> {
		for statement in SCHEMA {
			sqlx::query(statement).execute(&self.pool).await?;
		}
		tracing::debug!("grant schema ensured");
		Ok(())
	}

	async fn role_policy_ids(&self, role_id: &str) -> Result<Vec<String>> {
		let ids: Vec<(String,)> = sqlx::query_as(
			r#"
			SELECT policy_id FROM role_policies
			WHERE role_id = ?
			ORDER BY position ASC, policy_id ASC
			"#,
		)
		.bind(role_id)
		.fetch_all(&self.pool)
		.await?;
		Ok(ids.into_iter().map(|(id,)| id).collect())
	}

	/// Returns `None` for a role row that cannot be read.
	async fn hydrate_role(&self, row: RoleRow) -> Result<Option<Role>> {
		let policy_ids = self.role_policy_ids(&row.id).await?;
		Ok(readable(row.into_role(policy_ids), "role"))
	}
}

#[async_trait]
impl GrantStore for SqliteGrantStore {
	#[instrument(skip(self), fields(principal = %principal))]
	async fn list_role_assignments(&self, principal: &PrincipalRef) -> Result<Vec<RoleAssignment>> {
		let rows = sqlx::query_as::<_, AssignmentRow>(
			r#"
			SELECT id, role_id, principal_id, principal_type, assigned_by, expires_at,
				   condition_overrides, created_at
			FROM role_assignments
			WHERE principal_id = ? AND principal_type = ?
			ORDER BY created_at ASC, id ASC
			"#,
		)
		.bind(principal.id.to_string())
		.bind(principal.principal_type.to_string())
		.fetch_all(&self.pool)
		.await?;

		Ok(readable_rows(rows, "role assignment"))
	}

	#[instrument(skip(self), fields(principal = %principal))]
	async fn list_group_memberships(
		&self,
		principal: &PrincipalRef,
	) -> Result<Vec<GroupMembership>> {
		let rows = sqlx::query_as::<_, MembershipRow>(
			r#"
			SELECT id, group_id, principal_id, principal_type, role_in_group, expires_at, created_at
			FROM group_memberships
			WHERE principal_id = ? AND principal_type = ?
			ORDER BY created_at ASC, id ASC
			"#,
		)
		.bind(principal.id.to_string())
		.bind(principal.principal_type.to_string())
		.fetch_all(&self.pool)
		.await?;

		Ok(readable_rows(rows, "group membership"))
	}

	#[instrument(skip(self), fields(role_id = %id))]
	async fn get_role(&self, id: RoleId) -> Result<Option<Role>> {
		let row = sqlx::query_as::<_, RoleRow>(
			r#"
			SELECT id, org_id, name, assumable_by
			FROM roles
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => self.hydrate_role(row).await,
			None => Ok(None),
		}
	}

	#[instrument(skip(self), fields(group_id = %id))]
	async fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
		let row = sqlx::query_as::<_, GroupRow>(
			r#"
			SELECT id, org_id, name
			FROM groups
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.and_then(|row| readable(Group::try_from(row), "group")))
	}

	#[instrument(skip(self), fields(role_id = %id))]
	async fn list_role_policies(&self, id: RoleId) -> Result<Vec<Policy>> {
		let rows = sqlx::query_as::<_, PolicyRow>(
			r#"
			SELECT p.id, p.org_id, p.name, p.version, p.document, p.status, p.system_managed,
				   p.created_at, p.updated_at
			FROM role_policies rp
			JOIN policies p ON p.id = rp.policy_id
			WHERE rp.role_id = ?
			ORDER BY rp.position ASC, p.id ASC
			"#,
		)
		.bind(id.to_string())
		.fetch_all(&self.pool)
		.await?;

		Ok(readable_rows(rows, "policy"))
	}

	#[instrument(skip(self), fields(group_id = %id))]
	async fn list_group_roles(&self, id: GroupId) -> Result<Vec<Role>> {
		let rows = sqlx::query_as::<_, RoleRow>(
			r#"
			SELECT r.id, r.org_id, r.name, r.assumable_by
			FROM group_roles gr
			JOIN roles r ON r.id = gr.role_id
			WHERE gr.group_id = ?
			ORDER BY gr.position ASC, r.id ASC
			"#,
		)
		.bind(id.to_string())
		.fetch_all(&self.pool)
		.await?;

		let mut roles = Vec::with_capacity(rows.len());
		for row in rows {
			if let Some(role) = self.hydrate_role(row).await? {
				roles.push(role);
			}
		}
		Ok(roles)
	}

	#[instrument(skip(self), fields(group_id = %id))]
	async fn list_group_policies(&self, id: GroupId) -> Result<Vec<Policy>> {
		let rows = sqlx::query_as::<_, PolicyRow>(
			r#"
			SELECT p.id, p.org_id, p.name, p.version, p.document, p.status, p.system_managed,
				   p.created_at, p.updated_at
			FROM group_policies gp
			JOIN policies p ON p.id = gp.policy_id
			WHERE gp.group_id = ?
			ORDER BY gp.position ASC, p.id ASC
			"#,
		)
		.bind(id.to_string())
		.fetch_all(&self.pool)
		.await?;

		Ok(readable_rows(rows, "policy"))
	}

	#[instrument(skip(self), fields(resource = %resource))]
	async fn list_resource_permissions(
		&self,
		resource: &ResourceName,
	) -> Result<Vec<ResourcePermission>> {
		let rows = sqlx::query_as::<_, PermissionRow>(
			r#"
			SELECT id, resource, principal_id, principal_type, permission, effect, created_at
			FROM resource_permissions
			WHERE resource = ?
			ORDER BY created_at ASC, id ASC
			"#,
		)
		.bind(resource.to_string())
		.fetch_all(&self.pool)
		.await?;

		Ok(readable_rows(rows, "resource permission"))
	}

	#[instrument(skip(self), fields(resource = %resource))]
	async fn list_resource_shares(&self, resource: &ResourceName) -> Result<Vec<ResourceShare>> {
		let rows = sqlx::query_as::<_, ShareRow>(
			r#"
			SELECT id, resource, principal_id, principal_type, access_level, expires_at, created_at
			FROM resource_shares
			WHERE resource = ?
			ORDER BY created_at ASC, id ASC
			"#,
		)
		.bind(resource.to_string())
		.fetch_all(&self.pool)
		.await?;

		Ok(readable_rows(rows, "resource share"))
	}

	#[instrument(skip(self), fields(content = %content, user_id = %user_id))]
	async fn get_content_collaborator_role(
		&self,
		content: &ResourceName,
		user_id: PrincipalId,
	) -> Result<Option<CollaboratorRole>> {
		let role: Option<(String,)> = sqlx::query_as(
			r#"
			SELECT role FROM content_collaborators
			WHERE content = ? AND user_id = ?
			"#,
		)
		.bind(content.to_string())
		.bind(user_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		Ok(role.and_then(|(role,)| {
			readable(parse_enum(&role, "collaborator role"), "collaborator")
		}))
	}

	#[instrument(skip(self), fields(content = %content))]
	async fn get_content_owner(&self, content: &ResourceName) -> Result<Option<PrincipalId>> {
		let owner: Option<(String,)> = sqlx::query_as(
			r#"
			SELECT owner_id FROM content_items
			WHERE content = ?
			"#,
		)
		.bind(content.to_string())
		.fetch_optional(&self.pool)
		.await?;

		Ok(owner.and_then(|(id,)| readable(parse_id(&id, "owner"), "content owner")))
	}
}

// Row conversion helpers

fn readable<T>(converted: Result<T>, what: &str) -> Option<T> {
	match converted {
		Ok(value) => Some(value),
		Err(e) => {
			warn!(kind = what, error = %e, "dropping unreadable row");
			None
		}
	}
}

fn readable_rows<R, T>(rows: Vec<R>, what: &str) -> Vec<T>
where
	T: TryFrom<R, Error = StoreError>,
{
	rows.into_iter()
		.filter_map(|row| readable(T::try_from(row), what))
		.collect()
}

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T> {
	raw.parse()
		.map_err(|_| StoreError::Internal(format!("Invalid {what} ID in database: {raw}")))
}

fn parse_enum<T>(raw: &str, what: &str) -> Result<T>
where
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	raw.parse()
		.map_err(|e| StoreError::Internal(format!("Invalid {what} in database: {e}")))
}

fn parse_timestamp(raw: &str, what: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| StoreError::Internal(format!("Invalid {what} in database: {raw}")))
}

fn parse_optional_timestamp(raw: Option<&str>, what: &str) -> Result<Option<DateTime<Utc>>> {
	raw.map(|s| parse_timestamp(s, what)).transpose()
}

fn parse_principal(id: &str, principal_type: &str) -> Result<PrincipalRef> {
	Ok(PrincipalRef::new(
		parse_id(id, "principal")?,
		parse_enum(principal_type, "principal type")?,
	))
}

fn parse_resource(raw: &str) -> Result<ResourceName> {
	ResourceName::parse_arn(raw)
		.map_err(|e| StoreError::Internal(format!("Invalid resource in database: {e}")))
}

// Database row types for sqlx

#[derive(sqlx::FromRow)]
struct PolicyRow {
	id: String,
	org_id: String,
	name: String,
	version: i64,
	document: String,
	status: String,
	system_managed: bool,
	created_at: String,
	updated_at: String,
}

impl TryFrom<PolicyRow> for Policy {
	type Error = StoreError;

	fn try_from(row: PolicyRow) -> Result<Self> {
		Ok(Policy {
			id: parse_id(&row.id, "policy")?,
			org_id: parse_id(&row.org_id, "org")?,
			name: row.name,
			version: u32::try_from(row.version)
				.map_err(|_| StoreError::Internal(format!("Invalid policy version {}", row.version)))?,
			document: row.document,
			status: parse_enum(&row.status, "policy status")?,
			system_managed: row.system_managed,
			created_at: parse_timestamp(&row.created_at, "created_at")?,
			updated_at: parse_timestamp(&row.updated_at, "updated_at")?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct RoleRow {
	id: String,
	org_id: String,
	name: String,
	assumable_by: String,
}

impl RoleRow {
	fn into_role(self, policy_ids: Vec<String>) -> Result<Role> {
		let assumable_by: Vec<PrincipalType> = serde_json::from_str(&self.assumable_by)?;
		let policy_ids = policy_ids
			.iter()
			.map(|id| parse_id(id, "policy"))
			.collect::<Result<Vec<_>>>()?;
		Ok(Role {
			id: parse_id(&self.id, "role")?,
			org_id: parse_id(&self.org_id, "org")?,
			name: self.name,
			assumable_by,
			policy_ids,
		})
	}
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
	id: String,
	role_id: String,
	principal_id: String,
	principal_type: String,
	assigned_by: Option<String>,
	expires_at: Option<String>,
	condition_overrides: Option<String>,
	created_at: String,
}

impl TryFrom<AssignmentRow> for RoleAssignment {
	type Error = StoreError;

	fn try_from(row: AssignmentRow) -> Result<Self> {
		let condition_overrides = match row.condition_overrides.as_deref() {
			None => None,
			Some(raw) => {
				let value: serde_json::Value = serde_json::from_str(raw)?;
				Some(ConditionBlock::from_json(&value).map_err(|e| {
					StoreError::Internal(format!("Invalid condition overrides on {}: {e}", row.id))
				})?)
			}
		};

		Ok(RoleAssignment {
			id: parse_id(&row.id, "assignment")?,
			role_id: parse_id(&row.role_id, "role")?,
			principal: parse_principal(&row.principal_id, &row.principal_type)?,
			assigned_by: row
				.assigned_by
				.as_deref()
				.map(|id| parse_id(id, "assigned_by"))
				.transpose()?,
			expires_at: parse_optional_timestamp(row.expires_at.as_deref(), "expires_at")?,
			condition_overrides,
			created_at: parse_timestamp(&row.created_at, "created_at")?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct GroupRow {
	id: String,
	org_id: String,
	name: String,
}

impl TryFrom<GroupRow> for Group {
	type Error = StoreError;

	fn try_from(row: GroupRow) -> Result<Self> {
		Ok(Group {
			id: parse_id(&row.id, "group")?,
			org_id: parse_id(&row.org_id, "org")?,
			name: row.name,
		})
	}
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
	id: String,
	group_id: String,
	principal_id: String,
	principal_type: String,
	role_in_group: String,
	expires_at: Option<String>,
	created_at: String,
}

impl TryFrom<MembershipRow> for GroupMembership {
	type Error = StoreError;

	fn try_from(row: MembershipRow) -> Result<Self> {
		Ok(GroupMembership {
			id: parse_id(&row.id, "membership")?,
			group_id: parse_id(&row.group_id, "group")?,
			principal: parse_principal(&row.principal_id, &row.principal_type)?,
			role_in_group: parse_enum(&row.role_in_group, "group role")?,
			expires_at: parse_optional_timestamp(row.expires_at.as_deref(), "expires_at")?,
			created_at: parse_timestamp(&row.created_at, "created_at")?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct PermissionRow {
	id: String,
	resource: String,
	principal_id: String,
	principal_type: String,
	permission: String,
	effect: String,
	created_at: String,
}

impl TryFrom<PermissionRow> for ResourcePermission {
	type Error = StoreError;

	fn try_from(row: PermissionRow) -> Result<Self> {
		Ok(ResourcePermission {
			id: parse_id(&row.id, "permission")?,
			resource: parse_resource(&row.resource)?,
			principal: parse_principal(&row.principal_id, &row.principal_type)?,
			permission: row.permission,
			effect: parse_enum(&row.effect, "effect")?,
			created_at: parse_timestamp(&row.created_at, "created_at")?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct ShareRow {
	id: String,
	resource: String,
	principal_id: String,
	principal_type: String,
	access_level: String,
	expires_at: Option<String>,
	created_at: String,
}

impl TryFrom<ShareRow> for ResourceShare {
	type Error = StoreError;

	fn try_from(row: ShareRow) -> Result<Self> {
		Ok(ResourceShare {
			id: parse_id(&row.id, "share")?,
			resource: parse_resource(&row.resource)?,
			principal: parse_principal(&row.principal_id, &row.principal_type)?,
			access_level: parse_enum(&row.access_level, "access level")?,
			expires_at: parse_optional_timestamp(row.expires_at.as_deref(), "expires_at")?,
			created_at: parse_timestamp(&row.created_at, "created_at")?,
		})
	}
}
