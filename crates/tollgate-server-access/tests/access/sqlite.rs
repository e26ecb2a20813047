// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use chrono::Utc;

use tollgate_server_access::testing::{create_grant_test_store, document};
use tollgate_server_access::{
	AccessEngine, AssignmentId, CachedGrantStore, DecisionReason, GrantOrigin, PermissionId,
	PolicyId, Principal, PrincipalId, RequestContext, RoleId, ShareId, SqliteGrantStore,
};

use super::support::{arn, user};

async fn grant(store: &SqliteGrantStore, principal: Principal, document: &str) -> AssignmentId {
	let now = Utc::now().to_rfc3339();
	let policy_id = PolicyId::generate();
	let role_id = RoleId::generate();
	let assignment_id = AssignmentId::generate();

	sqlx::query(
		r#"
		INSERT INTO policies (id, org_id, name, version, document, status, system_managed, created_at, updated_at)
		VALUES (?, ?, 'p', 1, ?, 'active', 0, ?, ?)
		"#,
	)
	.bind(policy_id.to_string())
	.bind(principal.org_id.to_string())
	.bind(document)
	.bind(&now)
	.bind(&now)
	.execute(store.pool())
	.await
	.unwrap();

	sqlx::query("INSERT INTO roles (id, org_id, name) VALUES (?, ?, 'r')")
		.bind(role_id.to_string())
		.bind(principal.org_id.to_string())
		.execute(store.pool())
		.await
		.unwrap();

	sqlx::query("INSERT INTO role_policies (role_id, policy_id) VALUES (?, ?)")
		.bind(role_id.to_string())
		.bind(policy_id.to_string())
		.execute(store.pool())
		.await
		.unwrap();

	sqlx::query(
		r#"
		INSERT INTO role_assignments (id, role_id, principal_id, principal_type, created_at)
		VALUES (?, ?, ?, 'user', ?)
		"#,
	)
	.bind(assignment_id.to_string())
	.bind(role_id.to_string())
	.bind(principal.id.to_string())
	.bind(&now)
	.execute(store.pool())
	.await
	.unwrap();

	assignment_id
}

#[tokio::test]
async fn evaluates_against_sqlite() {
	let store = create_grant_test_store().await;
	let p = user();
	let allow = grant(&store, p, &document("Allow", &["resource:*"], &["*"])).await;
	grant(&store, p, &document("Deny", &["resource:Delete"], &["*"])).await;
	let engine = AccessEngine::new(store);
	let ctx = RequestContext::new();

	let read = engine.evaluate(&p, "resource:Read", "resource/1", &ctx).await;
	assert!(read.is_allowed());
	assert!(matches!(
		read.matched[0].origin,
		GrantOrigin::RoleAssignment { assignment_id, .. } if assignment_id == allow
	));

	let delete = engine.evaluate(&p, "resource:Delete", "resource/1", &ctx).await;
	assert_eq!(delete.reason, DecisionReason::ExplicitDeny);
}

#[tokio::test]
async fn cached_sqlite_store_sees_changes_after_invalidation() {
	let store = create_grant_test_store().await;
	let p = user();
	let engine = AccessEngine::new(CachedGrantStore::new(store, Duration::from_secs(60)));
	let ctx = RequestContext::new();

	assert!(!engine.evaluate(&p, "resource:Read", "resource/1", &ctx).await.is_allowed());
	grant(
		engine.store().inner(),
		p,
		&document("Allow", &["resource:Read"], &["*"]),
	)
	.await;
	assert!(!engine.evaluate(&p, "resource:Read", "resource/1", &ctx).await.is_allowed());

	engine.store().invalidate(&p.to_ref());
	assert!(engine.evaluate(&p, "resource:Read", "resource/1", &ctx).await.is_allowed());
}

#[tokio::test]
async fn corrupt_rows_do_not_deny_unrelated_grants() {
	let store = create_grant_test_store().await;
	let p = user();
	let resource = arn(&p, "resource/1");
	let now = Utc::now().to_rfc3339();

	sqlx::query(
		r#"
		INSERT INTO resource_permissions (id, resource, principal_id, principal_type, permission, effect, created_at)
		VALUES (?, ?, ?, 'user', 'resource:Read', 'Allow', ?)
		"#,
	)
	.bind(PermissionId::generate().to_string())
	.bind(&resource)
	.bind(p.id.to_string())
	.bind(&now)
	.execute(store.pool())
	.await
	.unwrap();

	let engine = AccessEngine::new(store);
	let ctx = RequestContext::new();
	assert!(engine.evaluate(&p, "resource:Read", &resource, &ctx).await.is_allowed());

	// Another user's share with an unknown access level.
	sqlx::query(
		r#"
		INSERT INTO resource_shares (id, resource, principal_id, principal_type, access_level, created_at)
		VALUES (?, ?, ?, 'user', 'owner', ?)
		"#,
	)
	.bind(ShareId::generate().to_string())
	.bind(&resource)
	.bind(PrincipalId::generate().to_string())
	.bind(&now)
	.execute(engine.store().pool())
	.await
	.unwrap();

	// One of p's own assignments with an unparseable CIDR override.
	sqlx::query(
		r#"
		INSERT INTO role_assignments (id, role_id, principal_id, principal_type, condition_overrides, created_at)
		VALUES (?, ?, ?, 'user', ?, ?)
		"#,
	)
	.bind(AssignmentId::generate().to_string())
	.bind(RoleId::generate().to_string())
	.bind(p.id.to_string())
	.bind(r#"{"IpAddress": {"source_ip": "10.0.0.0/99"}}"#)
	.bind(&now)
	.execute(engine.store().pool())
	.await
	.unwrap();

	let decision = engine.evaluate(&p, "resource:Read", &resource, &ctx).await;
	assert!(decision.is_allowed(), "{:?}", decision.reason);
	assert!(matches!(
		decision.matched[0].origin,
		GrantOrigin::ResourcePermission { .. }
	));
}
