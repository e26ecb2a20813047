// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use tollgate_server_access::testing::{
	document, grant_via_role, group, membership, permission, policy, role, share,
};
use tollgate_server_access::{
	matches, qualify_resource_pattern, AccessEngine, AccessError, AccessLevel, BulkCheck,
	ConditionBlock, ConditionResult, DecisionReason, Effect, GrantOrigin, InMemoryGrantStore,
	OrgId, Principal, PrincipalId, RequestContext, ResourceName, DEFAULT_NAMESPACE,
};

use super::support::{arn, user, FailingStore};

#[tokio::test]
async fn no_grants_is_default_deny() {
	let engine = AccessEngine::new(InMemoryGrantStore::new());
	let decision = engine
		.evaluate(&user(), "resource:Read", "resource/1", &RequestContext::new())
		.await;
	assert_eq!(decision.effect, Effect::Deny);
	assert_eq!(decision.reason, DecisionReason::DefaultDeny);
	assert!(decision.matched.is_empty());
}

#[tokio::test]
async fn explicit_deny_beats_allow_from_another_source() {
	let store = InMemoryGrantStore::new();
	let p = user();
	grant_via_role(&store, p, &document("Allow", &["*"], &["*"]), None);
	let deny = grant_via_role(
		&store,
		p,
		&document("Deny", &["resource:Delete"], &["resource/*"]),
		None,
	);
	let engine = AccessEngine::new(store);

	let decision = engine
		.evaluate(&p, "resource:Delete", "resource/7", &RequestContext::new())
		.await;
	assert_eq!(decision.reason, DecisionReason::ExplicitDeny);
	assert_eq!(decision.matched.len(), 1);
	assert_eq!(
		decision.matched[0].origin,
		GrantOrigin::RoleAssignment {
			assignment_id: deny.id,
			role_id: deny.role_id,
		}
	);

	let read = engine
		.evaluate(&p, "resource:Read", "resource/7", &RequestContext::new())
		.await;
	assert_eq!(read.reason, DecisionReason::ExplicitAllow);
}

#[tokio::test]
async fn wildcard_patterns() {
	let store = InMemoryGrantStore::new();
	let p = user();
	grant_via_role(
		&store,
		p,
		&document("Allow", &["resource:*", "*:List"], &["resource/*"]),
		None,
	);
	let engine = AccessEngine::new(store);
	let ctx = RequestContext::new();

	assert!(engine.evaluate(&p, "resource:Share", "resource/9", &ctx).await.is_allowed());
	assert!(engine.evaluate(&p, "resource:List", "resource/9", &ctx).await.is_allowed());
	assert!(!engine.evaluate(&p, "policy:Read", "resource/9", &ctx).await.is_allowed());
	assert!(!engine.evaluate(&p, "resource:Read", "policy/9", &ctx).await.is_allowed());
	// Relative and fully qualified names resolve to the same resource.
	assert!(engine
		.evaluate(&p, "resource:Read", &arn(&p, "resource/9"), &ctx)
		.await
		.is_allowed());
}

#[tokio::test]
async fn expiry_boundary_is_exclusive() {
	let store = InMemoryGrantStore::new();
	let p = user();
	let expires = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
	grant_via_role(
		&store,
		p,
		&document("Allow", &["resource:Read"], &["*"]),
		Some(expires),
	);
	let engine = AccessEngine::new(store);

	let before = RequestContext::new().at(expires - Duration::seconds(1));
	let at = RequestContext::new().at(expires);
	assert!(engine.evaluate(&p, "resource:Read", "resource/1", &before).await.is_allowed());
	let decision = engine.evaluate(&p, "resource:Read", "resource/1", &at).await;
	assert_eq!(decision.reason, DecisionReason::DefaultDeny);
}

#[tokio::test]
async fn foreign_organization_is_denied_before_lookup() {
	let engine = AccessEngine::new(FailingStore);
	let p = user();
	let foreign = ResourceName::new(DEFAULT_NAMESPACE, OrgId::generate(), "resource", "1");
	let decision = engine
		.evaluate(&p, "resource:Read", &foreign.to_string(), &RequestContext::new())
		.await;
	assert_eq!(decision.reason, DecisionReason::OrganizationMismatch);
}

#[tokio::test]
async fn store_failure_denies() {
	let engine = AccessEngine::new(FailingStore);
	let p = user();
	for resource in ["resource/1", "content/1"] {
		let decision = engine
			.evaluate(&p, "resource:Read", resource, &RequestContext::new())
			.await;
		assert_eq!(decision.effect, Effect::Deny);
		assert!(matches!(
			decision.reason,
			DecisionReason::GrantStoreUnavailable { .. }
		));
	}
	let decisions = engine
		.bulk_evaluate(
			&p,
			&[BulkCheck::new("resource:Read", "resource/1")],
			&RequestContext::new(),
		)
		.await;
	assert!(!decisions[0].is_allowed());
}

#[tokio::test]
async fn check_reports_denial() {
	let engine = AccessEngine::new(InMemoryGrantStore::new());
	let err = engine
		.check(&user(), "resource:Write", "resource/1", &RequestContext::new())
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::Denied(ref m) if m.contains("resource:Write")));
}

#[tokio::test]
async fn conditions_gate_statements() {
	let store = InMemoryGrantStore::new();
	let p = user();
	let doc = serde_json::json!({
		"Version": "1",
		"Statement": [{
			"Sid": "OfficeOnly",
			"Effect": "Allow",
			"Action": "resource:Read",
			"Resource": "*",
			"Condition": { "IpAddress": { "source_ip": "10.0.0.0/8" } }
		}]
	})
	.to_string();
	grant_via_role(&store, p, &doc, None);
	let engine = AccessEngine::new(store);

	let inside = RequestContext::new().with("source_ip", "10.1.2.3");
	let outside = RequestContext::new().with("source_ip", "192.168.1.1");
	assert!(engine.evaluate(&p, "resource:Read", "resource/1", &inside).await.is_allowed());
	assert!(!engine.evaluate(&p, "resource:Read", "resource/1", &outside).await.is_allowed());

	let trace = engine
		.simulate(&p, "resource:Read", "resource/1", &outside)
		.await;
	assert_eq!(trace.entries.len(), 1);
	assert_eq!(trace.entries[0].provenance.sid.as_deref(), Some("OfficeOnly"));
	assert!(matches!(
		trace.entries[0].condition,
		ConditionResult::NotMet { ref key, .. } if key == "source_ip"
	));
}

#[tokio::test]
async fn assignment_overrides_restrict_the_role() {
	let store = InMemoryGrantStore::new();
	let p = user();
	let mut assignment = grant_via_role(&store, p, &document("Allow", &["*"], &["*"]), None);
	store.remove_assignment(assignment.id);
	assignment.condition_overrides = Some(
		ConditionBlock::from_json(&serde_json::json!({ "Bool": { "mfa": true } })).unwrap(),
	);
	store.insert_assignment(assignment);
	let engine = AccessEngine::new(store);

	let without = RequestContext::new();
	let with_mfa = RequestContext::new().with("mfa", "true");
	assert!(!engine.evaluate(&p, "resource:Read", "resource/1", &without).await.is_allowed());
	assert!(engine.evaluate(&p, "resource:Read", "resource/1", &with_mfa).await.is_allowed());
}

#[tokio::test]
async fn group_roles_and_policies_grant() {
	let store = InMemoryGrantStore::new();
	let p = user();
	let g = group(p.org_id);
	let via_role = policy(p.org_id, &document("Allow", &["resource:Read"], &["*"]));
	let r = role(p.org_id, &[via_role.id]);
	let direct = policy(p.org_id, &document("Allow", &["group:Read"], &["*"]));
	store.insert_group(g.clone());
	store.insert_policy(via_role);
	store.insert_policy(direct.clone());
	store.insert_role(r.clone());
	store.attach_group_role(g.id, r.id);
	store.attach_group_policy(g.id, direct.id);
	let m = membership(g.id, p, None);
	store.insert_membership(m.clone());
	let engine = AccessEngine::new(store);
	let ctx = RequestContext::new();

	let read = engine.evaluate(&p, "resource:Read", "resource/1", &ctx).await;
	assert_eq!(
		read.matched[0].origin,
		GrantOrigin::GroupRole {
			membership_id: m.id,
			group_id: g.id,
			role_id: r.id,
		}
	);
	let group_read = engine.evaluate(&p, "group:Read", "group/1", &ctx).await;
	assert_eq!(
		group_read.matched[0].origin,
		GrantOrigin::GroupPolicy {
			membership_id: m.id,
			group_id: g.id,
		}
	);

	// Another member type with the same id gets nothing.
	let sa = Principal::service_account(p.id, p.org_id);
	assert!(!engine.evaluate(&sa, "resource:Read", "resource/1", &ctx).await.is_allowed());
}

#[tokio::test]
async fn resource_permissions_and_shares() {
	let store = InMemoryGrantStore::new();
	let p = user();
	let one = ResourceName::new(DEFAULT_NAMESPACE, p.org_id, "resource", "1");
	let two = ResourceName::new(DEFAULT_NAMESPACE, p.org_id, "resource", "2");
	store.insert_permission(permission(&one, p, "resource:Delete", Effect::Allow));
	store.insert_share(share(&two, p, AccessLevel::Write, None));
	store.insert_share(share(
		&one,
		p,
		AccessLevel::Admin,
		Some(Utc::now() - Duration::minutes(1)),
	));
	let engine = AccessEngine::new(store);
	let ctx = RequestContext::new();

	assert!(engine.evaluate(&p, "resource:Delete", "resource/1", &ctx).await.is_allowed());
	assert!(!engine.evaluate(&p, "resource:Read", "resource/1", &ctx).await.is_allowed());
	assert!(!engine.evaluate(&p, "resource:Delete", "resource/2", &ctx).await.is_allowed());
	assert!(engine.evaluate(&p, "resource:Write", "resource/2", &ctx).await.is_allowed());
	assert!(!engine.evaluate(&p, "resource:Share", "resource/2", &ctx).await.is_allowed());
}

#[tokio::test]
async fn bulk_matches_individual_evaluation() {
	let store = InMemoryGrantStore::new();
	let p = user();
	grant_via_role(&store, p, &document("Allow", &["resource:*"], &["resource/1"]), None);
	grant_via_role(&store, p, &document("Deny", &["resource:Write"], &["*"]), None);
	let engine = AccessEngine::new(store);
	let ctx = RequestContext::new();

	let checks: Vec<BulkCheck> = ["resource/1", "resource/2", "nope"]
		.iter()
		.flat_map(|r| {
			["resource:Read", "resource:Write"]
				.iter()
				.map(move |a| BulkCheck::new(*a, *r))
		})
		.collect();
	let bulk = engine.bulk_evaluate(&p, &checks, &ctx).await;
	assert_eq!(bulk.len(), checks.len());
	for (check, decision) in checks.iter().zip(&bulk) {
		let single = engine.evaluate(&p, &check.action, &check.resource, &ctx).await;
		assert_eq!(decision, &single, "{} on {}", check.action, check.resource);
	}
}

const ACTIONS: &[&str] = &["resource:Read", "resource:Write", "policy:Read"];
const ACTION_PATTERNS: &[&str] = &["*", "resource:*", "*:Read", "resource:Read", "policy:Read"];
const RESOURCE_PATTERNS: &[&str] = &["*", "resource/*", "resource/1", "resource/2", "policy/*"];

fn grant_strategy() -> impl Strategy<Value = (bool, usize, usize)> {
	(
		any::<bool>(),
		0..ACTION_PATTERNS.len(),
		0..RESOURCE_PATTERNS.len(),
	)
}

proptest! {
	#[test]
	fn deny_overrides_any_grant_set(
		grants in prop::collection::vec(grant_strategy(), 0..8),
		action in 0..ACTIONS.len(),
	) {
		let rt = tokio::runtime::Runtime::new().unwrap();
		let p = Principal::user(PrincipalId::generate(), OrgId::generate());
		let store = InMemoryGrantStore::new();
		for (allow, a, r) in &grants {
			let effect = if *allow { "Allow" } else { "Deny" };
			grant_via_role(
				&store,
				p,
				&document(effect, &[ACTION_PATTERNS[*a]], &[RESOURCE_PATTERNS[*r]]),
				None,
			);
		}
		let engine = AccessEngine::new(store);
		let target = arn(&p, "resource/1");
		let action = ACTIONS[action];

		let applicable: Vec<bool> = grants
			.iter()
			.filter(|(_, a, r)| {
				matches(ACTION_PATTERNS[*a], action)
					&& matches(
						&qualify_resource_pattern(RESOURCE_PATTERNS[*r], DEFAULT_NAMESPACE, p.org_id),
						&target,
					)
			})
			.map(|(allow, _, _)| *allow)
			.collect();
		let expected = if applicable.iter().any(|allow| !allow) {
			DecisionReason::ExplicitDeny
		} else if applicable.iter().any(|allow| *allow) {
			DecisionReason::ExplicitAllow
		} else {
			DecisionReason::DefaultDeny
		};

		let decision = rt.block_on(engine.evaluate(&p, action, &target, &RequestContext::new()));
		prop_assert_eq!(&decision.reason, &expected);
		prop_assert_eq!(decision.is_allowed(), expected == DecisionReason::ExplicitAllow);
		let deciding = applicable.iter().filter(|allow| **allow == decision.is_allowed()).count();
		prop_assert_eq!(decision.matched.len(), deciding);
	}
}
