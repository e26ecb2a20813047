// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeSet;

use proptest::prelude::*;

use tollgate_server_access::testing::{document, grant_via_role};
use tollgate_server_access::{
	AccessEngine, ActionCatalog, EngineSettings, EnumerationScope, EvaluationPath,
	InMemoryGrantStore, OrgId, Principal, PrincipalId, RequestContext,
};

use super::support::user;

#[tokio::test]
async fn custom_catalog_bounds_wildcard_expansion() {
	let store = InMemoryGrantStore::new();
	let p = user();
	grant_via_role(&store, p, &document("Allow", &["*"], &["*"]), None);
	let settings = EngineSettings {
		action_catalog: ActionCatalog::new(["billing:Read", "billing:Export"]),
		..EngineSettings::default()
	};
	let engine = AccessEngine::with_settings(store, settings);

	let effective = engine
		.effective_permissions(
			&p,
			&EnumerationScope::resource("invoice/1"),
			&RequestContext::new(),
		)
		.await;
	assert_eq!(effective.path, EvaluationPath::Grants);
	assert_eq!(
		effective.actions,
		BTreeSet::from(["billing:Export".to_string(), "billing:Read".to_string()])
	);
	assert_eq!(effective.granted_patterns, BTreeSet::from(["*".to_string()]));
}

#[tokio::test]
async fn unmet_condition_grants_nothing() {
	let store = InMemoryGrantStore::new();
	let p = user();
	let doc = serde_json::json!({
		"Statement": [{
			"Effect": "Allow",
			"Action": "resource:*",
			"Resource": "*",
			"Condition": { "StringEquals": { "region": "eu" } }
		}]
	})
	.to_string();
	grant_via_role(&store, p, &doc, None);
	let engine = AccessEngine::new(store);
	let scope = EnumerationScope::resource("resource/1");

	let outside = engine
		.effective_permissions(&p, &scope, &RequestContext::new().with("region", "us"))
		.await;
	assert!(outside.actions.is_empty());
	assert!(outside.granted_patterns.is_empty());

	let inside = engine
		.effective_permissions(&p, &scope, &RequestContext::new().with("region", "eu"))
		.await;
	assert!(inside.contains("resource:Read"));
}

const ACTION_PATTERNS: &[&str] = &[
	"*",
	"resource:*",
	"*:Read",
	"resource:Read",
	"resource:Delete",
	"policy:*",
	"billing:*",
	"billing:Export",
	"billing:Refund",
];
/// Actions no catalog lists, reachable only through wildcards or literals.
const OFF_CATALOG: &[&str] = &[
	"billing:Export",
	"billing:Refund",
	"billing:Archive",
	"resource:Archive",
	"audit:Read",
];
const RESOURCE_PATTERNS: &[&str] = &["*", "resource/*", "resource/1", "resource/2"];

proptest! {
	#[test]
	fn enumeration_agrees_with_evaluation(
		grants in prop::collection::vec(
			(any::<bool>(), 0..ACTION_PATTERNS.len(), 0..RESOURCE_PATTERNS.len()),
			0..6,
		),
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
		let ctx = RequestContext::new();

		let effective = rt.block_on(engine.effective_permissions(
			&p,
			&EnumerationScope::resource("resource/1"),
			&ctx,
		));

		let catalog: BTreeSet<String> = engine
			.settings()
			.action_catalog
			.iter()
			.map(str::to_string)
			.collect();
		for action in catalog.iter().map(String::as_str).chain(OFF_CATALOG.iter().copied()) {
			let allowed = rt.block_on(engine.evaluate(&p, action, "resource/1", &ctx)).is_allowed();
			prop_assert_eq!(effective.allows(action), allowed, "{} disagrees", action);
			if catalog.contains(action) {
				prop_assert_eq!(effective.contains(action), allowed, "{} not enumerated", action);
			}
		}
		for action in &effective.actions {
			prop_assert!(effective.allows(action));
		}
	}
}

#[tokio::test]
async fn off_catalog_wildcard_round_trips() {
	let store = InMemoryGrantStore::new();
	let p = user();
	grant_via_role(&store, p, &document("Allow", &["billing:*"], &["*"]), None);
	let engine = AccessEngine::new(store);
	let ctx = RequestContext::new();

	let effective = engine
		.effective_permissions(&p, &EnumerationScope::resource("resource/1"), &ctx)
		.await;
	let export = engine.evaluate(&p, "billing:Export", "resource/1", &ctx).await;
	assert!(export.is_allowed());
	assert!(effective.allows("billing:Export"));
	assert!(!effective.allows("resource:Read"));
}

#[tokio::test]
async fn service_scope_filters_patterns() {
	let store = InMemoryGrantStore::new();
	let p = user();
	grant_via_role(
		&store,
		p,
		&document("Allow", &["billing:*", "resource:*", "*:Read"], &["*"]),
		None,
	);
	let engine = AccessEngine::new(store);

	let effective = engine
		.effective_permissions(
			&p,
			&EnumerationScope::resource("resource/1").with_service("billing"),
			&RequestContext::new(),
		)
		.await;
	assert_eq!(
		effective.granted_patterns,
		BTreeSet::from(["*:Read".to_string(), "billing:*".to_string()])
	);
	assert!(effective.actions.is_empty());
}
