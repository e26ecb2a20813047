// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeSet;

use tollgate_server_access::testing::{document, grant_via_role};
use tollgate_server_access::{
	AccessEngine, CollaboratorRole, ContentCollaborator, DecisionReason, EnumerationScope,
	EvaluationPath, InMemoryGrantStore, Principal, PrincipalId, RequestContext, ResourceName,
	DEFAULT_NAMESPACE,
};

use super::support::user;

struct Fixture {
	engine: AccessEngine<InMemoryGrantStore>,
	owner: Principal,
	co_author: Principal,
	outsider: Principal,
}

fn fixture() -> Fixture {
	let store = InMemoryGrantStore::new();
	let owner = user();
	let org = owner.org_id;
	let co_author = Principal::user(PrincipalId::generate(), org);
	let outsider = Principal::user(PrincipalId::generate(), org);
	let doc = ResourceName::new(DEFAULT_NAMESPACE, org, "content", "doc-1");

	// The owner has no collaborator row yet; only the item's owner_id.
	store.set_content_owner(doc.clone(), owner.id);
	store.insert_collaborator(ContentCollaborator {
		content: doc,
		user_id: co_author.id,
		role: CollaboratorRole::CoAuthor,
	});
	grant_via_role(
		&store,
		outsider,
		&document("Allow", &["content:Read"], &["content/*"]),
		None,
	);

	Fixture {
		engine: AccessEngine::new(store),
		owner,
		co_author,
		outsider,
	}
}

#[tokio::test]
async fn owner_may_do_any_content_action() {
	let f = fixture();
	let ctx = RequestContext::new();
	for action in ["content:Read", "content:Delete", "content:ManageCollaborators"] {
		let decision = f.engine.evaluate(&f.owner, action, "content/doc-1", &ctx).await;
		assert_eq!(decision.reason, DecisionReason::ContentOwner, "{action}");
	}
	assert!(f.engine.is_content_owner(&f.owner, "content/doc-1").await);
	assert!(f.engine.is_content_collaborator(&f.owner, "content/doc-1").await);
}

#[tokio::test]
async fn overlay_only_covers_the_content_service() {
	let f = fixture();
	let ctx = RequestContext::new();
	for (who, action) in [(&f.owner, "policy:Attach"), (&f.co_author, "resource:Read")] {
		let decision = f.engine.evaluate(who, action, "content/doc-1", &ctx).await;
		assert_eq!(decision.reason, DecisionReason::ContentActionOutOfScope, "{action}");
	}

	let effective = f
		.engine
		.effective_permissions(
			&f.owner,
			&EnumerationScope::resource("content/doc-1"),
			&ctx,
		)
		.await;
	assert!(effective.actions.iter().all(|a| a.starts_with("content:")));
	assert!(effective.allows("content:Archive"));
	assert!(!effective.allows("policy:Attach"));
}

#[tokio::test]
async fn co_author_is_restricted() {
	let f = fixture();
	let ctx = RequestContext::new();
	let update = f
		.engine
		.evaluate(&f.co_author, "content:Update", "content/doc-1", &ctx)
		.await;
	assert_eq!(update.reason, DecisionReason::ContentCoAuthor);

	let delete = f
		.engine
		.evaluate(&f.co_author, "content:Delete", "content/doc-1", &ctx)
		.await;
	assert_eq!(delete.reason, DecisionReason::ContentCoAuthorRestricted);

	assert!(!f.engine.is_content_owner(&f.co_author, "content/doc-1").await);
	assert!(f.engine.is_content_collaborator(&f.co_author, "content/doc-1").await);
}

#[tokio::test]
async fn non_collaborators_fall_through_to_grants() {
	let f = fixture();
	let ctx = RequestContext::new();
	let read = f
		.engine
		.evaluate(&f.outsider, "content:Read", "content/doc-1", &ctx)
		.await;
	assert_eq!(read.reason, DecisionReason::ExplicitAllow);
	let update = f
		.engine
		.evaluate(&f.outsider, "content:Update", "content/doc-1", &ctx)
		.await;
	assert_eq!(update.reason, DecisionReason::DefaultDeny);
	assert!(!f.engine.is_content_collaborator(&f.outsider, "content/doc-1").await);
}

#[tokio::test]
async fn service_accounts_never_collaborate() {
	let f = fixture();
	let sa = Principal::service_account(f.owner.id, f.owner.org_id);
	let decision = f
		.engine
		.evaluate(&sa, "content:Delete", "content/doc-1", &RequestContext::new())
		.await;
	assert_eq!(decision.reason, DecisionReason::DefaultDeny);
}

#[tokio::test]
async fn co_author_enumeration_matches_overlay() {
	let f = fixture();
	let effective = f
		.engine
		.effective_permissions(
			&f.co_author,
			&EnumerationScope::resource("content/doc-1").with_service("content"),
			&RequestContext::new(),
		)
		.await;
	assert_eq!(
		effective.path,
		EvaluationPath::ContentOverlay {
			role: CollaboratorRole::CoAuthor
		}
	);
	assert_eq!(
		effective.actions,
		BTreeSet::from([
			"content:Comment".to_string(),
			"content:List".to_string(),
			"content:Read".to_string(),
			"content:Update".to_string(),
		])
	);
	assert!(effective.allows("content:Write"));
	assert!(!effective.allows("content:Delete"));
}
