// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Content collaboration overlay.
//!
//! Content items carry a per-item collaborator list that decides access
//! without consulting policies:
//!
//! - the owner may perform every action of the item's service
//! - a co-author may read, list, comment and update, but not delete the item
//!   or manage its collaborators
//!
//! Actions of other services (`policy:Attach` on a content ARN) are denied
//! for every role.
//!
//! The owner is resolved from the collaborator rows first and then from the
//! content's `owner_id`, which exists before the owner's collaborator row is
//! written.

use tracing::instrument;

use tollgate_access_core::{
	action_service, action_verb, CollaboratorRole, Decision, DecisionReason, Principal,
	PrincipalType, ResourceName,
};

use crate::error::Result;
use crate::store::GrantStore;

/// Verbs a co-author may perform.
pub const CO_AUTHOR_VERBS: &[&str] = &["Read", "List", "Get", "Update", "Write", "Comment"];

/// Resolves the principal's role on a content item.
///
/// Only users collaborate on content; other principal types always resolve to
/// `None` and fall through to grant evaluation.
#[instrument(level = "debug", skip(store, principal), fields(principal_id = %principal.id, content = %content))]
pub async fn resolve_role<S: GrantStore + ?Sized>(
	store: &S,
	content: &ResourceName,
	principal: &Principal,
) -> Result<Option<CollaboratorRole>> {
	if principal.principal_type != PrincipalType::User {
		return Ok(None);
	}

	let role = store
		.get_content_collaborator_role(content, principal.id)
		.await?;
	if role == Some(CollaboratorRole::Owner) {
		return Ok(role);
	}

	if store.get_content_owner(content).await? == Some(principal.id) {
		return Ok(Some(CollaboratorRole::Owner));
	}

	Ok(role)
}

/// Returns true if `action` belongs to the content item's service.
pub fn is_content_action(content: &ResourceName, action: &str) -> bool {
	action_service(action) == Some(content.service())
}

/// Returns true if a co-author may perform `action` on `content`.
pub fn co_author_allows(content: &ResourceName, action: &str) -> bool {
	is_content_action(content, action)
		&& action_verb(action).is_some_and(|verb| CO_AUTHOR_VERBS.contains(&verb))
}

/// Decides a content request from the principal's collaborator role.
pub fn decide_content(role: CollaboratorRole, content: &ResourceName, action: &str) -> Decision {
	if !is_content_action(content, action) {
		return Decision::deny(vec![], DecisionReason::ContentActionOutOfScope);
	}
	match role {
		CollaboratorRole::Owner => Decision::allow(vec![], DecisionReason::ContentOwner),
		CollaboratorRole::CoAuthor if co_author_allows(content, action) => {
			Decision::allow(vec![], DecisionReason::ContentCoAuthor)
		}
		CollaboratorRole::CoAuthor => {
			Decision::deny(vec![], DecisionReason::ContentCoAuthorRestricted)
		}
	}
}
