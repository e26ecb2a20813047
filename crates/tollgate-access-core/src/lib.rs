// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Tollgate access resolution.
//!
//! This crate holds everything the access engine needs that does not touch a
//! grant store:
//!
//! - [`arn`] - resource identifiers (`arn:<namespace>:<service>:<org>:<type>/<id>`)
//! - [`pattern`] - wildcard matching for action and resource patterns
//! - [`action`] - action names and the catalog used for enumeration
//! - [`document`] - versioned JSON policy documents and their statements
//! - [`condition`] - the interpreted condition predicates and request context
//! - [`grant`] - policies, roles, groups and the grant-linking records
//! - [`decision`] - decisions, provenance and simulation traces
//!
//! All functions here are pure. Grant lookups and the decision procedure live
//! in `tollgate-server-access`.

pub mod action;
pub mod arn;
pub mod condition;
pub mod decision;
pub mod document;
pub mod error;
pub mod grant;
pub mod pattern;
pub mod types;

pub use action::{action_service, action_verb, ActionCatalog};
pub use arn::{qualify_resource_pattern, ResourceName, DEFAULT_NAMESPACE};
pub use condition::{
	ConditionBlock, ConditionClause, ConditionOperator, ConditionResult, RequestContext,
};
pub use decision::{
	Decision, DecisionReason, EffectivePermissions, EvaluationPath, GrantOrigin, Provenance,
	SimulationTrace, TraceEntry,
};
pub use document::{Effect, PolicyDocument, Statement};
pub use error::{AccessError, Result};
pub use grant::{
	is_live, AccessLevel, CollaboratorRole, ContentCollaborator, Group, GroupMembership, GroupRole,
	Policy, PolicyStatus, ResourcePermission, ResourceShare, Role, RoleAssignment,
};
pub use pattern::{matches, matches_unsegmented, may_overlap, subsumes, PatternSet};
pub use types::{
	AssignmentId, GroupId, MembershipId, OrgId, PermissionId, PolicyId, Principal, PrincipalId,
	PrincipalRef, PrincipalType, RoleId, ShareId,
};
