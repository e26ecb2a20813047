// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subcommand handlers. Each prints JSON to stdout and reports whether the
//! outcome was an Allow (or a success).

use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use tollgate_access_core::{AccessError, PolicyDocument};
use tollgate_server_access::{AccessEngine, GrantStore};

use crate::args::{BulkArgs, EffectiveArgs, RequestArgs};

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

#[instrument(skip_all, fields(action = %args.action, resource = %args.resource))]
pub async fn check<S: GrantStore>(
	engine: &AccessEngine<S>,
	args: &RequestArgs,
) -> anyhow::Result<bool> {
	let decision = engine
		.evaluate(
			&args.principal.principal(),
			&args.action,
			&args.resource,
			&args.principal.context(),
		)
		.await;
	print_json(&decision)?;
	Ok(decision.is_allowed())
}

#[instrument(skip_all, fields(action = %args.action, resource = %args.resource))]
pub async fn simulate<S: GrantStore>(
	engine: &AccessEngine<S>,
	args: &RequestArgs,
) -> anyhow::Result<bool> {
	let trace = engine
		.simulate(
			&args.principal.principal(),
			&args.action,
			&args.resource,
			&args.principal.context(),
		)
		.await;
	print_json(&trace)?;
	Ok(trace.decision.is_allowed())
}

#[instrument(skip_all, fields(pairs = args.pairs.len()))]
pub async fn bulk<S: GrantStore>(engine: &AccessEngine<S>, args: &BulkArgs) -> anyhow::Result<bool> {
	let checks = args.checks();
	let decisions = engine
		.bulk_evaluate(
			&args.principal.principal(),
			&checks,
			&args.principal.context(),
		)
		.await;

	let results: Vec<_> = checks
		.iter()
		.zip(&decisions)
		.map(|(check, decision)| {
			json!({
				"action": check.action,
				"resource": check.resource,
				"decision": decision,
			})
		})
		.collect();
	print_json(&results)?;
	Ok(decisions.iter().all(|d| d.is_allowed()))
}

#[instrument(skip_all, fields(resource = %args.resource))]
pub async fn effective<S: GrantStore>(
	engine: &AccessEngine<S>,
	args: &EffectiveArgs,
) -> anyhow::Result<bool> {
	let effective = engine
		.effective_permissions(
			&args.principal.principal(),
			&args.scope(),
			&args.principal.context(),
		)
		.await;
	print_json(&effective)?;
	Ok(effective.reason.is_none())
}

/// Parses a policy document the way attaching it would.
pub fn validate_policy(file: &Path) -> anyhow::Result<bool> {
	let raw = std::fs::read_to_string(file)
		.with_context(|| format!("failed to read {}", file.display()))?;
	match validate_document(&raw) {
		Ok(document) => {
			print_json(&json!({ "valid": true, "document": document }))?;
			Ok(true)
		}
		Err(e) => {
			print_json(&json!({ "valid": false, "error": e.to_string() }))?;
			Ok(false)
		}
	}
}

fn validate_document(raw: &str) -> Result<PolicyDocument, AccessError> {
	PolicyDocument::parse(raw)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn valid_document_passes() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"{{"Version": "1", "Statement": [{{"Effect": "Allow", "Action": "resource:Read", "Resource": "resource/*"}}]}}"#
		)
		.unwrap();
		assert!(validate_policy(file.path()).unwrap());
	}

	#[test]
	fn empty_action_list_fails() {
		let err = validate_document(
			r#"{"Statement": [{"Effect": "Allow", "Action": [], "Resource": "*"}]}"#,
		)
		.unwrap_err();
		assert!(err.is_configuration_error());
	}

	#[test]
	fn missing_file_is_an_error() {
		assert!(validate_policy(Path::new("/nonexistent/policy.json")).is_err());
	}
}
