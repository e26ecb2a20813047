// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Command-line arguments.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use tollgate_access_core::{OrgId, Principal, PrincipalId, PrincipalType, RequestContext};
use tollgate_server_access::{BulkCheck, EnumerationScope};

/// Tollgate - resolve access decisions against a grant store.
#[derive(Parser, Debug)]
#[command(name = "tollgate", about = "Tollgate access resolution", version)]
pub struct Cli {
	/// Config file (defaults to /etc/tollgate/server.toml)
	#[arg(long, global = true, env = "TOLLGATE_CONFIG")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Decide one request; exits 1 on Deny
	Check(RequestArgs),
	/// Decide one request and print the full evaluation trace
	Simulate(RequestArgs),
	/// Decide many (action, resource) pairs; exits 1 if any is denied
	Bulk(BulkArgs),
	/// List the actions a principal may perform on a resource
	Effective(EffectiveArgs),
	/// Check that a policy document can be attached
	ValidatePolicy(ValidatePolicyArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PrincipalArgs {
	/// Principal id
	#[arg(long)]
	pub principal: PrincipalId,

	/// Principal type (user or service_account)
	#[arg(long, default_value = "user")]
	pub principal_type: PrincipalType,

	/// Organization the principal acts in
	#[arg(long)]
	pub org: OrgId,

	/// Request context value, repeatable
	#[arg(long = "context", value_name = "KEY=VALUE", value_parser = parse_key_value)]
	pub context: Vec<(String, String)>,

	/// Evaluate as of this RFC 3339 instant instead of now
	#[arg(long)]
	pub at: Option<DateTime<Utc>>,
}

impl PrincipalArgs {
	pub fn principal(&self) -> Principal {
		Principal::new(self.principal, self.principal_type, self.org)
	}

	pub fn context(&self) -> RequestContext {
		let context = self
			.context
			.iter()
			.fold(RequestContext::new(), |ctx, (k, v)| ctx.with(k, v));
		match self.at {
			Some(at) => context.at(at),
			None => context,
		}
	}
}

#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
	#[command(flatten)]
	pub principal: PrincipalArgs,

	/// Action, e.g. resource:Read
	#[arg(long)]
	pub action: String,

	/// Resource ARN or <type>/<id>
	#[arg(long)]
	pub resource: String,
}

#[derive(Args, Debug, Clone)]
pub struct BulkArgs {
	#[command(flatten)]
	pub principal: PrincipalArgs,

	/// An ACTION=RESOURCE pair, repeatable
	#[arg(long = "pair", value_name = "ACTION=RESOURCE", value_parser = parse_key_value)]
	pub pairs: Vec<(String, String)>,
}

impl BulkArgs {
	pub fn checks(&self) -> Vec<BulkCheck> {
		self.pairs
			.iter()
			.map(|(action, resource)| BulkCheck::new(action, resource))
			.collect()
	}
}

#[derive(Args, Debug, Clone)]
pub struct EffectiveArgs {
	#[command(flatten)]
	pub principal: PrincipalArgs,

	/// Resource ARN or <type>/<id>
	#[arg(long)]
	pub resource: String,

	/// Only list actions of this service
	#[arg(long)]
	pub service: Option<String>,
}

impl EffectiveArgs {
	pub fn scope(&self) -> EnumerationScope {
		let scope = EnumerationScope::resource(&self.resource);
		match &self.service {
			Some(service) => scope.with_service(service),
			None => scope,
		}
	}
}

#[derive(Args, Debug, Clone)]
pub struct ValidatePolicyArgs {
	/// Path to a JSON policy document
	pub file: PathBuf,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
	let (key, value) = raw
		.split_once('=')
		.ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
	if key.is_empty() {
		return Err(format!("empty key in '{raw}'"));
	}
	Ok((key.to_string(), value.to_string()))
}
