// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tollgate command-line access checks.

use std::collections::BTreeSet;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tollgate_access_core::ActionCatalog;
use tollgate_server_access::{
	create_pool, AccessEngine, CachedGrantStore, EngineSettings, GrantStore, SqliteGrantStore,
};
use tollgate_server_config::{EngineConfig, LoggingConfig, ServerConfig};

mod args;
mod commands;

use args::{Cli, Command};

fn init_tracing(logging: &LoggingConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);
	// stdout carries the JSON results.
	if logging.json {
		registry
			.with(
				tracing_subscriber::fmt::layer()
					.json()
					.with_writer(std::io::stderr),
			)
			.init();
	} else {
		registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.init();
	}
}

fn engine_settings(config: &EngineConfig) -> EngineSettings {
	EngineSettings {
		arn_namespace: config.arn_namespace.clone(),
		content_resource_types: config
			.content_resource_types
			.iter()
			.cloned()
			.collect::<BTreeSet<_>>(),
		action_catalog: config
			.action_catalog
			.as_ref()
			.map(|actions| ActionCatalog::new(actions.iter().cloned()))
			.unwrap_or_default(),
	}
}

async fn build_engine(config: &ServerConfig) -> anyhow::Result<AccessEngine<Arc<dyn GrantStore>>> {
	let pool = create_pool(&config.database.url).await?;
	let sqlite = SqliteGrantStore::new(pool);
	let store: Arc<dyn GrantStore> = if config.cache.enabled {
		Arc::new(CachedGrantStore::new(sqlite, config.cache.max_ttl()))
	} else {
		Arc::new(sqlite)
	};
	tracing::debug!(
		database = %config.database.url,
		cache = config.cache.enabled,
		"grant store ready"
	);
	Ok(AccessEngine::with_settings(
		store,
		engine_settings(&config.engine),
	))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let cli = Cli::parse();

	let config = match &cli.config {
		Some(path) => tollgate_server_config::load_config_with_file(path)?,
		None => tollgate_server_config::load_config()?,
	};
	init_tracing(&config.logging);

	let allowed = match &cli.command {
		Command::Check(args) => commands::check(&build_engine(&config).await?, args).await?,
		Command::Simulate(args) => commands::simulate(&build_engine(&config).await?, args).await?,
		Command::Bulk(args) => commands::bulk(&build_engine(&config).await?, args).await?,
		Command::Effective(args) => {
			commands::effective(&build_engine(&config).await?, args).await?
		}
		Command::ValidatePolicy(args) => commands::validate_policy(&args.file)?,
	};

	Ok(if allowed {
		ExitCode::SUCCESS
	} else {
		ExitCode::FAILURE
	})
}
