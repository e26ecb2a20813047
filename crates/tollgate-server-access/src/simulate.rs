// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decision simulation.
//!
//! A simulation runs the same procedure as [`AccessEngine::evaluate`] and
//! additionally records every statement it considered, in aggregation order,
//! with its match and condition outcome. It only reads the grant store.

use chrono::Utc;
use tracing::instrument;

use tollgate_access_core::{EvaluationPath, Principal, RequestContext, SimulationTrace};

use crate::engine::AccessEngine;
use crate::store::GrantStore;

impl<S: GrantStore> AccessEngine<S> {
	/// Evaluates a request and returns the full trace.
	#[instrument(
		level = "debug",
		skip(self, principal, context),
		fields(principal_id = %principal.id, org_id = %principal.org_id)
	)]
	pub async fn simulate(
		&self,
		principal: &Principal,
		action: &str,
		resource: &str,
		context: &RequestContext,
	) -> SimulationTrace {
		let evaluated_at = context.request_time.unwrap_or_else(Utc::now);
		let context = context.clone().at(evaluated_at);

		let mut entries = Vec::new();
		let (decision, path) = match self.target(principal, resource) {
			Ok(target) => {
				self.resolve(principal, action, &target, &context, Some(&mut entries))
					.await
			}
			Err(denied) => (denied, EvaluationPath::Grants),
		};

		tracing::debug!(
			effect = %decision.effect,
			considered = entries.len(),
			"simulation complete"
		);

		SimulationTrace {
			decision,
			path,
			entries,
			evaluated_at,
		}
	}
}
