// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use anyhow::{ensure, Context};
use clap::{builder::RangedU64ValueParser, Args};
use sp_core::Pair;
use staking_payouts::{
    build_claim_operations, derive_signer, AccountId, BatchConfig, EligibilityScanner, EraIndex,
    LedgerGateway, RpcGateway, ScanConfig, SubmissionDriver, SubmissionPolicy,
    WeightBoundedBatcher, DEFAULT_ERA_DEPTH, DEFAULT_MAX_CALLS,
};

use crate::config::{read_suri, GlobalConfig, StashArgs};

/// Command to claim all pending payouts.
#[non_exhaustive]
#[derive(Args, Clone, Debug)]
pub struct PayoutsCollect {
    #[clap(flatten)]
    pub stashes: StashArgs,

    /// Path to a file whose first line is the secret URI of the account signing the claims
    #[clap(short = 'u', long)]
    pub suri_file: Option<PathBuf>,

    /// Number of eras before the last claimed era to check for unclaimed payouts
    #[clap(short = 'e', long, default_value_t = DEFAULT_ERA_DEPTH)]
    pub era_depth: EraIndex,

    /// Keep submitting the remaining transactions after one fails
    #[clap(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// Maximum number of claims per transaction
    #[clap(
        long,
        hide = true,
        default_value_t = DEFAULT_MAX_CALLS,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub batch_size: usize,
}

impl PayoutsCollect {
    /// Run the [PayoutsCollect] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        // Validate all local input before touching the network.
        let suri_file = self
            .suri_file
            .as_deref()
            .context("Secret URI file not provided; please set --suri-file")?;
        let signer =
            derive_signer(&read_suri(suri_file)?).context("Invalid secret in secret URI file")?;
        let stashes = self.stashes.resolve()?;
        let ws = global_config.require_ws()?;

        let gateway = RpcGateway::connect(&ws)
            .await
            .with_context(|| format!("Failed to connect to {ws}"))?;
        tracing::debug!("Signer address: {}", AccountId::from(signer.public()));

        let diagnostics = global_config.diagnostics();
        let gaps = EligibilityScanner::new(
            &gateway,
            ScanConfig { era_depth: self.era_depth, diagnostics },
        )
        .scan(&stashes)
        .await
        .context("Failed to scan for pending payouts")?;
        if gaps.is_empty() {
            tracing::info!("No pending payouts");
            return Ok(());
        }

        let ceiling =
            gateway.max_allowed_weight().await.context("Failed to read maximum extrinsic weight")?;
        let plan = WeightBoundedBatcher::new(
            &gateway,
            &signer,
            ceiling,
            BatchConfig { max_calls: self.batch_size, diagnostics },
        )
        .batch(build_claim_operations(&gateway, gaps))
        .await
        .context("Failed to batch payout claims")?;
        if !plan.dropped.is_empty() {
            let dropped = plan.dropped.len();
            tracing::warn!("{dropped} payouts are too heavy to claim and were skipped");
        }

        let policy = if self.continue_on_error {
            SubmissionPolicy::BestEffort
        } else {
            SubmissionPolicy::FailFast
        };
        let report = SubmissionDriver::new(&gateway, &signer, policy, diagnostics)
            .submit(plan.batches)
            .await;

        tracing::info!(
            "Sent {} of {} transactions: {} succeeded, {} failed",
            report.results.len(),
            report.total,
            report.succeeded(),
            report.failed()
        );
        ensure!(
            report.failed() == 0,
            "{} of {} transactions failed",
            report.failed(),
            report.total
        );

        Ok(())
    }
}
