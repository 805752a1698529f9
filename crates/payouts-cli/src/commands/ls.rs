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

use anyhow::Context;
use clap::Args;
use staking_payouts::{EligibilityScanner, EraIndex, RpcGateway, ScanConfig, DEFAULT_ERA_DEPTH};

use crate::config::{GlobalConfig, StashArgs};

/// Command to list pending payouts.
#[non_exhaustive]
#[derive(Args, Clone, Debug)]
pub struct PayoutsLs {
    #[clap(flatten)]
    pub stashes: StashArgs,

    /// Number of eras before the last claimed era to check for unclaimed payouts
    #[clap(short = 'e', long, default_value_t = DEFAULT_ERA_DEPTH)]
    pub era_depth: EraIndex,
}

impl PayoutsLs {
    /// Run the [PayoutsLs] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        let stashes = self.stashes.resolve()?;
        let ws = global_config.require_ws()?;

        let gateway = RpcGateway::connect(&ws)
            .await
            .with_context(|| format!("Failed to connect to {ws}"))?;
        let config =
            ScanConfig { era_depth: self.era_depth, diagnostics: global_config.diagnostics() };
        let gaps = EligibilityScanner::new(&gateway, config)
            .scan(&stashes)
            .await
            .context("Failed to scan for pending payouts")?;

        if gaps.is_empty() {
            tracing::info!("No pending payouts");
        }
        Ok(())
    }
}
