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
use staking_payouts::{lowest_nominators, RpcGateway};

use crate::config::{GlobalConfig, StashArgs};

/// Command to list the lowest-staked nominators of validators.
#[non_exhaustive]
#[derive(Args, Clone, Debug)]
pub struct PayoutsLowestNominators {
    #[clap(flatten)]
    pub stashes: StashArgs,

    /// Portion of the rewarded backer slots to retain, between 0 and 1
    #[clap(long, default_value_t = 1.0, value_parser = parse_portion)]
    pub portion: f64,
}

fn parse_portion(arg: &str) -> Result<f64, String> {
    let portion: f64 = arg.parse().map_err(|e| format!("{e}"))?;
    if !(0.0..=1.0).contains(&portion) {
        return Err(format!("portion must be between 0 and 1, got {portion}"));
    }
    Ok(portion)
}

impl PayoutsLowestNominators {
    /// Run the [PayoutsLowestNominators] command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        let validators = self.stashes.resolve()?;
        let ws = global_config.require_ws()?;

        let gateway = RpcGateway::connect(&ws)
            .await
            .with_context(|| format!("Failed to connect to {ws}"))?;
        let report = lowest_nominators(&gateway, &validators, self.portion)
            .await
            .context("Failed to list nominators")?;

        for entry in report {
            tracing::info!(
                "{}: {} backers, {} beyond the retained maximum",
                entry.validator,
                entry.total_backers,
                entry.excess.len()
            );
            for backer in entry.excess {
                tracing::info!("  {} {}", backer.nominator, backer.active);
            }
        }
        Ok(())
    }
}
