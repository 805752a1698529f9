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

//! Commands of the payouts CLI.

mod collect;
mod lowest_nominators;
mod ls;

pub use collect::PayoutsCollect;
pub use lowest_nominators::PayoutsLowestNominators;
pub use ls::PayoutsLs;

use clap::Subcommand;

use crate::config::GlobalConfig;

/// Commands of the payouts CLI.
#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Claim all pending payouts of the given stashes. Runs when no command is given.
    Collect(PayoutsCollect),
    /// List pending payouts of the given stashes without claiming them.
    Ls(PayoutsLs),
    /// List the nominators that fall outside the rewarded backers of the given validators.
    LowestNominators(PayoutsLowestNominators),
}

impl Command {
    /// Run the command.
    pub async fn run(&self, global_config: &GlobalConfig) -> anyhow::Result<()> {
        match self {
            Self::Collect(cmd) => cmd.run(global_config).await,
            Self::Ls(cmd) => cmd.run(global_config).await,
            Self::LowestNominators(cmd) => cmd.run(global_config).await,
        }
    }
}
