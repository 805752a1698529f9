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

use anyhow::Result;
use clap::Parser;
use staking_payouts_cli::{
    commands::{Command, PayoutsCollect},
    config::GlobalConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct MainArgs {
    #[command(subcommand)]
    command: Option<Command>,

    /// Arguments of `collect`, accepted when no command is given.
    #[clap(flatten)]
    collect: PayoutsCollect,

    #[clap(flatten, next_help_heading = "Global Options")]
    config: GlobalConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = MainArgs::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(args.config.log_level.into())
        .from_env_lossy();
    if args.config.log_json {
        tracing_subscriber::fmt().with_ansi(false).json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let command = args.command.unwrap_or(Command::Collect(args.collect));
    command.run(&args.config).await
}
