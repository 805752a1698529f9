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

//! Common configuration options for commands in the payouts CLI.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, ensure, Context, Result};
use clap::Args;
use sp_core::crypto::Ss58Codec;
use staking_payouts::{AccountId, Diagnostics};
use tracing::level_filters::LevelFilter;
use url::Url;

/// Common configuration options for all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalConfig {
    /// Websocket URL of the node to connect to
    #[clap(short, long, env = "PAYOUTS_WS", global = true)]
    pub ws: Option<Url>,

    /// Log level (error, warn, info, debug, trace)
    #[clap(long, env = "LOG_LEVEL", global = true, default_value = "info")]
    pub log_level: LevelFilter,

    /// Emit logs as JSON
    #[clap(long, env = "LOG_JSON", global = true, default_value_t = false)]
    pub log_json: bool,

    /// Log per-era and per-batch details at info level
    #[clap(long, env = "PAYOUTS_VERBOSE", global = true, default_value_t = false)]
    pub verbose: bool,
}

impl GlobalConfig {
    /// Access [Self::ws] or return an error that can be shown to the user.
    pub fn require_ws(&self) -> Result<Url> {
        self.ws.clone().context("Node URL not provided; please set --ws or the PAYOUTS_WS env var")
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics { verbose: self.verbose }
    }
}

/// Addresses to track, given inline or in a file.
#[derive(Args, Debug, Clone, Default)]
pub struct StashArgs {
    /// Comma separated list of validator stash or nominator addresses
    #[clap(short = 's', long, value_delimiter = ',')]
    pub stashes: Vec<String>,

    /// Path to a JSON file holding an array of validator stash or nominator addresses
    #[clap(short = 'S', long)]
    pub stashes_file: Option<PathBuf>,
}

impl StashArgs {
    /// Parse all given addresses, in order: inline addresses first, then the file's.
    pub fn resolve(&self) -> Result<Vec<AccountId>> {
        let mut addresses = self.stashes.clone();
        if let Some(path) = &self.stashes_file {
            addresses.extend(read_stashes_file(path)?);
        }
        ensure!(
            !addresses.is_empty(),
            "No stash addresses provided; please set --stashes or --stashes-file"
        );

        addresses.iter().map(|address| parse_address(address)).collect()
    }
}

fn read_stashes_file(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read stashes file {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| {
        format!("Stashes file {} must contain a JSON array of addresses", path.display())
    })
}

/// Parse an SS58 encoded address.
pub fn parse_address(address: &str) -> Result<AccountId> {
    let address = address.trim();
    AccountId::from_ss58check(address).map_err(|e| anyhow!("Invalid address {address}: {e:?}"))
}

/// Read the secret URI from the first line of `path`.
pub fn read_suri(path: &Path) -> Result<String> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read secret URI file {}", path.display()))?;
    let suri = contents.lines().next().unwrap_or_default().trim();
    ensure!(!suri.is_empty(), "Secret URI file {} is empty", path.display());
    Ok(suri.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

    fn file_with(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn resolves_inline_then_file_addresses() {
        let file = file_with(&format!("[\"{BOB}\"]"));
        let args = StashArgs {
            stashes: vec![ALICE.to_string()],
            stashes_file: Some(file.path().to_path_buf()),
        };
        let accounts = args.resolve().unwrap();
        assert_eq!(accounts, vec![parse_address(ALICE).unwrap(), parse_address(BOB).unwrap()]);
    }

    #[test]
    fn rejects_empty_and_invalid_addresses() {
        let err = StashArgs::default().resolve().unwrap_err();
        assert!(err.to_string().contains("No stash addresses provided"));

        let args = StashArgs { stashes: vec!["not-an-address".into()], stashes_file: None };
        assert!(args.resolve().unwrap_err().to_string().contains("Invalid address"));
    }

    #[test]
    fn rejects_malformed_stashes_file() {
        let file = file_with("{\"stashes\": 1}");
        let args = StashArgs { stashes: vec![], stashes_file: Some(file.path().to_path_buf()) };
        let err = args.resolve().unwrap_err();
        assert!(err.to_string().contains("must contain a JSON array"));
    }

    #[test]
    fn reads_first_line_of_suri_file() {
        let file = file_with("  //Alice  \nignored\n");
        assert_eq!(read_suri(file.path()).unwrap(), "//Alice");

        let empty = file_with("\n");
        assert!(read_suri(empty.path()).is_err());
    }
}
