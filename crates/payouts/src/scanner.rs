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

//! Discovery of unclaimed, eligible eras for a set of tracked addresses.
//!
//! For every stash the scan is anchored on the most recent claimed era. Two windows are then
//! checked: a backward window of `era_depth` eras before it, which catches eras left unclaimed
//! behind a more recent claim, and a forward window from the last claim up to the active era.
//! The active era itself is never finalized and is always excluded.

use std::{collections::HashSet, ops::Range};

use futures_util::{stream, StreamExt};

use crate::{
    detail,
    gateway::{GatewayError, LedgerGateway, MAX_CONCURRENT_LOOKUPS},
    types::{AccountId, Diagnostics, EligibleGap, EraIndex, ScanWindow, StakingLedger},
};

/// Configuration of the [EligibilityScanner].
#[derive(Clone, Copy, Debug, Default)]
pub struct ScanConfig {
    /// Number of eras before the last claimed era to check for gaps.
    pub era_depth: EraIndex,
    pub diagnostics: Diagnostics,
}

/// Backward and forward scan windows for a stash whose most recent claim is `last_era`.
///
/// When `history_depth` is known, eras the chain no longer pays out are cut from the backward
/// window.
pub fn scan_windows(
    last_era: EraIndex,
    era_depth: EraIndex,
    current_era: EraIndex,
    history_depth: Option<EraIndex>,
) -> (Range<EraIndex>, Range<EraIndex>) {
    let mut backward_start = last_era.saturating_sub(era_depth);
    if let Some(history_depth) = history_depth {
        backward_start = backward_start.max(current_era.saturating_sub(history_depth));
    }
    let backward = backward_start..last_era.max(backward_start);
    let forward = last_era.saturating_add(1)..current_era;
    (backward, forward)
}

/// Finds [EligibleGap]s for tracked addresses using reads from a [LedgerGateway].
pub struct EligibilityScanner<'a, G> {
    gateway: &'a G,
    config: ScanConfig,
}

impl<'a, G: LedgerGateway> EligibilityScanner<'a, G> {
    pub fn new(gateway: &'a G, config: ScanConfig) -> Self {
        Self { gateway, config }
    }

    /// Scan `tracked` addresses and return the eligible gaps in discovery order.
    ///
    /// Gaps are ordered by tracked address, then backward window before forward window, then by
    /// ascending era. Accounts that cannot be resolved are skipped with a warning. Only a failure
    /// to read the active era is returned as an error.
    pub async fn scan(&self, tracked: &[AccountId]) -> Result<Vec<EligibleGap>, GatewayError> {
        let Some(current_era) = self.gateway.current_era().await? else {
            tracing::warn!("Active era is None, pending payouts could not be fetched");
            return Ok(vec![]);
        };
        tracing::debug!(current_era, "Queried active era");

        let history_depth = match self.gateway.history_depth().await {
            Ok(depth) => depth,
            Err(e) => {
                tracing::warn!("Failed to read history depth, not clamping scan windows: {e}");
                None
            }
        };

        // Eras the chain still pays out, where claims may be recorded outside the ledger.
        let payable = current_era.saturating_sub(history_depth.unwrap_or(0))..current_era;

        let stashes = self.resolve_stashes(tracked).await;

        let mut gaps = Vec::new();
        for stash in &stashes {
            let Some(mut ledger) = self.stash_ledger(stash).await else {
                continue;
            };
            match self.gateway.claimed_eras(stash, payable.clone()).await {
                Ok(eras) => ledger.add_claimed(eras),
                Err(e) => {
                    tracing::warn!("Failed to query claimed eras of {stash}, skipping: {e}");
                    continue;
                }
            }
            detail!(
                self.config.diagnostics,
                "{} claimed rewards for eras: {:?}",
                stash,
                ledger.claimed_rewards
            );
            let Some(last_era) = ledger.last_claimed_era() else {
                tracing::debug!("{stash} has no claimed rewards to anchor the scan, skipping");
                continue;
            };

            let (backward, forward) =
                scan_windows(last_era, self.config.era_depth, current_era, history_depth);
            for (window, eras) in [(ScanWindow::Backward, backward), (ScanWindow::Forward, forward)]
            {
                for era in eras {
                    if ledger.is_claimed(era) {
                        continue;
                    }
                    if self.is_eligible(stash, era).await {
                        detail!(self.config.diagnostics, "Found unclaimed era {era} for {stash}");
                        gaps.push(EligibleGap { account: stash.clone(), era, window });
                    }
                }
            }
        }

        if !gaps.is_empty() {
            tracing::info!(
                "The following unclaimed payouts were found:\n{}",
                gaps.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
            );
            tracing::info!("Total of {} unclaimed payouts", gaps.len());
        }

        Ok(gaps)
    }

    /// Expand tracked addresses into reward-earning stashes.
    ///
    /// Up to [MAX_CONCURRENT_LOOKUPS] lookups run at once, but the result follows the order of
    /// `tracked`. A stash reachable from several tracked addresses is kept once, at its first
    /// position.
    async fn resolve_stashes(&self, tracked: &[AccountId]) -> Vec<AccountId> {
        let resolved: Vec<_> = stream::iter(tracked)
            .map(|address| self.resolve(address))
            .buffered(MAX_CONCURRENT_LOOKUPS)
            .collect()
            .await;

        let mut seen = HashSet::new();
        resolved.into_iter().flatten().filter(|stash| seen.insert(stash.clone())).collect()
    }

    async fn resolve(&self, address: &AccountId) -> Vec<AccountId> {
        match self.gateway.delegation_targets(address).await {
            Ok(Some(nominations)) => {
                let targets: Vec<_> = nominations.targets.iter().map(ToString::to_string).collect();
                detail!(
                    self.config.diagnostics,
                    "Nominator address detected: {}. Adding its targets: {}",
                    address,
                    targets.join(", ")
                );
                nominations.targets
            }
            Ok(None) => {
                detail!(self.config.diagnostics, "Validator address detected: {address}");
                vec![address.clone()]
            }
            Err(e) => {
                tracing::warn!("Failed to query nominations of {address}, skipping: {e}");
                vec![]
            }
        }
    }

    async fn stash_ledger(&self, stash: &AccountId) -> Option<StakingLedger> {
        let controller = match self.gateway.bonded_controller(stash).await {
            Ok(Some(controller)) => controller,
            Ok(None) => {
                tracing::warn!("{stash} is not a valid stash address");
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to query bonded controller of {stash}, skipping: {e}");
                return None;
            }
        };

        match self.gateway.ledger(&controller).await {
            Ok(Some(ledger)) => Some(ledger),
            Ok(None) => {
                tracing::warn!("Staking ledger for {stash} was not found");
                None
            }
            Err(e) => {
                tracing::warn!("Failed to query staking ledger of {stash}, skipping: {e}");
                None
            }
        }
    }

    // Lookup failures count as not eligible so the scan keeps going.
    async fn is_eligible(&self, stash: &AccountId, era: EraIndex) -> bool {
        match self.gateway.has_exposure_or_points(stash, era).await {
            Ok(eligible) => eligible,
            Err(e) => {
                tracing::debug!("Exposure lookup for {stash} in era {era} failed: {e}");
                false
            }
        }
    }
}
