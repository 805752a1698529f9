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

//! Shared data model for payout discovery and submission.

use std::fmt;

pub use sp_core::{crypto::AccountId32 as AccountId, H256, U256};
pub use sp_weights::Weight;

/// Index of a reward period on the staking ledger.
pub type EraIndex = u32;

/// Stake amounts. Balances on the ledger are at most 128 bits, but amounts are summed and
/// scaled when reporting, so a wider integer is used.
pub type Amount = U256;

/// Hash of a submitted transaction, as acknowledged by the node.
pub type Receipt = H256;

/// Subset of the on-chain staking ledger the scanner depends on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StakingLedger {
    /// Eras for which the stash has already been paid out. Ordered, but not necessarily
    /// contiguous.
    pub claimed_rewards: Vec<EraIndex>,
    /// Stake currently bonded and active.
    pub active: Amount,
}

impl StakingLedger {
    /// Most recent era that has been claimed, if any.
    pub fn last_claimed_era(&self) -> Option<EraIndex> {
        self.claimed_rewards.iter().copied().max()
    }

    pub fn is_claimed(&self, era: EraIndex) -> bool {
        self.claimed_rewards.contains(&era)
    }

    /// Record `eras` as claimed, keeping the list ordered and free of duplicates.
    pub fn add_claimed(&mut self, eras: impl IntoIterator<Item = EraIndex>) {
        self.claimed_rewards.extend(eras);
        self.claimed_rewards.sort_unstable();
        self.claimed_rewards.dedup();
    }
}

/// Scan window an [EligibleGap] was found in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScanWindow {
    /// Eras before the last claimed era.
    Backward,
    /// Eras after the last claimed era, up to but excluding the active era.
    Forward,
}

/// An era in which `account` earned rewards that have not been claimed yet.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EligibleGap {
    pub account: AccountId,
    pub era: EraIndex,
    pub window: ScanWindow,
}

impl fmt::Display for EligibleGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Staking.payout_stakers({}, {})", self.account, self.era)
    }
}

/// Claim for a single [EligibleGap], paired with the chain-constructed operation that performs it.
#[derive(Clone, Debug)]
pub struct ClaimOperation<Op> {
    pub gap: EligibleGap,
    pub operation: Op,
}

/// Ordered, non-empty group of claims submitted together in one transaction.
#[derive(Clone, Debug)]
pub struct Batch<Op> {
    claims: Vec<ClaimOperation<Op>>,
}

impl<Op> Batch<Op> {
    /// Returns [None] when `claims` is empty.
    pub fn new(claims: Vec<ClaimOperation<Op>>) -> Option<Self> {
        if claims.is_empty() {
            None
        } else {
            Some(Self { claims })
        }
    }

    pub fn claims(&self) -> &[ClaimOperation<Op>] {
        &self.claims
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// A batch of one is submitted as the bare operation, without a composite wrapper.
    pub fn is_singleton(&self) -> bool {
        self.claims.len() == 1
    }

    pub fn gaps(&self) -> impl Iterator<Item = &EligibleGap> {
        self.claims.iter().map(|claim| &claim.gap)
    }
}

/// Verbosity settings handed to each pipeline stage.
///
/// When `verbose` is set, per-era and per-batch details are logged at `info` instead of `debug`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Diagnostics {
    pub verbose: bool,
}

/// Emits at `info` when the given [Diagnostics] is verbose, otherwise at `debug`.
#[macro_export]
macro_rules! detail {
    ($diagnostics:expr, $($arg:tt)+) => {
        if $diagnostics.verbose {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}
