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

//! Report of the smallest nominators backing a set of validators.

use std::collections::HashMap;

use futures_util::{stream, StreamExt};

use crate::{
    gateway::{GatewayError, LedgerGateway, MAX_CONCURRENT_LOOKUPS},
    types::{AccountId, Amount},
};

/// Number of nominators rewarded per validator.
pub const MAX_REWARDED_NOMINATORS: usize = 256;

/// A nominator and the stake it has actively bonded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backer {
    pub nominator: AccountId,
    pub active: Amount,
}

/// Backers of one validator beyond the retained maximum, smallest last.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LowestNominators {
    pub validator: AccountId,
    pub total_backers: usize,
    pub excess: Vec<Backer>,
}

/// Number of backers retained when keeping `portion` of the rewarded slots.
pub fn max_backers(portion: f64) -> usize {
    (MAX_REWARDED_NOMINATORS as f64 * portion.clamp(0.0, 1.0)).floor() as usize
}

/// For each validator, list the nominators that fall outside the `max_backers(portion)`
/// largest backers by active stake.
///
/// Ledgers are read with at most [MAX_CONCURRENT_LOOKUPS] requests in flight. Nominators whose
/// controller or ledger cannot be read are skipped with a warning.
pub async fn lowest_nominators<G: LedgerGateway>(
    gateway: &G,
    validators: &[AccountId],
    portion: f64,
) -> Result<Vec<LowestNominators>, GatewayError> {
    let max_backers = max_backers(portion);
    tracing::info!("Max backers per validator: {max_backers}");

    let nominators = gateway.nominators().await?;
    tracing::debug!("Found {} nominators on chain", nominators.len());

    let relevant: Vec<_> = nominators
        .into_iter()
        .filter(|(_, nominations)| nominations.targets.iter().any(|t| validators.contains(t)))
        .collect();
    let stakes: Vec<_> = stream::iter(&relevant)
        .map(|(nominator, _)| active_stake(gateway, nominator))
        .buffered(MAX_CONCURRENT_LOOKUPS)
        .collect()
        .await;

    let mut backers_by_validator: HashMap<&AccountId, Vec<Backer>> = HashMap::new();
    for ((nominator, nominations), active) in relevant.iter().zip(stakes) {
        let Some(active) = active else {
            continue;
        };
        for validator in validators.iter().filter(|v| nominations.targets.contains(*v)) {
            backers_by_validator
                .entry(validator)
                .or_default()
                .push(Backer { nominator: nominator.clone(), active });
        }
    }

    let report = validators
        .iter()
        .map(|validator| {
            let mut backers = backers_by_validator.remove(validator).unwrap_or_default();
            backers.sort_by(|a, b| b.active.cmp(&a.active));
            let total_backers = backers.len();
            let excess = backers.split_off(total_backers.min(max_backers));
            LowestNominators { validator: validator.clone(), total_backers, excess }
        })
        .collect();

    Ok(report)
}

async fn active_stake<G: LedgerGateway>(gateway: &G, nominator: &AccountId) -> Option<Amount> {
    let controller = match gateway.bonded_controller(nominator).await {
        Ok(Some(controller)) => controller,
        Ok(None) => {
            tracing::warn!("Could not find controller for {nominator}");
            return None;
        }
        Err(e) => {
            tracing::warn!("Failed to query controller for {nominator}: {e}");
            return None;
        }
    };
    match gateway.ledger(&controller).await {
        Ok(Some(ledger)) => Some(ledger.active),
        Ok(None) => {
            tracing::warn!("Staking ledger for {nominator} was not found");
            None
        }
        Err(e) => {
            tracing::warn!("Failed to query staking ledger for {nominator}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portion_scales_rewarded_slots() {
        assert_eq!(max_backers(1.0), 256);
        assert_eq!(max_backers(0.5), 128);
        assert_eq!(max_backers(0.1), 25);
        assert_eq!(max_backers(0.0), 0);
        assert_eq!(max_backers(3.0), 256);
    }
}
