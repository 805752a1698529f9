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

//! Test utilities for staking-payouts.
//!
//! [MockLedger] is an in-memory, deterministic [LedgerGateway]. Weights are additive: a claim
//! costs `claim_weight` and a composite costs the sum of its parts plus `batch_overhead`.

use std::{
    collections::{HashMap, HashSet},
    ops::Range,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use staking_payouts::{
    AccountId, Amount, EraIndex, GatewayError, LedgerGateway, Nominations, Receipt,
    StakingLedger, SubmitError, Weight,
};

/// Deterministic account for tests.
pub fn account(seed: u8) -> AccountId {
    AccountId::new([seed; 32])
}

/// Deterministic account for tests that need more than 256 distinct accounts.
pub fn numbered_account(index: u32) -> AccountId {
    let mut raw = [0u8; 32];
    raw[..4].copy_from_slice(&index.to_le_bytes());
    AccountId::new(raw)
}

/// Controller bonded to `stash` by [MockLedger::with_validator].
pub fn controller_of(stash: &AccountId) -> AccountId {
    let mut raw: [u8; 32] = stash.clone().into();
    raw[31] ^= 0xff;
    AccountId::new(raw)
}

/// Operations built by the [MockLedger].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockOperation {
    Claim { account: AccountId, era: EraIndex },
    Batch(Vec<MockOperation>),
}

impl MockOperation {
    /// The (account, era) pairs claimed by this operation, in order.
    pub fn claims(&self) -> Vec<(AccountId, EraIndex)> {
        match self {
            MockOperation::Claim { account, era } => vec![(account.clone(), *era)],
            MockOperation::Batch(operations) => {
                operations.iter().flat_map(MockOperation::claims).collect()
            }
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, MockOperation::Batch(_))
    }
}

/// Signer accepted by the [MockLedger].
#[derive(Clone, Copy, Debug, Default)]
pub struct MockSigner;

/// In-memory staking ledger.
///
/// Configure it with the `with_*` builders, then inspect [MockLedger::probes] and
/// [MockLedger::submissions] after running a pipeline stage against it.
pub struct MockLedger {
    current_era: Option<EraIndex>,
    history_depth: Option<EraIndex>,
    nominations: HashMap<AccountId, Vec<AccountId>>,
    bonded: HashMap<AccountId, AccountId>,
    ledgers: HashMap<AccountId, StakingLedger>,
    paged_claims: HashSet<(AccountId, EraIndex)>,
    eligible: HashSet<(AccountId, EraIndex)>,
    failing_accounts: HashSet<AccountId>,
    failing_eligibility: HashSet<(AccountId, EraIndex)>,
    fail_current_era: bool,
    fail_probes: bool,
    claim_weight: Weight,
    claim_weight_overrides: HashMap<AccountId, Weight>,
    batch_overhead: Weight,
    ceiling: Weight,
    failing_submissions: HashSet<usize>,
    probes: Mutex<Vec<MockOperation>>,
    submissions: Mutex<Vec<MockOperation>>,
    lookups_in_flight: AtomicUsize,
    max_lookups_in_flight: AtomicUsize,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MockLedger {
    pub fn new(current_era: Option<EraIndex>) -> Self {
        Self {
            current_era,
            history_depth: None,
            nominations: HashMap::new(),
            bonded: HashMap::new(),
            ledgers: HashMap::new(),
            paged_claims: HashSet::new(),
            eligible: HashSet::new(),
            failing_accounts: HashSet::new(),
            failing_eligibility: HashSet::new(),
            fail_current_era: false,
            fail_probes: false,
            claim_weight: Weight::from_parts(10, 0),
            claim_weight_overrides: HashMap::new(),
            batch_overhead: Weight::zero(),
            ceiling: Weight::from_parts(1_000_000, 0),
            failing_submissions: HashSet::new(),
            probes: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            lookups_in_flight: AtomicUsize::new(0),
            max_lookups_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_history_depth(mut self, depth: EraIndex) -> Self {
        self.history_depth = Some(depth);
        self
    }

    /// Bond `stash` to its controller with a ledger recording `claimed` eras.
    pub fn with_validator(mut self, stash: &AccountId, claimed: &[EraIndex]) -> Self {
        let controller = controller_of(stash);
        self.bonded.insert(stash.clone(), controller.clone());
        self.ledgers.insert(
            controller,
            StakingLedger { claimed_rewards: claimed.to_vec(), active: Amount::zero() },
        );
        self
    }

    /// Bond `stash` with an unclaimed ledger holding `active` stake.
    pub fn with_stake(mut self, stash: &AccountId, active: u64) -> Self {
        let controller = controller_of(stash);
        self.bonded.insert(stash.clone(), controller.clone());
        self.ledgers.insert(
            controller,
            StakingLedger { claimed_rewards: vec![], active: Amount::from(active) },
        );
        self
    }

    /// Bond `stash` to a controller that has no ledger.
    pub fn with_dangling_controller(mut self, stash: &AccountId) -> Self {
        self.bonded.insert(stash.clone(), controller_of(stash));
        self
    }

    pub fn with_nominator(mut self, nominator: &AccountId, targets: &[AccountId]) -> Self {
        self.nominations.insert(nominator.clone(), targets.to_vec());
        self
    }

    /// Record claims of `stash` for `eras` outside its ledger.
    pub fn with_paged_claims(
        mut self,
        stash: &AccountId,
        eras: impl IntoIterator<Item = EraIndex>,
    ) -> Self {
        self.paged_claims.extend(eras.into_iter().map(|era| (stash.clone(), era)));
        self
    }

    pub fn with_eligible(
        mut self,
        stash: &AccountId,
        eras: impl IntoIterator<Item = EraIndex>,
    ) -> Self {
        self.eligible.extend(eras.into_iter().map(|era| (stash.clone(), era)));
        self
    }

    /// Every read keyed by `account` fails.
    pub fn with_failing_account(mut self, account: &AccountId) -> Self {
        self.failing_accounts.insert(account.clone());
        self
    }

    pub fn with_failing_eligibility(mut self, stash: &AccountId, era: EraIndex) -> Self {
        self.failing_eligibility.insert((stash.clone(), era));
        self
    }

    pub fn with_failing_current_era(mut self) -> Self {
        self.fail_current_era = true;
        self
    }

    pub fn with_failing_probes(mut self) -> Self {
        self.fail_probes = true;
        self
    }

    pub fn with_weights(
        mut self,
        claim_weight: Weight,
        batch_overhead: Weight,
        ceiling: Weight,
    ) -> Self {
        self.claim_weight = claim_weight;
        self.batch_overhead = batch_overhead;
        self.ceiling = ceiling;
        self
    }

    /// Claims for `account` weigh `weight` instead of the default claim weight.
    pub fn with_claim_weight_for(mut self, account: &AccountId, weight: Weight) -> Self {
        self.claim_weight_overrides.insert(account.clone(), weight);
        self
    }

    /// Reject the submission at zero-based position `index`.
    pub fn with_failing_submission(mut self, index: usize) -> Self {
        self.failing_submissions.insert(index);
        self
    }

    /// Operations cost-probed so far, in order.
    pub fn probes(&self) -> Vec<MockOperation> {
        self.probes.lock().unwrap().clone()
    }

    /// Operations submitted so far, including rejected ones, in order.
    pub fn submissions(&self) -> Vec<MockOperation> {
        self.submissions.lock().unwrap().clone()
    }

    /// Largest number of account lookups that were in flight at the same time.
    pub fn max_concurrent_lookups(&self) -> usize {
        self.max_lookups_in_flight.load(Ordering::SeqCst)
    }

    /// Weight of `operation` under the configured cost model.
    pub fn weight_of(&self, operation: &MockOperation) -> Weight {
        match operation {
            MockOperation::Claim { account, .. } => {
                self.claim_weight_overrides.get(account).copied().unwrap_or(self.claim_weight)
            }
            MockOperation::Batch(operations) => operations
                .iter()
                .fold(self.batch_overhead, |total, op| total.saturating_add(self.weight_of(op))),
        }
    }

    // Holds the lookup open across a yield so concurrent callers overlap.
    async fn lookup(&self) {
        let in_flight = self.lookups_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_lookups_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.lookups_in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn check(&self, account: &AccountId) -> Result<(), GatewayError> {
        if self.failing_accounts.contains(account) {
            return Err(GatewayError::Rpc(format!("connection reset while reading {account}")));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    type Operation = MockOperation;
    type Signer = MockSigner;

    async fn current_era(&self) -> Result<Option<EraIndex>, GatewayError> {
        if self.fail_current_era {
            return Err(GatewayError::Rpc("connection refused".into()));
        }
        Ok(self.current_era)
    }

    async fn history_depth(&self) -> Result<Option<EraIndex>, GatewayError> {
        Ok(self.history_depth)
    }

    async fn delegation_targets(
        &self,
        address: &AccountId,
    ) -> Result<Option<Nominations>, GatewayError> {
        self.lookup().await;
        self.check(address)?;
        Ok(self.nominations.get(address).map(|targets| Nominations { targets: targets.clone() }))
    }

    async fn nominators(&self) -> Result<Vec<(AccountId, Nominations)>, GatewayError> {
        let mut nominators: Vec<_> = self
            .nominations
            .iter()
            .map(|(nominator, targets)| {
                (nominator.clone(), Nominations { targets: targets.clone() })
            })
            .collect();
        nominators.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(nominators)
    }

    async fn bonded_controller(
        &self,
        stash: &AccountId,
    ) -> Result<Option<AccountId>, GatewayError> {
        self.lookup().await;
        self.check(stash)?;
        Ok(self.bonded.get(stash).cloned())
    }

    async fn ledger(&self, controller: &AccountId) -> Result<Option<StakingLedger>, GatewayError> {
        self.lookup().await;
        self.check(controller)?;
        Ok(self.ledgers.get(controller).cloned())
    }

    async fn claimed_eras(
        &self,
        stash: &AccountId,
        eras: Range<EraIndex>,
    ) -> Result<Vec<EraIndex>, GatewayError> {
        self.check(stash)?;
        Ok(eras.filter(|era| self.paged_claims.contains(&(stash.clone(), *era))).collect())
    }

    async fn has_exposure_or_points(
        &self,
        account: &AccountId,
        era: EraIndex,
    ) -> Result<bool, GatewayError> {
        let key = (account.clone(), era);
        if self.failing_eligibility.contains(&key) {
            return Err(GatewayError::Rpc(format!("timeout reading era {era}")));
        }
        Ok(self.eligible.contains(&key))
    }

    fn build_claim_operation(&self, account: &AccountId, era: EraIndex) -> MockOperation {
        MockOperation::Claim { account: account.clone(), era }
    }

    fn build_composite_operation(&self, operations: Vec<MockOperation>) -> MockOperation {
        MockOperation::Batch(operations)
    }

    async fn estimate_cost(
        &self,
        operation: &MockOperation,
        _signer: &MockSigner,
    ) -> Result<Weight, GatewayError> {
        if self.fail_probes {
            return Err(GatewayError::Rpc("payment info unavailable".into()));
        }
        self.probes.lock().unwrap().push(operation.clone());
        Ok(self.weight_of(operation))
    }

    async fn max_allowed_weight(&self) -> Result<Weight, GatewayError> {
        Ok(self.ceiling)
    }

    async fn sign_and_submit(
        &self,
        operation: &MockOperation,
        _signer: &MockSigner,
        _nonce: Option<u32>,
    ) -> Result<Receipt, SubmitError> {
        let mut submissions = self.submissions.lock().unwrap();
        let index = submissions.len();
        submissions.push(operation.clone());
        if self.failing_submissions.contains(&index) {
            return Err(SubmitError::Rejected(format!("invalid transaction {index}")));
        }
        Ok(Receipt::from_low_u64_be(index as u64 + 1))
    }
}
