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

//! Interface to the remote staking ledger.

use std::{fmt::Debug, ops::Range};

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AccountId, EraIndex, Receipt, StakingLedger, Weight};

/// Maximum number of gateway reads a single fan-out keeps in flight.
pub const MAX_CONCURRENT_LOOKUPS: usize = 64;

/// Errors from reading chain state or preparing operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: parity_scale_codec::Error,
    },

    #[error("Runtime metadata does not contain {0}")]
    MissingMetadata(String),

    #[error("Unsupported runtime: {0}")]
    Unsupported(String),
}

impl GatewayError {
    pub(crate) fn decode(what: &'static str, source: parity_scale_codec::Error) -> Self {
        Self::Decode { what, source }
    }
}

/// Errors from signing and submitting a transaction.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Failed to sign transaction: {0}")]
    Signing(String),

    #[error("Transaction rejected by node: {0}")]
    Rejected(String),

    #[error("Failed to prepare transaction: {0}")]
    Gateway(#[from] GatewayError),
}

/// Nominations registered by a delegating account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nominations {
    pub targets: Vec<AccountId>,
}

/// Read and write access to the staking ledger of a chain.
///
/// Reads return [None] for entries that do not exist on chain; that is an expected outcome, not
/// an error. Operations are opaque to callers beyond what is needed to wrap and submit them.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Chain-constructed operation that can be cost-probed and submitted.
    type Operation: Clone + Debug + Send + Sync;
    /// Signing capability used to authorize submissions.
    type Signer: Send + Sync;

    /// The active era, or [None] if the chain is between eras.
    async fn current_era(&self) -> Result<Option<EraIndex>, GatewayError>;

    /// Number of past eras for which rewards can still be claimed, if the chain exposes it.
    async fn history_depth(&self) -> Result<Option<EraIndex>, GatewayError>;

    /// The delegation targets of `address` if it is a nominator.
    async fn delegation_targets(
        &self,
        address: &AccountId,
    ) -> Result<Option<Nominations>, GatewayError>;

    /// All nominators registered on chain.
    async fn nominators(&self) -> Result<Vec<(AccountId, Nominations)>, GatewayError>;

    /// Controller bonded to a stash.
    async fn bonded_controller(&self, stash: &AccountId) -> Result<Option<AccountId>, GatewayError>;

    /// Staking ledger of a controller.
    async fn ledger(&self, controller: &AccountId) -> Result<Option<StakingLedger>, GatewayError>;

    /// Eras in `eras` that `stash` claimed without the claim being recorded in its ledger.
    ///
    /// Runtimes that track claims per era instead of in the ledger report them here. Others
    /// return an empty list.
    async fn claimed_eras(
        &self,
        stash: &AccountId,
        eras: Range<EraIndex>,
    ) -> Result<Vec<EraIndex>, GatewayError>;

    /// Whether `account` had stake exposure or earned reward points in `era`.
    async fn has_exposure_or_points(
        &self,
        account: &AccountId,
        era: EraIndex,
    ) -> Result<bool, GatewayError>;

    /// Build the operation claiming the reward of `account` for `era`. Purely local.
    fn build_claim_operation(&self, account: &AccountId, era: EraIndex) -> Self::Operation;

    /// Wrap operations into a single composite operation. Purely local.
    fn build_composite_operation(&self, operations: Vec<Self::Operation>) -> Self::Operation;

    /// Weight the chain would charge for `operation` if signed by `signer`.
    async fn estimate_cost(
        &self,
        operation: &Self::Operation,
        signer: &Self::Signer,
    ) -> Result<Weight, GatewayError>;

    /// Maximum weight a single transaction may have.
    async fn max_allowed_weight(&self) -> Result<Weight, GatewayError>;

    /// Sign `operation` and submit it, returning once the node has accepted it.
    ///
    /// When `nonce` is [None] the next nonce known to the node is used.
    async fn sign_and_submit(
        &self,
        operation: &Self::Operation,
        signer: &Self::Signer,
        nonce: Option<u32>,
    ) -> Result<Receipt, SubmitError>;
}
