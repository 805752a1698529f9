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

//! Discovery and batched claiming of unclaimed staking payouts.
//!
//! The pipeline runs in four stages: the [EligibilityScanner] finds eras with unclaimed rewards,
//! [build_claim_operations] turns them into chain operations, the [WeightBoundedBatcher] packs
//! those into batches under the per-transaction weight limit, and the [SubmissionDriver] signs
//! and submits the batches in order. All chain access goes through a [LedgerGateway].

pub mod batcher;
pub mod claims;
pub mod gateway;
pub mod nominators;
pub mod rpc;
pub mod scanner;
pub mod seed;
pub mod submit;
pub mod types;

pub use batcher::{BatchConfig, BatchError, BatchPlan, WeightBoundedBatcher, DEFAULT_MAX_CALLS};
pub use claims::build_claim_operations;
pub use gateway::{
    GatewayError, LedgerGateway, Nominations, SubmitError, MAX_CONCURRENT_LOOKUPS,
};
pub use nominators::{lowest_nominators, Backer, LowestNominators, MAX_REWARDED_NOMINATORS};
pub use rpc::{EncodedCall, RpcGateway};
pub use scanner::{EligibilityScanner, ScanConfig};
pub use seed::{derive_signer, validate_secret, SecretError};
pub use submit::{SubmissionDriver, SubmissionPolicy, SubmissionReport, SubmissionResult};
pub use types::{
    AccountId, Amount, Batch, ClaimOperation, Diagnostics, EligibleGap, EraIndex, Receipt,
    ScanWindow, StakingLedger, Weight,
};

/// Default number of eras scanned behind the last claimed era.
pub const DEFAULT_ERA_DEPTH: EraIndex = 0;
