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

use crate::{
    gateway::LedgerGateway,
    types::{ClaimOperation, EligibleGap},
};

/// Build one claim operation per gap, preserving order.
///
/// Construction is local to the gateway and cannot fail for a well-formed gap.
pub fn build_claim_operations<G: LedgerGateway>(
    gateway: &G,
    gaps: Vec<EligibleGap>,
) -> Vec<ClaimOperation<G::Operation>> {
    gaps.into_iter()
        .map(|gap| {
            let operation = gateway.build_claim_operation(&gap.account, gap.era);
            ClaimOperation { gap, operation }
        })
        .collect()
}
