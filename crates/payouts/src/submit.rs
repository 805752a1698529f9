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

//! Sequential signing and submission of batches.

use crate::{
    detail,
    gateway::{LedgerGateway, SubmitError},
    types::{Batch, Diagnostics, Receipt},
};

/// What to do with the remaining batches after a submission fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubmissionPolicy {
    /// Stop at the first failed submission.
    #[default]
    FailFast,
    /// Attempt every batch, recording each outcome.
    BestEffort,
}

/// Outcome of submitting one batch.
#[derive(Debug)]
pub struct SubmissionResult {
    /// Zero-based position of the batch.
    pub index: usize,
    /// Number of claims in the batch.
    pub calls: usize,
    pub outcome: Result<Receipt, SubmitError>,
}

/// Outcomes of a submission run.
#[derive(Debug, Default)]
pub struct SubmissionReport {
    /// One entry per attempted batch, in submission order.
    pub results: Vec<SubmissionResult>,
    /// Number of batches handed to the driver.
    pub total: usize,
}

impl SubmissionReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_err()).count()
    }

    /// Batches that were never attempted because an earlier one failed.
    pub fn not_attempted(&self) -> usize {
        self.total - self.results.len()
    }
}

/// Signs and submits batches one at a time, in order.
///
/// Submissions are never concurrent: each one draws the next nonce of the signer.
pub struct SubmissionDriver<'a, G: LedgerGateway> {
    gateway: &'a G,
    signer: &'a G::Signer,
    policy: SubmissionPolicy,
    diagnostics: Diagnostics,
}

impl<'a, G: LedgerGateway> SubmissionDriver<'a, G> {
    pub fn new(
        gateway: &'a G,
        signer: &'a G::Signer,
        policy: SubmissionPolicy,
        diagnostics: Diagnostics,
    ) -> Self {
        Self { gateway, signer, policy, diagnostics }
    }

    /// Submit `batches` in order and collect one result per attempted batch.
    ///
    /// A failed submission is not retried. Under [SubmissionPolicy::FailFast] the remaining
    /// batches are left unsubmitted.
    pub async fn submit(&self, batches: Vec<Batch<G::Operation>>) -> SubmissionReport {
        let total = batches.len();
        let mut report = SubmissionReport { results: Vec::with_capacity(total), total };
        tracing::info!("Getting ready to send {total} transactions");

        for (index, batch) in batches.into_iter().enumerate() {
            let calls = batch.len();
            let operation = if batch.is_singleton() {
                tracing::info!("Sending Staking.payout_stakers (tx {}/{total})", index + 1);
                batch.claims()[0].operation.clone()
            } else {
                tracing::info!("Sending Utility.batch (tx {}/{total})", index + 1);
                detail!(self.diagnostics, "Utility.batch has {calls} calls");
                self.gateway.build_composite_operation(
                    batch.claims().iter().map(|claim| claim.operation.clone()).collect(),
                )
            };
            for gap in batch.gaps() {
                detail!(self.diagnostics, "  {gap}");
            }

            let outcome = self.gateway.sign_and_submit(&operation, self.signer, None).await;
            let failed = match &outcome {
                Ok(receipt) => {
                    tracing::info!("Node response to tx {}/{total}: {receipt:?}", index + 1);
                    false
                }
                Err(e) => {
                    tracing::error!("Tx failed to sign and send (tx {}/{total}): {e}", index + 1);
                    true
                }
            };
            report.results.push(SubmissionResult { index, calls, outcome });

            if failed && self.policy == SubmissionPolicy::FailFast {
                if index + 1 < total {
                    tracing::warn!(
                        "Not sending the remaining {} transactions after failure",
                        total - index - 1
                    );
                }
                break;
            }
        }

        report
    }
}
