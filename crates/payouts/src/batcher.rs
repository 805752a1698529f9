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

//! Packing of claim operations into weight-bounded batches.
//!
//! The weight the node charges for a composite operation is not a simple function of its size,
//! so batches are formed by probing: each pending chunk is cost-probed and, while it meets the
//! ceiling, its last claim is moved to the tail of the pending queue and the chunk is probed
//! again. Packing is not minimal, but no emitted batch is known to exceed the ceiling.

use std::collections::VecDeque;

use thiserror::Error;

use crate::{
    detail,
    gateway::{GatewayError, LedgerGateway},
    types::{Batch, ClaimOperation, Diagnostics, Weight},
};

/// Nominal number of claims per batch before any weight-driven shrinking.
pub const DEFAULT_MAX_CALLS: usize = 9;

/// Configuration of the [WeightBoundedBatcher].
#[derive(Clone, Copy, Debug)]
pub struct BatchConfig {
    /// Nominal group size. Chunks never grow beyond this.
    pub max_calls: usize,
    pub diagnostics: Diagnostics,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_calls: DEFAULT_MAX_CALLS, diagnostics: Diagnostics::default() }
    }
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Batch size must be at least one call")]
    ZeroBatchSize,

    #[error("Failed to estimate the weight of a batch of {size} calls: {source}")]
    CostProbe {
        size: usize,
        #[source]
        source: GatewayError,
    },
}

/// Result of batching: the batches to submit, in order, and any claims too heavy to submit.
#[derive(Debug)]
pub struct BatchPlan<Op> {
    pub batches: Vec<Batch<Op>>,
    /// Claims whose weight alone meets the ceiling.
    pub dropped: Vec<ClaimOperation<Op>>,
}

impl<Op> BatchPlan<Op> {
    /// Total number of claims across all batches.
    pub fn claim_count(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }
}

/// Returns true if `cost` reaches `ceiling` on any dimension the ceiling bounds.
///
/// Runtimes without proof-size accounting report a zero proof-size limit, which is treated as
/// unbounded.
pub fn meets_ceiling(cost: Weight, ceiling: Weight) -> bool {
    cost.ref_time() >= ceiling.ref_time()
        || (ceiling.proof_size() != 0 && cost.proof_size() >= ceiling.proof_size())
}

/// Groups claim operations into batches whose estimated weight stays under a ceiling.
pub struct WeightBoundedBatcher<'a, G: LedgerGateway> {
    gateway: &'a G,
    signer: &'a G::Signer,
    ceiling: Weight,
    config: BatchConfig,
}

impl<'a, G: LedgerGateway> WeightBoundedBatcher<'a, G> {
    pub fn new(
        gateway: &'a G,
        signer: &'a G::Signer,
        ceiling: Weight,
        config: BatchConfig,
    ) -> Self {
        Self { gateway, signer, ceiling, config }
    }

    /// Pack `claims` into batches.
    ///
    /// Claims start in chunks of `max_calls`, in discovery order. A claim removed from an
    /// overweight chunk joins the tail of the pending queue if the tail chunk has room, and
    /// otherwise starts a new tail chunk, so removed claims are retried after all chunks queued
    /// before them.
    pub async fn batch(
        &self,
        claims: Vec<ClaimOperation<G::Operation>>,
    ) -> Result<BatchPlan<G::Operation>, BatchError> {
        let max_calls = self.config.max_calls;
        if max_calls == 0 {
            return Err(BatchError::ZeroBatchSize);
        }
        let mut pending = initial_chunks(claims, max_calls);
        let mut batches = Vec::new();
        let mut dropped = Vec::new();

        while let Some(mut chunk) = pending.pop_front() {
            let fits = loop {
                let cost = self.probe(&chunk).await?;
                if !meets_ceiling(cost, self.ceiling) {
                    break true;
                }
                if chunk.len() <= 1 {
                    break false;
                }
                if let Some(removed) = chunk.pop() {
                    tracing::debug!(
                        "Batch of {} calls weighs {cost:?}, moving {} to a later batch",
                        chunk.len() + 1,
                        removed.gap
                    );
                    carry(&mut pending, removed, max_calls);
                }
            };

            if !fits {
                for claim in chunk.drain(..) {
                    tracing::warn!(
                        "{} alone meets the maximum extrinsic weight {:?}, skipping it",
                        claim.gap,
                        self.ceiling
                    );
                    dropped.push(claim);
                }
                continue;
            }

            if let Some(batch) = Batch::new(chunk) {
                detail!(
                    self.config.diagnostics,
                    "Formed batch {} with {} calls",
                    batches.len() + 1,
                    batch.len()
                );
                batches.push(batch);
            }
        }

        detail!(
            self.config.diagnostics,
            "Calls per tx {}",
            batches.iter().map(|b| b.len().to_string()).collect::<Vec<_>>().join(",")
        );

        Ok(BatchPlan { batches, dropped })
    }

    async fn probe(&self, chunk: &[ClaimOperation<G::Operation>]) -> Result<Weight, BatchError> {
        let operation = match chunk {
            [single] => single.operation.clone(),
            _ => self
                .gateway
                .build_composite_operation(chunk.iter().map(|c| c.operation.clone()).collect()),
        };
        self.gateway
            .estimate_cost(&operation, self.signer)
            .await
            .map_err(|source| BatchError::CostProbe { size: chunk.len(), source })
    }
}

fn initial_chunks<T>(items: Vec<T>, max_calls: usize) -> VecDeque<Vec<T>> {
    let mut chunks = VecDeque::new();
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        chunks.push_back(items.by_ref().take(max_calls).collect());
    }
    chunks
}

fn carry<T>(pending: &mut VecDeque<Vec<T>>, item: T, max_calls: usize) {
    match pending.back_mut() {
        Some(tail) if tail.len() < max_calls => tail.push(item),
        _ => pending.push_back(vec![item]),
    }
}
