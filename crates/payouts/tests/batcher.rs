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

use std::collections::HashSet;

use staking_payouts::{
    BatchConfig, BatchError, ClaimOperation, Diagnostics, EligibleGap, EraIndex, LedgerGateway,
    ScanWindow, Weight, WeightBoundedBatcher,
};
use staking_payouts_test_utils::{account, MockLedger, MockOperation, MockSigner};
use tracing_test::traced_test;

fn claims(
    ledger: &MockLedger,
    seed: u8,
    eras: impl IntoIterator<Item = EraIndex>,
) -> Vec<ClaimOperation<MockOperation>> {
    let stash = account(seed);
    eras.into_iter()
        .map(|era| ClaimOperation {
            gap: EligibleGap { account: stash.clone(), era, window: ScanWindow::Forward },
            operation: ledger.build_claim_operation(&stash, era),
        })
        .collect()
}

fn config(max_calls: usize) -> BatchConfig {
    BatchConfig { max_calls, diagnostics: Diagnostics::default() }
}

fn ref_time(value: u64) -> Weight {
    Weight::from_parts(value, 0)
}

#[tokio::test]
async fn shrinks_chunks_and_regroups_carried_claims() {
    let ledger = MockLedger::new(Some(20)).with_weights(ref_time(40), ref_time(0), ref_time(100));
    let ceiling = ledger.max_allowed_weight().await.unwrap();
    let batcher = WeightBoundedBatcher::new(&ledger, &MockSigner, ceiling, config(3));

    let plan = batcher.batch(claims(&ledger, 1, 0..10)).await.unwrap();

    let batches: Vec<Vec<EraIndex>> =
        plan.batches.iter().map(|batch| batch.gaps().map(|gap| gap.era).collect()).collect();
    assert_eq!(batches, vec![vec![0, 1], vec![3, 4], vec![6, 7], vec![9, 2], vec![8, 5]]);
    assert_eq!(plan.claim_count(), 10);
    assert!(plan.dropped.is_empty());
}

#[tokio::test]
async fn every_batch_stays_under_ceiling_and_no_claim_is_lost() {
    let ledger = MockLedger::new(Some(40)).with_weights(ref_time(30), ref_time(5), ref_time(100));
    let input = claims(&ledger, 1, 0..23);
    let batcher = WeightBoundedBatcher::new(&ledger, &MockSigner, ref_time(100), config(9));

    let plan = batcher.batch(input).await.unwrap();

    for batch in &plan.batches {
        let operations = batch.claims().iter().map(|c| c.operation.clone()).collect::<Vec<_>>();
        let composite = ledger.build_composite_operation(operations);
        assert!(ledger.weight_of(&composite).ref_time() < 100);
        assert!(batch.len() <= 9);
    }

    let mut seen = HashSet::new();
    for gap in plan.batches.iter().flat_map(|batch| batch.gaps()) {
        assert!(seen.insert(gap.era), "era {} batched twice", gap.era);
    }
    assert_eq!(seen, (0..23).collect());
}

#[tokio::test]
async fn keeps_discovery_order_when_everything_fits() {
    let ledger = MockLedger::new(Some(40));
    let batcher = WeightBoundedBatcher::new(&ledger, &MockSigner, ref_time(1_000), config(4));

    let plan = batcher.batch(claims(&ledger, 1, 0..10)).await.unwrap();

    let sizes: Vec<_> = plan.batches.iter().map(|batch| batch.len()).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
    let order: Vec<_> =
        plan.batches.iter().flat_map(|batch| batch.gaps().map(|gap| gap.era)).collect();
    assert_eq!(order, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn zero_batch_size_is_rejected() {
    let ledger = MockLedger::new(Some(10));
    let batcher = WeightBoundedBatcher::new(&ledger, &MockSigner, ref_time(1_000), config(0));

    let err = batcher.batch(claims(&ledger, 1, 0..3)).await.unwrap_err();

    assert!(matches!(err, BatchError::ZeroBatchSize));
    assert!(ledger.probes().is_empty());
}

#[tokio::test]
async fn singletons_are_probed_bare() {
    let ledger = MockLedger::new(Some(10));
    let batcher = WeightBoundedBatcher::new(&ledger, &MockSigner, ref_time(1_000), config(1));

    let plan = batcher.batch(claims(&ledger, 1, 0..3)).await.unwrap();

    assert_eq!(plan.batches.len(), 3);
    assert!(plan.batches.iter().all(|batch| batch.is_singleton()));
    assert!(ledger.probes().iter().all(|probe| !probe.is_batch()));
}

#[tokio::test]
#[traced_test]
async fn drops_claim_too_heavy_on_its_own() {
    let heavy = account(2);
    let ledger = MockLedger::new(Some(10))
        .with_weights(ref_time(10), ref_time(0), ref_time(100))
        .with_claim_weight_for(&heavy, ref_time(150));
    let mut input = claims(&ledger, 1, 0..2);
    input.insert(1, claims(&ledger, 2, [7]).remove(0));
    let batcher = WeightBoundedBatcher::new(&ledger, &MockSigner, ref_time(100), config(3));

    let plan = batcher.batch(input).await.unwrap();

    assert_eq!(plan.dropped.len(), 1);
    assert_eq!(plan.dropped[0].gap.account, heavy);
    assert_eq!(plan.claim_count(), 2);
    assert!(plan.batches.iter().flat_map(|batch| batch.gaps()).all(|gap| gap.account != heavy));
    assert!(logs_contain("alone meets the maximum extrinsic weight"));
}

#[tokio::test]
async fn empty_input_yields_no_batches() {
    let ledger = MockLedger::new(Some(10));
    let batcher = WeightBoundedBatcher::new(&ledger, &MockSigner, ref_time(100), config(9));

    let plan = batcher.batch(vec![]).await.unwrap();
    assert!(plan.batches.is_empty());
    assert!(ledger.probes().is_empty());
}

#[tokio::test]
async fn probe_failure_propagates() {
    let ledger = MockLedger::new(Some(10)).with_failing_probes();
    let batcher = WeightBoundedBatcher::new(&ledger, &MockSigner, ref_time(100), config(3));

    let err = batcher.batch(claims(&ledger, 1, 0..5)).await.unwrap_err();
    assert!(matches!(err, BatchError::CostProbe { size: 3, .. }));
}
