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

use staking_payouts::{
    build_claim_operations, BatchConfig, Diagnostics, EligibilityScanner, LedgerGateway,
    ScanConfig, SubmissionDriver, SubmissionPolicy, Weight, WeightBoundedBatcher,
};
use staking_payouts_test_utils::{account, MockLedger, MockSigner};

#[tokio::test]
async fn claims_every_gap_exactly_once() {
    let (a, b, nominator) = (account(1), account(2), account(3));
    let ledger = MockLedger::new(Some(14))
        .with_weights(Weight::from_parts(40, 0), Weight::zero(), Weight::from_parts(100, 0))
        .with_nominator(&nominator, &[b.clone()])
        .with_validator(&a, &[10])
        .with_validator(&b, &[9, 12])
        .with_eligible(&a, [8, 9, 11, 12, 13])
        .with_eligible(&b, 7..14);
    let diagnostics = Diagnostics { verbose: true };

    let gaps = EligibilityScanner::new(&ledger, ScanConfig { era_depth: 2, diagnostics })
        .scan(&[a.clone(), nominator])
        .await
        .unwrap();
    // a: 8, 9, 11, 12, 13. b: 10, 11, 13.
    assert_eq!(gaps.len(), 8);

    let ceiling = ledger.max_allowed_weight().await.unwrap();
    let plan = WeightBoundedBatcher::new(
        &ledger,
        &MockSigner,
        ceiling,
        BatchConfig { max_calls: 9, diagnostics },
    )
    .batch(build_claim_operations(&ledger, gaps.clone()))
    .await
    .unwrap();
    assert!(plan.batches.iter().all(|batch| batch.len() <= 2));

    let report =
        SubmissionDriver::new(&ledger, &MockSigner, SubmissionPolicy::FailFast, diagnostics)
            .submit(plan.batches)
            .await;
    assert_eq!(report.failed(), 0);

    let mut submitted: Vec<_> = ledger.submissions().iter().flat_map(|op| op.claims()).collect();
    let mut expected: Vec<_> = gaps.into_iter().map(|gap| (gap.account, gap.era)).collect();
    submitted.sort();
    expected.sort();
    assert_eq!(submitted, expected);
}
