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
    build_claim_operations, Batch, ClaimOperation, Diagnostics, EligibleGap, EraIndex,
    ScanWindow, SubmissionDriver, SubmissionPolicy,
};
use staking_payouts_test_utils::{account, MockLedger, MockOperation, MockSigner};
use tracing_test::traced_test;

/// Batches of the given sizes over consecutive eras of one stash.
fn batches(ledger: &MockLedger, sizes: &[usize]) -> Vec<Batch<MockOperation>> {
    let stash = account(1);
    let mut era: EraIndex = 0;
    let mut out = Vec::new();
    for &size in sizes {
        let gaps = (0..size)
            .map(|_| {
                era += 1;
                EligibleGap { account: stash.clone(), era, window: ScanWindow::Forward }
            })
            .collect();
        let claims: Vec<ClaimOperation<MockOperation>> = build_claim_operations(ledger, gaps);
        out.extend(Batch::new(claims));
    }
    out
}

fn fail_fast(ledger: &MockLedger) -> SubmissionDriver<'_, MockLedger> {
    SubmissionDriver::new(ledger, &MockSigner, SubmissionPolicy::FailFast, Diagnostics::default())
}

#[tokio::test]
async fn submits_in_order_and_wraps_only_multi_claim_batches() {
    let ledger = MockLedger::new(Some(10));
    let driver = fail_fast(&ledger);

    let report = driver.submit(batches(&ledger, &[2, 1, 3])).await;

    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 0);
    let submitted = ledger.submissions();
    assert_eq!(submitted.len(), 3);
    assert!(submitted[0].is_batch());
    assert!(matches!(submitted[1], MockOperation::Claim { era: 3, .. }));
    assert!(submitted[2].is_batch());
    let eras: Vec<_> = submitted.iter().flat_map(|op| op.claims()).map(|(_, era)| era).collect();
    assert_eq!(eras, (1..=6).collect::<Vec<_>>());
    assert_eq!(report.results.iter().map(|r| r.calls).collect::<Vec<_>>(), vec![2, 1, 3]);
}

#[tokio::test]
#[traced_test]
async fn fail_fast_stops_after_first_failure() {
    let ledger = MockLedger::new(Some(10)).with_failing_submission(1);
    let driver = fail_fast(&ledger);

    let report = driver.submit(batches(&ledger, &[1, 1, 1, 1])).await;

    assert_eq!(ledger.submissions().len(), 2);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.not_attempted(), 2);
    assert!(logs_contain("Tx failed to sign and send (tx 2/4)"));
    assert!(logs_contain("Not sending the remaining 2 transactions"));
}

#[tokio::test]
async fn best_effort_attempts_every_batch() {
    let ledger = MockLedger::new(Some(10)).with_failing_submission(1);
    let driver = SubmissionDriver::new(
        &ledger,
        &MockSigner,
        SubmissionPolicy::BestEffort,
        Diagnostics::default(),
    );

    let report = driver.submit(batches(&ledger, &[1, 2, 1, 1])).await;

    assert_eq!(ledger.submissions().len(), 4);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.not_attempted(), 0);
    assert!(report.results[1].outcome.is_err());
    assert!(report.results[2].outcome.is_ok());
}

#[tokio::test]
async fn nothing_to_submit() {
    let ledger = MockLedger::new(Some(10));
    let driver = fail_fast(&ledger);

    let report = driver.submit(vec![]).await;
    assert_eq!(report.total, 0);
    assert!(report.results.is_empty());
    assert!(ledger.submissions().is_empty());
}
