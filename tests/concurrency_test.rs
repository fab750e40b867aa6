//! Concurrency tests for the instance state machine.
//!
//! These run against a file-backed database with a multi-connection pool so
//! the racing operations genuinely interleave at the storage layer. The
//! invariant under test: decision recording, completion evaluation, and step
//! advancement form one serializable unit of work per instance, so a step
//! advance executes exactly once no matter how many approvers race.

mod common;

use common::*;
use quorum::domain::models::{
    ActivationConditions, ApprovalContext, CompletionRule, Decision, InstanceStatus,
};
use quorum::domain::ports::{DefinitionRepository, InstanceRepository};

/// MIN_N=2 with exactly two eligible approvers, both approving at the same
/// time. Both decisions must land; the advance must happen exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn min_n_race_records_both_decisions_and_advances_once() {
    let h = file_harness().await;
    let pair = explicit_rule(&h, "pair", &["A", "B"]).await;
    let closer = explicit_rule(&h, "closer", &["C"]).await;

    let mut def = quorum::WorkflowDefinition::new(
        "PR-PAIR",
        "Pair sign-off",
        "PURCHASE_REQUISITION",
        ActivationConditions::always(),
    );
    def.add_step(
        "Joint approval",
        "JOINT",
        CompletionRule::MinN { min_approvals: 2 },
        vec![pair.id],
    );
    def.add_step("Close-out", "CLOSE", CompletionRule::Any, vec![closer.id]);
    h.definitions.save_definition(&def).await.unwrap();

    let id = h
        .engine
        .submit_for_approval("PURCHASE_REQUISITION", "PR-1", "E0", ApprovalContext::new())
        .await
        .unwrap()
        .instance_id
        .unwrap();

    let e1 = h.engine.clone();
    let e2 = h.engine.clone();
    let t1 = tokio::spawn(async move { e1.decide(id, "A", Decision::Approve, None).await });
    let t2 = tokio::spawn(async move { e2.decide(id, "B", Decision::Approve, None).await });

    let r1 = t1.await.unwrap();
    let r2 = t2.await.unwrap();
    assert!(r1.is_ok(), "first racer failed: {:?}", r1.err());
    assert!(r2.is_ok(), "second racer failed: {:?}", r2.err());

    let instance = h.engine.get_instance(id).await.unwrap();
    assert_eq!(instance.status, InstanceStatus::InProgress);
    assert_eq!(instance.current_step_sequence, 2, "exactly one advance");

    // Both decisions are in the log for step 1.
    let log = h.instances.decisions_for_step(id, 1).await.unwrap();
    assert_eq!(log.len(), 2);

    // One pool snapshot exists for step 2, created by the single advance.
    let (snapshot_rows,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM step_approver_pool WHERE instance_id = ? AND step_sequence = 2",
    )
    .bind(id.to_string())
    .fetch_one(&h.pool)
    .await
    .unwrap();
    assert_eq!(snapshot_rows, 1);

    // Two accepted mutations on top of creation.
    assert_eq!(instance.version, 3);
}

/// Several approvers racing an ANY step: one decision wins the completion,
/// the rest either land as extra recorded decisions on the passed step or
/// are rejected as conflicts, but the instance terminates exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn any_step_race_terminates_exactly_once() {
    let h = file_harness().await;
    let trio = explicit_rule(&h, "trio", &["A", "B", "C"]).await;
    single_step_definition(
        &h,
        "GL-ANY",
        "GL_DOCUMENT",
        ActivationConditions::always(),
        CompletionRule::Any,
        trio.id,
    )
    .await;

    let id = h
        .engine
        .submit_for_approval("GL_DOCUMENT", "GL-1", "E0", ApprovalContext::new())
        .await
        .unwrap()
        .instance_id
        .unwrap();

    let mut handles = Vec::new();
    for approver in ["A", "B", "C"] {
        let engine = h.engine.clone();
        handles.push(tokio::spawn(async move {
            engine.decide(id, approver, Decision::Approve, None).await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                assert_eq!(receipt.status, InstanceStatus::Approved);
                successes += 1;
            }
            Err(e) => {
                assert!(e.is_conflict(), "unexpected error: {e}");
                conflicts += 1;
            }
        }
    }

    assert_eq!(successes, 1, "exactly one decision completes the step");
    assert_eq!(conflicts, 2);
    assert_eq!(
        h.engine.get_instance(id).await.unwrap().status,
        InstanceStatus::Approved
    );
}

/// Cancellation racing a decision on an ANY step: exactly one wins, the
/// loser gets a typed conflict, and the final status matches the winner.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_and_decide_race_is_consistent() {
    let h = file_harness().await;
    let solo = explicit_rule(&h, "solo", &["A"]).await;
    single_step_definition(
        &h,
        "MR-ANY",
        "MATERIAL_REQUEST",
        ActivationConditions::always(),
        CompletionRule::Any,
        solo.id,
    )
    .await;

    let id = h
        .engine
        .submit_for_approval("MATERIAL_REQUEST", "MR-1", "E0", ApprovalContext::new())
        .await
        .unwrap()
        .instance_id
        .unwrap();

    let e1 = h.engine.clone();
    let e2 = h.engine.clone();
    let decide = tokio::spawn(async move { e1.decide(id, "A", Decision::Approve, None).await });
    let cancel = tokio::spawn(async move { e2.cancel(id, "E0").await });

    let decide_result = decide.await.unwrap();
    let cancel_result = cancel.await.unwrap();

    let final_status = h.engine.get_instance(id).await.unwrap().status;
    match (decide_result, cancel_result) {
        (Ok(receipt), Err(e)) => {
            assert_eq!(receipt.status, InstanceStatus::Approved);
            assert_eq!(final_status, InstanceStatus::Approved);
            assert!(e.is_conflict(), "cancel loser must see a conflict: {e}");
        }
        (Err(e), Ok(status)) => {
            assert_eq!(status, InstanceStatus::Cancelled);
            assert_eq!(final_status, InstanceStatus::Cancelled);
            assert!(e.is_conflict(), "decide loser must see a conflict: {e}");
        }
        (Ok(_), Ok(_)) => panic!("both operations succeeded on one live instance"),
        (Err(d), Err(c)) => panic!("both operations failed: decide={d}, cancel={c}"),
    }
}

/// Duplicate submissions racing for the same object: the partial unique
/// index admits exactly one live instance.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_create_one_live_instance() {
    let h = file_harness().await;
    let solo = explicit_rule(&h, "solo", &["A"]).await;
    single_step_definition(
        &h,
        "GL-ANY",
        "GL_DOCUMENT",
        ActivationConditions::always(),
        CompletionRule::Any,
        solo.id,
    )
    .await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = h.engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .submit_for_approval("GL_DOCUMENT", "GL-77", "E0", ApprovalContext::new())
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                assert!(outcome.requires_approval);
                created += 1;
            }
            Err(e) => assert!(e.is_conflict(), "unexpected error: {e}"),
        }
    }
    assert_eq!(created, 1);

    let (live,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM workflow_instances WHERE object_id = 'GL-77' AND status = 'in_progress'",
    )
    .fetch_one(&h.pool)
    .await
    .unwrap();
    assert_eq!(live, 1);
}
