//! Database-backed workflow tests: the full approve-then-close path, the
//! idempotent closure upserts, projection refresh on rejection, and the
//! atomicity of guarded paths.
//!
//! Run with: `cargo test -p gatehouse-governance --features integration`
//! against a Postgres named by `DATABASE_URL`.

#![cfg(feature = "integration")]

mod common;

use common::db::TestContext;
use gatehouse_db::{
    AccessLogEntry, AccessRequest, AuditLogEntry, ClosureRecord, RequestStatus, RequestTask,
    TaskStatus,
};
use gatehouse_governance::{CloseTaskInput, ClosureService, GovernanceError};

#[tokio::test]
async fn approval_then_closure_completes_the_request() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let created = ctx
        .requests
        .create_request(
            &ctx.operator(),
            ctx.request_input("New User Creation", &[ctx.app_a, ctx.app_b]),
        )
        .await
        .expect("create request");
    assert_eq!(created.tasks.len(), 2);
    assert!(created.request.status.is_pending());

    // Level 1 decides; the request stays pending for the pool.
    let outcome = ctx
        .approvals
        .approve(created.request.id, &ctx.approver1(), None)
        .await
        .expect("approver1 approve");
    assert_eq!(outcome.request_status, RequestStatus::Pending);

    // A pool member completes the request and every task moves to approved.
    let outcome = ctx
        .approvals
        .approve(created.request.id, &ctx.pool_member(0), None)
        .await
        .expect("approver2 approve");
    assert_eq!(outcome.request_status, RequestStatus::Completed);
    assert_eq!(outcome.tasks_updated, 2);

    for task in &created.tasks {
        ctx.approvals
            .close_task(
                task.id,
                TaskStatus::Closed,
                &ctx.operator(),
                CloseTaskInput {
                    assigned_to: Some("fulfilment".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("close task");
    }

    let request = AccessRequest::find_by_id(&ctx.pool, created.request.id)
        .await
        .expect("reload request")
        .expect("request exists");
    assert_eq!(request.status, RequestStatus::Completed);
    assert!(request.completed_at.is_some());

    for task in &created.tasks {
        let entry = AccessLogEntry::find_by_key(&ctx.pool, request.id, task.id)
            .await
            .expect("query access log")
            .expect("entry projected");
        assert_eq!(entry.disposition, TaskStatus::Closed);
    }

    let records = ClosureRecord::find_by_ritm(&ctx.pool, &request.request_number)
        .await
        .expect("query closure records");
    assert_eq!(records.len(), 2);

    let trail = AuditLogEntry::find_by_record(
        &ctx.pool,
        "access_requests",
        &request.request_number,
        10,
    )
    .await
    .expect("query audit trail");
    assert!(!trail.is_empty());
}

#[tokio::test]
async fn closure_upsert_is_idempotent_by_business_key() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let created = ctx
        .requests
        .create_request(
            &ctx.operator(),
            ctx.request_input("New User Creation", &[ctx.app_a]),
        )
        .await
        .expect("create request");
    let task = &created.tasks[0];

    ctx.approvals
        .approve(created.request.id, &ctx.approver1(), None)
        .await
        .expect("approver1 approve");
    ctx.approvals
        .approve(created.request.id, &ctx.pool_member(1), None)
        .await
        .expect("approver2 approve");

    // First closure carries a credential; the retry updates the assignee but
    // omits the credential.
    ctx.approvals
        .close_task(
            task.id,
            TaskStatus::Closed,
            &ctx.operator(),
            CloseTaskInput {
                assigned_to: Some("first.shift".to_string()),
                credential: Some("s3cret-pass".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("first closure");
    ctx.approvals
        .close_task(
            task.id,
            TaskStatus::Closed,
            &ctx.operator(),
            CloseTaskInput {
                assigned_to: Some("second.shift".to_string()),
                credential: None,
                ..Default::default()
            },
        )
        .await
        .expect("retried closure");

    let records = ClosureRecord::find_by_ritm(&ctx.pool, &created.request.request_number)
        .await
        .expect("query closure records");
    assert_eq!(records.len(), 1, "retries must update, not duplicate");

    let record = ClosureRecord::find_by_key(
        &ctx.pool,
        &created.request.request_number,
        &task.task_number,
    )
    .await
    .expect("query closure record")
    .expect("record exists");
    assert_eq!(record.assigned_to.as_deref(), Some("second.shift"));
    // The omitted credential preserves the stored hash.
    assert_eq!(
        record.credential_hash.as_deref(),
        Some(ClosureService::hash_credential("s3cret-pass").as_str())
    );
}

#[tokio::test]
async fn rejection_refreshes_projected_dispositions() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let input = ctx.request_input("New User Creation", &[ctx.app_a]);
    let requester_name = input.requester_name.clone();
    let created = ctx
        .requests
        .create_request(&ctx.operator(), input)
        .await
        .expect("create request");
    let task = &created.tasks[0];

    // Fulfilment starts before any decision; the projection now carries an
    // active disposition for the tuple.
    ctx.approvals
        .close_task(
            task.id,
            TaskStatus::InProgress,
            &ctx.operator(),
            CloseTaskInput::default(),
        )
        .await
        .expect("move task to in progress");

    ctx.approvals
        .reject(
            created.request.id,
            &ctx.approver1(),
            "access not justified".to_string(),
        )
        .await
        .expect("reject request");

    let entry = AccessLogEntry::find_by_key(&ctx.pool, created.request.id, task.id)
        .await
        .expect("query access log")
        .expect("entry projected");
    assert_eq!(entry.disposition, TaskStatus::Rejected);

    // The dead request no longer blocks a resubmission of the same tuple.
    let check = ctx
        .admission
        .check_access_log(
            ctx.plant_id,
            ctx.department_id,
            &[ctx.app_a],
            &requester_name,
            "New User Creation",
        )
        .await
        .expect("admission check");
    assert!(!check.conflict, "rejected history must not block: {check:?}");
}

#[tokio::test]
async fn premature_closure_leaves_no_trace() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let created = ctx
        .requests
        .create_request(
            &ctx.operator(),
            ctx.request_input("New User Creation", &[ctx.app_a]),
        )
        .await
        .expect("create request");
    let task = &created.tasks[0];

    let err = ctx
        .approvals
        .close_task(
            task.id,
            TaskStatus::Closed,
            &ctx.operator(),
            CloseTaskInput::default(),
        )
        .await
        .expect_err("closure before approvals must fail");
    assert!(matches!(err, GovernanceError::TaskClosureNotApproved));

    // Nothing from the refused cascade is visible.
    let task = RequestTask::find_by_id(&ctx.pool, task.id)
        .await
        .expect("reload task")
        .expect("task exists");
    assert_eq!(task.task_status, TaskStatus::Pending);
    let record = ClosureRecord::find_by_key(
        &ctx.pool,
        &created.request.request_number,
        &task.task_number,
    )
    .await
    .expect("query closure record");
    assert!(record.is_none());
}

#[tokio::test]
async fn decided_request_refuses_further_decisions() {
    let Some(ctx) = TestContext::new().await else {
        return;
    };

    let created = ctx
        .requests
        .create_request(
            &ctx.operator(),
            ctx.request_input("New User Creation", &[ctx.app_a]),
        )
        .await
        .expect("create request");

    ctx.approvals
        .approve(created.request.id, &ctx.approver1(), None)
        .await
        .expect("approver1 approve");
    ctx.approvals
        .approve(created.request.id, &ctx.pool_member(0), None)
        .await
        .expect("approver2 approve");

    let err = ctx
        .approvals
        .approve(created.request.id, &ctx.pool_member(1), None)
        .await
        .expect_err("second pool decision must be refused");
    assert!(matches!(err, GovernanceError::RequestNotPending));
}
