//! Postgres-backed context for workflow integration tests.
//!
//! Connects to the database named by `DATABASE_URL` and creates the schema on
//! first use. Every context seeds its own plant, approvers, and applications,
//! so test binaries can run in parallel against one database without
//! clashing. When `DATABASE_URL` is not set the constructor returns `None`
//! and callers skip instead of failing.

use sqlx::PgPool;
use uuid::Uuid;

use gatehouse_db::RequesterSource;
use gatehouse_governance::{
    ActingUser, AdmissionService, ApprovalService, CreateAccessRequestInput, RequestLine,
    RequestService,
};

const SCHEMA: &str = r#"
DO $$ BEGIN
    CREATE TYPE request_status AS ENUM ('pending', 'completed', 'rejected');
EXCEPTION WHEN duplicate_object THEN NULL; END $$;

DO $$ BEGIN
    CREATE TYPE approver_status AS ENUM ('pending', 'approved', 'rejected');
EXCEPTION WHEN duplicate_object THEN NULL; END $$;

DO $$ BEGIN
    CREATE TYPE requester_source AS ENUM ('employee', 'vendor');
EXCEPTION WHEN duplicate_object THEN NULL; END $$;

DO $$ BEGIN
    CREATE TYPE task_status AS ENUM
        ('pending', 'approved', 'rejected', 'in_progress', 'closed', 'completed');
EXCEPTION WHEN duplicate_object THEN NULL; END $$;

CREATE TABLE IF NOT EXISTS access_requests (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    request_number TEXT NOT NULL UNIQUE,
    requester_name TEXT NOT NULL,
    requester_email TEXT NOT NULL,
    vendor_name TEXT,
    requester_source requester_source NOT NULL,
    access_type TEXT NOT NULL,
    status request_status NOT NULL,
    approver1_email TEXT NOT NULL,
    approver1_status approver_status NOT NULL,
    approver2_email TEXT,
    approver2_status approver_status NOT NULL,
    completed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS request_tasks (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    request_id UUID NOT NULL REFERENCES access_requests(id),
    task_number TEXT NOT NULL,
    application_id BIGINT NOT NULL,
    department_id BIGINT NOT NULL,
    role_id BIGINT NOT NULL,
    plant_id BIGINT NOT NULL,
    task_status task_status NOT NULL,
    approver1_name TEXT,
    approver1_email TEXT,
    approver1_action TEXT,
    approver1_action_at TIMESTAMPTZ,
    approver1_comment TEXT,
    approver2_name TEXT,
    approver2_email TEXT,
    approver2_action TEXT,
    approver2_action_at TIMESTAMPTZ,
    approver2_comment TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS approval_workflows (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    plant_id BIGINT NOT NULL,
    approver1 TEXT NOT NULL,
    approver2 TEXT,
    approver3 TEXT,
    approver4 TEXT,
    approver5 TEXT,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS access_log_entries (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    request_id UUID NOT NULL,
    task_id UUID NOT NULL,
    plant_id BIGINT NOT NULL,
    department_id BIGINT NOT NULL,
    application_id BIGINT NOT NULL,
    requester_name TEXT NOT NULL,
    access_type TEXT NOT NULL,
    disposition task_status NOT NULL,
    updated_on TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (request_id, task_id)
);

CREATE TABLE IF NOT EXISTS closure_records (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    ritm_number TEXT NOT NULL,
    task_number TEXT NOT NULL,
    assignment_group TEXT,
    assigned_to TEXT,
    access_granted TEXT,
    valid_from TIMESTAMPTZ,
    valid_to TIMESTAMPTZ,
    credential_hash TEXT,
    closed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_on TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (ritm_number, task_number)
);

CREATE TABLE IF NOT EXISTS audit_log (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    actor_email TEXT NOT NULL,
    module TEXT NOT NULL,
    table_name TEXT NOT NULL,
    record_id TEXT NOT NULL,
    action TEXT NOT NULL,
    old_value JSONB,
    new_value JSONB,
    comment TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS applications (
    id BIGINT PRIMARY KEY,
    department_id BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS approvers (
    id BIGINT PRIMARY KEY,
    display_name TEXT NOT NULL,
    email TEXT NOT NULL
);
"#;

/// A fresh directory-style identifier, unique enough for parallel suites.
fn unique_id() -> i64 {
    (Uuid::new_v4().as_u128() & 0x7fff_ffff) as i64
}

/// Database-backed context: one plant with a resolved two-tier workflow and
/// two applications in one department.
pub struct TestContext {
    pub pool: PgPool,
    pub requests: RequestService,
    pub approvals: ApprovalService,
    pub admission: AdmissionService,
    pub plant_id: i64,
    pub department_id: i64,
    pub app_a: i64,
    pub app_b: i64,
    pub approver1_id: i64,
    pub approver1_email: String,
    pub pool_ids: Vec<i64>,
}

impl TestContext {
    /// Connect and seed, or `None` when no test database is configured.
    pub async fn new() -> Option<Self> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("skipping: DATABASE_URL is not set");
                return None;
            }
        };

        let pool = PgPool::connect(&url)
            .await
            .expect("connect to the test database");
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .expect("create the test schema");

        let plant_id = unique_id();
        let department_id = unique_id();
        let app_a = unique_id();
        let app_b = unique_id();
        let approver1_id = unique_id();
        let pool_ids = vec![unique_id(), unique_id()];
        let approver1_email = format!("lead.{approver1_id}@example.com");

        for (id, email) in std::iter::once((approver1_id, approver1_email.clone())).chain(
            pool_ids
                .iter()
                .map(|id| (*id, format!("pool.{id}@example.com"))),
        ) {
            sqlx::query("INSERT INTO approvers (id, display_name, email) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(format!("Approver {id}"))
                .bind(email)
                .execute(&pool)
                .await
                .expect("seed approver");
        }

        for app_id in [app_a, app_b] {
            sqlx::query("INSERT INTO applications (id, department_id) VALUES ($1, $2)")
                .bind(app_id)
                .bind(department_id)
                .execute(&pool)
                .await
                .expect("seed application");
        }

        let pool_slot = pool_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        sqlx::query(
            "INSERT INTO approval_workflows (plant_id, approver1, approver2, is_active) \
             VALUES ($1, $2, $3, TRUE)",
        )
        .bind(plant_id)
        .bind(approver1_id.to_string())
        .bind(pool_slot)
        .execute(&pool)
        .await
        .expect("seed workflow");

        Some(Self {
            requests: RequestService::new(pool.clone()),
            approvals: ApprovalService::new(pool.clone()),
            admission: AdmissionService::new(pool.clone()),
            pool,
            plant_id,
            department_id,
            app_a,
            app_b,
            approver1_id,
            approver1_email,
            pool_ids,
        })
    }

    /// Input for a request with one line per given application.
    pub fn request_input(
        &self,
        access_type: &str,
        application_ids: &[i64],
    ) -> CreateAccessRequestInput {
        let suffix = Uuid::new_v4().simple().to_string();
        CreateAccessRequestInput {
            request_number: format!("RITM{suffix}"),
            requester_name: format!("Requester {suffix}"),
            requester_email: format!("requester.{suffix}@example.com"),
            vendor_name: None,
            requester_source: RequesterSource::Employee,
            access_type: access_type.to_string(),
            lines: application_ids
                .iter()
                .enumerate()
                .map(|(n, &application_id)| RequestLine {
                    task_number: format!("TASK{suffix}-{n}"),
                    application_id,
                    department_id: self.department_id,
                    role_id: 1,
                    plant_id: self.plant_id,
                })
                .collect(),
        }
    }

    /// The seeded level-1 approver.
    pub fn approver1(&self) -> ActingUser {
        actor(self.approver1_id, &self.approver1_email)
    }

    /// The nth seeded pool member.
    pub fn pool_member(&self, n: usize) -> ActingUser {
        let id = self.pool_ids[n];
        actor(id, &format!("pool.{id}@example.com"))
    }

    /// An actor with no approval authority (submitter / fulfiller).
    pub fn operator(&self) -> ActingUser {
        let id = unique_id();
        actor(id, &format!("operator.{id}@example.com"))
    }
}

fn actor(id: i64, email: &str) -> ActingUser {
    ActingUser {
        id,
        email: email.to_string(),
        display_name: format!("User {id}"),
        roles: vec!["approver".to_string()],
        plant_scope: vec![],
    }
}
