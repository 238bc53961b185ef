//! Integration tests for the append-only audit log using in-memory
//! SurrealDB.

use canopy_core::models::audit::{AuditOutcome, CreateAuditLogEntry};
use canopy_core::repository::{AuditLogFilter, AuditLogRepository, Pagination};
use canopy_db::repository::SurrealAuditLogRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> SurrealAuditLogRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    canopy_db::run_migrations(&db).await.unwrap();
    SurrealAuditLogRepository::new(db)
}

fn entry(tenant_id: Uuid, action: &str, outcome: AuditOutcome) -> CreateAuditLogEntry {
    CreateAuditLogEntry {
        tenant_id: Some(tenant_id),
        actor_id: Some(Uuid::new_v4()),
        resource_id: None,
        action: action.into(),
        target_type: None,
        target_id: None,
        outcome,
        message: Some(format!("{action} happened")),
        ip_address: Some("10.0.0.1".into()),
        user_agent: None,
    }
}

#[tokio::test]
async fn append_returns_the_stored_entry() {
    let repo = setup().await;
    let tenant = Uuid::new_v4();

    let stored = repo
        .append(entry(tenant, "CREATE_RESOURCE", AuditOutcome::Failure))
        .await
        .unwrap();

    assert_eq!(stored.tenant_id, Some(tenant));
    assert_eq!(stored.action, "CREATE_RESOURCE");
    assert_eq!(stored.outcome, AuditOutcome::Failure);
    assert_eq!(stored.ip_address.as_deref(), Some("10.0.0.1"));
    assert!(stored.resource_id.is_none());
}

#[tokio::test]
async fn list_filters_by_tenant_and_outcome() {
    let repo = setup().await;
    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();

    repo.append(entry(tenant_a, "ASSIGN_ROLE", AuditOutcome::Success))
        .await
        .unwrap();
    repo.append(entry(tenant_a, "ASSIGN_ROLE", AuditOutcome::Failure))
        .await
        .unwrap();
    repo.append(entry(tenant_b, "ASSIGN_ROLE", AuditOutcome::Failure))
        .await
        .unwrap();

    let all_a = repo
        .list(
            AuditLogFilter {
                tenant_id: Some(tenant_a),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(all_a.total, 2);

    let failures_a = repo
        .list(
            AuditLogFilter {
                tenant_id: Some(tenant_a),
                outcome: Some(AuditOutcome::Failure),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(failures_a.total, 1);
    assert_eq!(failures_a.items[0].outcome, AuditOutcome::Failure);

    let everything = repo
        .list(AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(everything.total, 3);
}
