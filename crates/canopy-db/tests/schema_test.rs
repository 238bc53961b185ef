//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

async fn fresh_db() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    db
}

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = fresh_db().await;
    canopy_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in [
        "tenant",
        "resource",
        "permission",
        "role",
        "user",
        "audit_log",
        "grants",
        "has_role",
        "_migration",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = fresh_db().await;

    canopy_db::run_migrations(&db).await.unwrap();
    canopy_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
}

#[tokio::test]
async fn unique_index_prevents_duplicate_tenant_codes() {
    let db = fresh_db().await;
    canopy_db::run_migrations(&db).await.unwrap();

    db.query("CREATE tenant SET name = 'Acme', code = 'acme', status = 'Active'")
        .await
        .unwrap()
        .check()
        .unwrap();

    let result = db
        .query("CREATE tenant SET name = 'Other', code = 'acme', status = 'Active'")
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "duplicate code should be rejected");
}

#[tokio::test]
async fn tenant_status_is_constrained() {
    let db = fresh_db().await;
    canopy_db::run_migrations(&db).await.unwrap();

    let result = db
        .query("CREATE tenant SET name = 'Acme', code = 'acme', status = 'Deleted'")
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "unknown status should be rejected");
}
