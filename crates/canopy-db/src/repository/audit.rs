//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! The table is append-only: the schema denies update and delete.

use canopy_core::error::CanopyResult;
use canopy_core::models::audit::{AuditLogEntry, AuditOutcome, CreateAuditLogEntry};
use canopy_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::CountRow;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditRowWithId {
    record_id: String,
    tenant_id: Option<String>,
    actor_id: Option<String>,
    resource_id: Option<String>,
    action: String,
    target_type: Option<String>,
    target_id: Option<String>,
    outcome: String,
    message: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    timestamp: DateTime<Utc>,
}

fn parse_opt(value: Option<String>, what: &str) -> Result<Option<Uuid>, DbError> {
    value
        .map(|v| Uuid::parse_str(&v))
        .transpose()
        .map_err(|e| DbError::invalid_id(what, e))
}

impl AuditRowWithId {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let id = Uuid::parse_str(&self.record_id).map_err(|e| DbError::invalid_id("audit", e))?;
        let outcome = AuditOutcome::parse(&self.outcome)
            .ok_or_else(|| DbError::InvalidData(format!("unknown audit outcome: {}", self.outcome)))?;
        Ok(AuditLogEntry {
            id,
            tenant_id: parse_opt(self.tenant_id, "tenant")?,
            actor_id: parse_opt(self.actor_id, "actor")?,
            resource_id: parse_opt(self.resource_id, "resource")?,
            action: self.action,
            target_type: self.target_type,
            target_id: parse_opt(self.target_id, "target")?,
            outcome,
            message: self.message,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            timestamp: self.timestamp,
        })
    }
}

/// Build the WHERE clause for a filter; every condition binds a
/// parameter of the same name.
fn where_clause(filter: &AuditLogFilter) -> String {
    let mut conditions = Vec::new();
    if filter.tenant_id.is_some() {
        conditions.push("tenant_id = $tenant_id");
    }
    if filter.actor_id.is_some() {
        conditions.push("actor_id = $actor_id");
    }
    if filter.action.is_some() {
        conditions.push("action = $action");
    }
    if filter.outcome.is_some() {
        conditions.push("outcome = $outcome");
    }
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

/// SurrealDB implementation of the AuditLog repository.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> CanopyResult<AuditLogEntry> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 tenant_id = $tenant_id, actor_id = $actor_id, \
                 resource_id = $resource_id, action = $action, \
                 target_type = $target_type, target_id = $target_id, \
                 outcome = $outcome, message = $message, \
                 ip_address = $ip_address, user_agent = $user_agent; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('audit_log', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.map(|v| v.to_string())))
            .bind(("actor_id", input.actor_id.map(|v| v.to_string())))
            .bind(("resource_id", input.resource_id.map(|v| v.to_string())))
            .bind(("action", input.action))
            .bind(("target_type", input.target_type))
            .bind(("target_id", input.target_id.map(|v| v.to_string())))
            .bind(("outcome", input.outcome.as_str().to_string()))
            .bind(("message", input.message))
            .bind(("ip_address", input.ip_address))
            .bind(("user_agent", input.user_agent))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        // Statement 1 reads the entry back with its id.
        let rows: Vec<AuditRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;

        Ok(row.try_into_entry()?)
    }

    async fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> CanopyResult<PaginatedResult<AuditLogEntry>> {
        let clause = where_clause(&filter);
        let query = format!(
            "SELECT count() AS total FROM audit_log{clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM audit_log{clause} \
             ORDER BY timestamp DESC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(tenant_id) = filter.tenant_id {
            builder = builder.bind(("tenant_id", tenant_id.to_string()));
        }
        if let Some(actor_id) = filter.actor_id {
            builder = builder.bind(("actor_id", actor_id.to_string()));
        }
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action));
        }
        if let Some(outcome) = filter.outcome {
            builder = builder.bind(("outcome", outcome.as_str().to_string()));
        }

        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<AuditRowWithId> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_entry())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_has_no_where_clause() {
        assert_eq!(where_clause(&AuditLogFilter::default()), "");
    }

    #[test]
    fn filter_conditions_are_joined() {
        let filter = AuditLogFilter {
            tenant_id: Some(Uuid::new_v4()),
            outcome: Some(AuditOutcome::Failure),
            ..Default::default()
        };
        assert_eq!(
            where_clause(&filter),
            " WHERE tenant_id = $tenant_id AND outcome = $outcome"
        );
    }
}
