//! Audit recording.
//!
//! The engine never writes audit entries; the workflows around it do,
//! after they know the outcome.

use canopy_core::error::CanopyResult;
use canopy_core::models::audit::{AuditLogEntry, AuditOutcome, CreateAuditLogEntry};
use canopy_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};
use tracing::{info, warn};
use uuid::Uuid;

/// Builder for one audit entry.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    entry: CreateAuditLogEntry,
}

impl AuditEvent {
    pub fn new(action: &str, outcome: AuditOutcome) -> Self {
        Self {
            entry: CreateAuditLogEntry {
                tenant_id: None,
                actor_id: None,
                resource_id: None,
                action: action.into(),
                target_type: None,
                target_id: None,
                outcome,
                message: None,
                ip_address: None,
                user_agent: None,
            },
        }
    }

    pub fn tenant(mut self, tenant_id: Uuid) -> Self {
        self.entry.tenant_id = Some(tenant_id);
        self
    }

    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.entry.actor_id = Some(actor_id);
        self
    }

    pub fn resource(mut self, resource_id: Uuid) -> Self {
        self.entry.resource_id = Some(resource_id);
        self
    }

    pub fn target(mut self, target_type: &str, target_id: Uuid) -> Self {
        self.entry.target_type = Some(target_type.into());
        self.entry.target_id = Some(target_id);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.entry.message = Some(message.into());
        self
    }

    pub fn client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.entry.ip_address = ip_address;
        self.entry.user_agent = user_agent;
        self
    }

    pub fn into_entry(self) -> CreateAuditLogEntry {
        self.entry
    }
}

#[derive(Clone)]
pub struct AuditService<A: AuditLogRepository> {
    audit_repo: A,
}

impl<A: AuditLogRepository> AuditService<A> {
    pub fn new(audit_repo: A) -> Self {
        Self { audit_repo }
    }

    pub async fn record(&self, event: AuditEvent) -> CanopyResult<AuditLogEntry> {
        let entry = event.into_entry();
        info!(
            action = %entry.action,
            outcome = entry.outcome.as_str(),
            actor_id = ?entry.actor_id,
            resource_id = ?entry.resource_id,
            "audit"
        );
        self.audit_repo.append(entry).await
    }

    /// Record without failing the caller; used on paths that are already
    /// returning an error of their own.
    pub async fn record_best_effort(&self, event: AuditEvent) {
        if let Err(e) = self.record(event).await {
            warn!(error = %e, "failed to write audit entry");
        }
    }

    pub async fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> CanopyResult<PaginatedResult<AuditLogEntry>> {
        self.audit_repo.list(filter, pagination).await
    }
}
