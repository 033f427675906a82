use tracing::info;

use rise_core::audit::{AuditEvent, AuditSink};

/// Writes audit events to the structured log stream.
#[derive(Clone, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        info!(
            event_name = "audit.event",
            audit_event_id = %event.event_id,
            audit_event_type = %event.event_type,
            category = ?event.category,
            outcome = ?event.outcome,
            actor = %event.actor,
            correlation_id = %event.correlation_id,
            session_id = event.session_id.as_ref().map(|id| id.as_str()).unwrap_or(""),
            metadata = %metadata,
            "audit event recorded"
        );
    }
}
