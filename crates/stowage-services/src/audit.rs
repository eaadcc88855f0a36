//! Audit sinks and the `Auditor` wrapper services report through.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use stowage_core::{AuditAction, AuditEvent, AuditSink, NoOpAuditSink};
use tokio::sync::Mutex;

/// Fire-and-forget front for an `AuditSink`. Sink failures are logged and swallowed so they
/// never mask the outcome of the audited operation.
#[derive(Clone)]
pub struct Auditor {
    sink: Arc<dyn AuditSink>,
}

impl Auditor {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoOpAuditSink))
    }

    pub async fn record(&self, event: AuditEvent) {
        let action = event.action;
        let event_id = event.id;
        if let Err(e) = self.sink.record(event).await {
            tracing::warn!(
                error = %e,
                event_id = %event_id,
                action = action.as_str(),
                "Failed to record audit event"
            );
        }
    }
}

/// Emits each event as a structured `tracing` event with target `audit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), String> {
        let details = serde_json::Value::Object(event.details);
        if event.success {
            tracing::info!(
                target: "audit",
                event_id = %event.id,
                user_id = %event.user_id,
                username = ?event.username,
                action = event.action.as_str(),
                resource = %event.resource,
                resource_id = ?event.resource_id,
                client_ip = ?event.client_ip,
                user_agent = ?event.user_agent,
                details = %details,
                "audit"
            );
        } else {
            tracing::warn!(
                target: "audit",
                event_id = %event.id,
                user_id = %event.user_id,
                username = ?event.username,
                action = event.action.as_str(),
                resource = %event.resource,
                resource_id = ?event.resource_id,
                client_ip = ?event.client_ip,
                user_agent = ?event.user_agent,
                error = ?event.error,
                details = %details,
                "audit"
            );
        }
        Ok(())
    }
}

/// Keeps the most recent events in memory, oldest dropped first.
pub struct MemoryAuditSink {
    capacity: usize,
    events: Mutex<VecDeque<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.iter().cloned().collect()
    }

    pub async fn by_action(&self, action: AuditAction) -> Vec<AuditEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), String> {
        let mut events = self.events.lock().await;
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
        Ok(())
    }
}

/// Forwards every event to each inner sink. All sinks are attempted; failures are joined.
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AuditSink for FanoutAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), String> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.record(event.clone()).await {
                failures.push(e);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::models::Caller;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn record(&self, _event: AuditEvent) -> Result<(), String> {
            Err("sink offline".to_string())
        }
    }

    fn event(action: AuditAction) -> AuditEvent {
        AuditEvent::new(&Caller::user("alice"), action, "config")
    }

    #[tokio::test]
    async fn test_memory_sink_is_bounded() {
        let sink = MemoryAuditSink::new(2);
        sink.record(event(AuditAction::CreateConfig)).await.unwrap();
        sink.record(event(AuditAction::UpdateConfig)).await.unwrap();
        sink.record(event(AuditAction::DeleteConfig)).await.unwrap();

        let actions: Vec<_> = sink.events().await.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::UpdateConfig, AuditAction::DeleteConfig]);
        assert_eq!(sink.by_action(AuditAction::DeleteConfig).await.len(), 1);
    }

    #[tokio::test]
    async fn test_fanout_reaches_every_sink_despite_failures() {
        let memory = Arc::new(MemoryAuditSink::new(10));
        let fanout = FanoutAuditSink::new(vec![Arc::new(FailingSink), memory.clone()]);

        let result = fanout.record(event(AuditAction::ExportConfigs)).await;
        assert_eq!(result.unwrap_err(), "sink offline");
        assert_eq!(memory.events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_auditor_swallows_sink_failure() {
        let auditor = Auditor::new(Arc::new(FailingSink));
        auditor.record(event(AuditAction::CreateConfig)).await;
    }
}
