use serde::Serialize;

/// Structured trace events emitted across the coordinator's components.
///
/// Each variant is logged as a single `tracing::info!` call with the
/// serialized event under the `trace_event` field, so downstream log
/// processors can pull a stable JSON shape out of otherwise free-form logs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    RunStarted {
        run_id: String,
        tenant_id: Option<String>,
        model: Option<String>,
        store_flag: bool,
        conversation_id: Option<String>,
    },
    RunRouted {
        run_id: String,
        sequence: u64,
        event_type: String,
        status: Option<String>,
    },
    RunFinalized {
        run_id: String,
        status: String,
    },
    IncidentOpened {
        incident_id: String,
        run_id: String,
        kind: String,
    },
    IncidentResolved {
        incident_id: String,
        run_id: String,
        disposition: String,
    },
    RollbackPerformed {
        run_id: String,
        target_sequence: u64,
        operator: Option<String>,
    },
    DelegationRecorded {
        run_id: String,
        call_id: String,
        tool_name: String,
        status: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "rc_event");
    }
}
