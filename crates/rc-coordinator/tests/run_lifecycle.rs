//! End-to-end coverage of the coordinator + operations surface, exercising
//! StartRun, HandleEvent, Retry, and Rollback together the way a single
//! component test cannot.

use std::sync::Arc;

use rc_archive::{Archive, InMemoryArchive, RollbackTarget};
use rc_coordinator::{OperationsService, RunCoordinator, StartRunOptions};
use rc_planning::ToolRegistry;
use rc_tracking::{IncidentLog, RateLimitTracker};
use rc_types::model::{IncidentStatus, RunStatus};
use rc_types::provider::{ProviderClient, ProviderHeaders, ProviderRequest, ProviderResult, ProviderStatus, ProviderUsage};
use rc_types::Result;
use serde_json::json;

struct StubProvider;

#[async_trait::async_trait]
impl ProviderClient for StubProvider {
    async fn create(&self, request: &ProviderRequest) -> Result<(ProviderResult, ProviderHeaders)> {
        let result = ProviderResult {
            id: "resp_1".to_string(),
            status: ProviderStatus::Completed,
            output: vec![json!({
                "type": "message",
                "role": "assistant",
                "id": "msg_1",
                "content": [{"type": "output_text", "text": "hello"}],
            })],
            usage: ProviderUsage { total_tokens: Some(30) },
            model: Some(request.model.clone()),
        };
        Ok((result, ProviderHeaders::new()))
    }
}

fn fixture(dir: &std::path::Path) -> (Arc<InMemoryArchive>, Arc<RunCoordinator>, OperationsService) {
    let archive = Arc::new(InMemoryArchive::new());
    let capabilities = archive.clone().capabilities();
    let provider = Arc::new(StubProvider);
    let tools = Arc::new(ToolRegistry::new());
    let rate_limits = Arc::new(RateLimitTracker::new());
    let incidents = Arc::new(IncidentLog::open(dir.join("incidents.json")).unwrap());
    let coordinator = Arc::new(RunCoordinator::new(
        capabilities,
        provider,
        None,
        rate_limits,
        incidents,
        tools,
        128_000,
    ));
    let ops = OperationsService::new(coordinator.clone());
    (archive, coordinator, ops)
}

#[tokio::test]
async fn happy_path_text_run_completes_and_buffers_the_message() {
    let dir = tempfile::tempdir().unwrap();
    let (archive, coordinator, ops) = fixture(dir.path());

    let mut options = StartRunOptions::new(
        "r1",
        ProviderRequest {
            model: "m".to_string(),
            input: json!("hi"),
            ..Default::default()
        },
    );
    options.tenant_id = Some("t1".to_string());

    coordinator.start_run(options).await.unwrap();

    let run = archive.get_run("r1").unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.result.as_ref().unwrap().usage.total_tokens, Some(30));

    let timeline = archive.get_timeline("r1").unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].sequence, 1);

    let messages = coordinator.get_buffered_messages("r1").unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "hello");

    let summary = ops.summary().unwrap();
    assert_eq!(summary.total_runs, 1);
    assert_eq!(summary.total_tokens, 30);
    assert_eq!(summary.status_counts.get("completed"), Some(&1));
}

#[tokio::test]
async fn refusal_does_not_open_an_incident_but_failure_does_and_retry_resolves_it() {
    let dir = tempfile::tempdir().unwrap();
    let (archive, coordinator, ops) = fixture(dir.path());

    let mut options = StartRunOptions::new(
        "r3",
        ProviderRequest {
            model: "m".to_string(),
            input: json!("hi"),
            ..Default::default()
        },
    );
    options.tenant_id = Some("t1".to_string());
    options.background = true;
    coordinator.start_run(options).await.unwrap();

    coordinator
        .handle_event(
            "r3",
            json!({
                "type": "response.refusal.done",
                "sequence_number": 1,
                "item_id": "msg_1",
                "refusal": "I must decline",
            }),
        )
        .unwrap();

    assert_eq!(coordinator.get_refusals("r3").unwrap(), vec!["I must decline".to_string()]);
    assert_eq!(archive.get_run("r3").unwrap().safety.unwrap().refusal_count, 1);
    assert!(coordinator.incidents().list(Some(IncidentStatus::Open)).is_empty());

    coordinator
        .handle_event(
            "r3",
            json!({
                "type": "response.failed",
                "sequence_number": 2,
                "response": {"status": "failed"},
            }),
        )
        .unwrap();

    assert_eq!(archive.get_run("r3").unwrap().status, RunStatus::Failed);
    let open = coordinator.incidents().list(Some(IncidentStatus::Open));
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].run_id, "r3");

    ops.retry("r3", None, None, false).await.unwrap();

    assert!(coordinator.incidents().list(Some(IncidentStatus::Open)).is_empty());
    let resolved = coordinator.incidents().list(Some(IncidentStatus::Resolved));
    assert_eq!(resolved.len(), 1);
    let resolution = resolved[0].resolution.as_ref().unwrap();
    let new_run_id = resolution.linked_run_id.clone().unwrap();
    assert_eq!(archive.get_run(&new_run_id).unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn rollback_by_tool_call_id_preserves_the_requested_delegation_only() {
    let dir = tempfile::tempdir().unwrap();
    let (archive, coordinator, ops) = fixture(dir.path());

    let mut options = StartRunOptions::new(
        "r4",
        ProviderRequest {
            model: "m".to_string(),
            input: json!("hi"),
            ..Default::default()
        },
    );
    options.background = true;
    coordinator.start_run(options).await.unwrap();

    coordinator
        .handle_event("r4", json!({"type": "response.created", "sequence_number": 1}))
        .unwrap();
    coordinator
        .handle_event("r4", json!({"type": "response.in_progress", "sequence_number": 2}))
        .unwrap();
    coordinator
        .handle_event(
            "r4",
            json!({
                "type": "response.function_call_arguments.done",
                "sequence_number": 3,
                "call_id": "c1",
                "name": "search",
                "arguments": "{}",
            }),
        )
        .unwrap();
    coordinator
        .handle_event(
            "r4",
            json!({
                "type": "response.output_item.done",
                "sequence_number": 4,
                "item": {"type": "tool_call", "call_id": "c1", "status": "completed", "output": "ok"},
            }),
        )
        .unwrap();
    coordinator
        .handle_event(
            "r4",
            json!({
                "type": "response.completed",
                "sequence_number": 5,
                "response": {"id": "resp_x", "status": "completed", "output": [], "usage": {"total_tokens": 0}},
            }),
        )
        .unwrap();

    let snapshot = ops
        .rollback("r4", RollbackTarget::ToolCallId("c1".to_string()), Some("op".to_string()), None)
        .unwrap();
    assert_eq!(snapshot.events.len(), 4);
    assert_eq!(snapshot.events.last().unwrap().event_type, "responses.rollback");

    let run = archive.get_run("r4").unwrap();
    assert_eq!(run.status, RunStatus::InProgress);

    let delegations = coordinator.get_delegations("r4").unwrap();
    assert_eq!(delegations.len(), 1);
    assert_eq!(delegations[0].status, rc_types::model::DelegationStatus::Requested);
}
