use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rc_archive::{ArchiveCapabilities, SafetyUpdate, StartRunInput};
use rc_planning::{ConversationInput, ConversationStateManager, HistoryPlanner, ToolRegistry};
use rc_stream::{event, AudioSegment, BufferedMessage, EventRouter, ImageSegment, ProviderEvent, StreamingBuffer, TranscriptSegment};
use rc_tracking::{DelegationTracker, IncidentLog, RateLimitTracker, ResolveInput};
use rc_types::kv::ConversationKv;
use rc_types::model::{
    ConversationPolicy, ConversationStrategy, DelegationRecord, HistoryStrategy,
    IncidentDisposition, IncidentInput, IncidentKind, RunStatus, SafetySnapshot,
};
use rc_types::provider::ProviderClient;
use rc_types::trace::TraceEvent;
use rc_types::{Error, Result};
use serde_json::Value;
use tracing::{warn, Span};

use crate::types::{StartRunOptions, StartRunOutcome};

pub fn status_key(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Queued => "queued",
        RunStatus::InProgress => "in_progress",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
        RunStatus::Cancelled => "cancelled",
        RunStatus::Incomplete => "incomplete",
    }
}

fn incident_kind_str(kind: IncidentKind) -> &'static str {
    match kind {
        IncidentKind::Failed => "failed",
        IncidentKind::Incomplete => "incomplete",
    }
}

fn extract_reason(event: &ProviderEvent) -> Option<String> {
    let response = match event {
        ProviderEvent::ResponseFailed { response } | ProviderEvent::ResponseIncomplete { response } => {
            response.as_ref()?
        }
        _ => return None,
    };
    response
        .pointer("/error/message")
        .or_else(|| response.pointer("/incomplete_details/reason"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn validate_tool_choice(
    tool_choice: &Value,
    payload: &[Value],
    include: &[String],
) -> Result<()> {
    if let Some(choice) = tool_choice.as_str() {
        if choice == "required" && payload.is_empty() {
            return Err(Error::InvalidRequest(
                "toolChoice \"required\" requires at least one tool".to_string(),
            ));
        }
        return Ok(());
    }
    if tool_choice.get("type").and_then(Value::as_str) == Some("function") {
        let name = tool_choice.pointer("/function/name").and_then(Value::as_str);
        let included = name.map(|n| include.iter().any(|i| i == n)).unwrap_or(false);
        if !included {
            return Err(Error::InvalidRequest(
                "toolChoice function name must be included in tools.include".to_string(),
            ));
        }
    }
    Ok(())
}

/// Per-run in-process state the Coordinator owns exclusively; never
/// persisted, evicted on terminal events per spec.md §3.
struct RunState {
    router: EventRouter,
    buffer: StreamingBuffer,
    delegations: DelegationTracker,
    tenant_id: Option<String>,
    model: String,
    span: Span,
}

/// Top-level orchestrator binding the Archive, Event Router, Streaming
/// Buffer, Rate-Limit Tracker, Incident Log, Delegation Tracker,
/// Conversation State Manager, History Planner, and Tool Registry, per
/// spec.md §4.9.
pub struct RunCoordinator {
    archive: ArchiveCapabilities,
    provider: Arc<dyn ProviderClient>,
    kv: Option<Arc<dyn ConversationKv>>,
    rate_limits: Arc<RateLimitTracker>,
    incidents: Arc<IncidentLog>,
    conversation: ConversationStateManager,
    history: HistoryPlanner,
    tools: Arc<ToolRegistry>,
    default_policy: ConversationPolicy,
    runs: RwLock<HashMap<String, Arc<Mutex<RunState>>>>,
}

impl RunCoordinator {
    pub fn new(
        archive: ArchiveCapabilities,
        provider: Arc<dyn ProviderClient>,
        kv: Option<Arc<dyn ConversationKv>>,
        rate_limits: Arc<RateLimitTracker>,
        incidents: Arc<IncidentLog>,
        tools: Arc<ToolRegistry>,
        context_window_tokens: u64,
    ) -> Self {
        Self {
            archive,
            provider,
            kv,
            rate_limits,
            incidents,
            conversation: ConversationStateManager,
            history: HistoryPlanner::new(context_window_tokens),
            tools,
            default_policy: ConversationPolicy::default(),
            runs: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_default_policy(mut self, policy: ConversationPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn archive(&self) -> &ArchiveCapabilities {
        &self.archive
    }

    pub fn incidents(&self) -> &Arc<IncidentLog> {
        &self.incidents
    }

    pub fn rate_limits(&self) -> &Arc<RateLimitTracker> {
        &self.rate_limits
    }

    pub async fn start_run(&self, options: StartRunOptions) -> Result<StartRunOutcome> {
        let history_plan = options.history.clone().map(|input| self.history.plan(input));

        let policy = options.policy.clone().unwrap_or_else(|| {
            if matches!(history_plan.as_ref().map(|p| p.strategy), Some(HistoryStrategy::Vendor)) {
                ConversationPolicy {
                    strategy: ConversationStrategy::Vendor,
                    ttl_seconds: None,
                }
            } else {
                self.default_policy.clone()
            }
        });

        let tenant_id = options.tenant_id.clone();
        let prepared = self
            .conversation
            .prepare(
                self.kv.as_deref(),
                ConversationInput {
                    tenant_id: tenant_id.clone().unwrap_or_else(|| "default".to_string()),
                    run_id: options.run_id.clone(),
                    existing_conversation_id: options.existing_conversation_id.clone(),
                    previous_response_id: options.previous_response_id.clone(),
                    policy,
                },
            )
            .await?;

        let mut metadata = options.request.metadata.clone();
        if let Some(extra) = &options.metadata {
            for (k, v) in extra {
                metadata.insert(k.clone(), v.clone());
            }
        }
        if let Some(speech) = &options.speech {
            if let Some(mode) = &speech.mode {
                metadata.insert("speech_mode".to_string(), mode.clone());
            }
            if let Some(format) = &speech.input_format {
                metadata.insert("speech_input_format".to_string(), format.clone());
            }
            metadata.insert(
                "speech_transcription".to_string(),
                (if speech.transcription_enabled { "enabled" } else { "disabled" }).to_string(),
            );
            if let Some(model) = &speech.transcription_model {
                metadata.insert("speech_transcription_model".to_string(), model.clone());
            }
        }

        let tools_input = options.tools.clone().unwrap_or_default();
        let tool_payload = self.tools.build_tool_payload(tools_input.clone())?;
        if let Some(max_tool_calls) = options.max_tool_calls {
            if !(1..=16).contains(&max_tool_calls) {
                return Err(Error::InvalidRequest(
                    "maxToolCalls must be between 1 and 16".to_string(),
                ));
            }
        }
        if let Some(tool_choice) = &options.tool_choice {
            validate_tool_choice(tool_choice, &tool_payload, &tools_input.include)?;
        }

        let mut request = options.request.clone();
        request.metadata = metadata;
        request.tools = tool_payload;
        request.tool_choice = options.tool_choice.clone();
        request.max_tool_calls = options.max_tool_calls;
        request.conversation = prepared.context.conversation.clone();
        request.store = prepared.context.store_flag;
        request.previous_response_id = prepared.context.previous_response_id.clone();
        request.safety_identifier = options.safety_identifier.clone();

        if request.model.trim().is_empty() {
            return Err(Error::InvalidRequest("model must not be empty".to_string()));
        }
        if request.input.is_null() {
            return Err(Error::InvalidRequest("input payload is required".to_string()));
        }

        let span = tracing::info_span!(
            "run",
            run_id = %options.run_id,
            tenant_id = tracing::field::Empty,
            model = %request.model,
            store_flag = request.store,
            conversation_id = tracing::field::Empty,
            status = tracing::field::Empty,
        );
        if let Some(tenant) = &tenant_id {
            span.record("tenant_id", tenant.as_str());
        }
        if let Some(conversation) = &prepared.context.conversation {
            span.record("conversation_id", conversation.as_str());
        }

        TraceEvent::RunStarted {
            run_id: options.run_id.clone(),
            tenant_id: tenant_id.clone(),
            model: Some(request.model.clone()),
            store_flag: request.store,
            conversation_id: prepared.context.conversation.clone(),
        }
        .emit();

        let safety = options
            .safety_identifier
            .as_deref()
            .map(SafetySnapshot::with_identifier);

        self.archive.core.start_run(StartRunInput {
            run_id: options.run_id.clone(),
            request: request.clone(),
            conversation_id: prepared.context.conversation.clone(),
            metadata: request.metadata.clone(),
            trace_id: options.trace_id.clone(),
            safety,
        })?;

        let state = Arc::new(Mutex::new(RunState {
            router: EventRouter::new(options.run_id.clone(), self.archive.core.clone()),
            buffer: StreamingBuffer::new(),
            delegations: DelegationTracker::new(options.run_id.clone()),
            tenant_id: tenant_id.clone(),
            model: request.model.clone(),
            span,
        }));
        self.runs.write().insert(options.run_id.clone(), state.clone());

        if !options.background {
            let (result, headers) = self.provider.create(&request).await?;
            self.rate_limits.capture(&headers, tenant_id.clone());
            state.lock().buffer.seed_from_result(&result.output);

            let synthetic = serde_json::json!({
                "type": "response.completed",
                "sequence_number": 1,
                "response": serde_json::to_value(&result)?,
            });
            self.handle_event(&options.run_id, synthetic)?;
        }

        Ok(StartRunOutcome {
            request,
            context: prepared.context,
            history_plan,
        })
    }

    pub fn handle_event(&self, run_id: &str, raw: Value) -> Result<ProviderEvent> {
        let state_arc = self
            .runs
            .read()
            .get(run_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(run_id.to_string()))?;

        let (parsed, terminal) = {
            let mut state = state_arc.lock();
            let (record, parsed) = state.router.handle_event(raw)?;
            state.buffer.apply(&parsed);

            TraceEvent::RunRouted {
                run_id: run_id.to_string(),
                sequence: record.sequence,
                event_type: record.event_type.clone(),
                status: event::projected_status(&parsed).map(|s| status_key(s).to_string()),
            }
            .emit();

            if matches!(parsed, ProviderEvent::RefusalDone { .. }) {
                if let Some(safety) = &self.archive.safety_aware {
                    if let Err(err) =
                        safety.update_safety(run_id, SafetyUpdate::RecordRefusal { at: Utc::now() })
                    {
                        warn!(run_id, error = %err, "failed to record refusal");
                    }
                }
            }

            match event::projected_status(&parsed) {
                Some(status @ (RunStatus::Failed | RunStatus::Incomplete)) => {
                    let kind = if status == RunStatus::Incomplete {
                        IncidentKind::Incomplete
                    } else {
                        IncidentKind::Failed
                    };
                    let input = IncidentInput {
                        run_id: run_id.to_string(),
                        kind,
                        sequence: record.sequence,
                        tenant_id: state.tenant_id.clone(),
                        model: Some(state.model.clone()),
                        request_id: None,
                        trace_id: None,
                        reason: extract_reason(&parsed),
                    };
                    match self.incidents.record_incident(input) {
                        Ok(incident) => TraceEvent::IncidentOpened {
                            incident_id: incident.id,
                            run_id: run_id.to_string(),
                            kind: incident_kind_str(kind).to_string(),
                        }
                        .emit(),
                        Err(err) => warn!(run_id, error = %err, "failed to record incident"),
                    }
                }
                Some(RunStatus::Completed) => {
                    match self.incidents.resolve_incidents_by_run(
                        run_id,
                        ResolveInput {
                            resolved_by: "system".to_string(),
                            notes: None,
                            disposition: IncidentDisposition::Manual,
                            linked_run_id: None,
                        },
                    ) {
                        Ok(resolved) => {
                            for incident in resolved {
                                TraceEvent::IncidentResolved {
                                    incident_id: incident.id,
                                    run_id: run_id.to_string(),
                                    disposition: "manual".to_string(),
                                }
                                .emit();
                            }
                        }
                        Err(err) => warn!(run_id, error = %err, "failed to resolve incidents"),
                    }
                }
                _ => {}
            }

            state.delegations.apply(&parsed, self.archive.delegation_aware.as_deref());

            let terminal = event::is_terminal(&parsed);
            if terminal {
                let status = event::projected_status(&parsed).map(status_key).unwrap_or("unknown");
                state.span.record("status", status);
                TraceEvent::RunFinalized {
                    run_id: run_id.to_string(),
                    status: status.to_string(),
                }
                .emit();
            }
            (parsed, terminal)
        };

        if terminal {
            self.runs.write().remove(run_id);
        }
        Ok(parsed)
    }

    /// Rebuilds a run's in-process state from the archive's (possibly
    /// rollback-truncated) timeline and persisted result, per spec.md
    /// §4.9's `ResyncFromArchive`.
    pub fn resync_from_archive(&self, run_id: &str) -> Result<()> {
        let (buffer, delegations) = self.replay_from_archive(run_id)?;
        let events = self.archive.core.get_timeline(run_id)?;
        let last_sequence = events.last().map(|e| e.sequence).unwrap_or(0);
        let run = self.archive.core.get_run(run_id)?;
        let span = tracing::info_span!("run", run_id = %run_id, resynced = true);
        let state = RunState {
            router: EventRouter::with_last_sequence(run_id, self.archive.core.clone(), last_sequence),
            buffer,
            delegations,
            tenant_id: run.tenant_id().map(str::to_string),
            model: run.request.model.clone(),
            span,
        };
        self.runs.write().insert(run_id.to_string(), Arc::new(Mutex::new(state)));
        Ok(())
    }

    fn replay_from_archive(&self, run_id: &str) -> Result<(StreamingBuffer, DelegationTracker)> {
        let run = self.archive.core.get_run(run_id)?;
        let events = self.archive.core.get_timeline(run_id)?;

        let mut buffer = StreamingBuffer::new();
        let mut delegations = DelegationTracker::new(run_id);
        for record in &events {
            let parsed = event::parse(&record.payload);
            buffer.apply(&parsed);
            delegations.apply(&parsed, None);
        }

        let produced_anything = !buffer.messages().is_empty()
            || !buffer.output_audio().is_empty()
            || !buffer.images().is_empty()
            || !buffer.reasoning().is_empty();
        if !produced_anything {
            if let Some(result) = &run.result {
                buffer.seed_from_result(&result.output);
            }
        }

        Ok((buffer, delegations))
    }

    fn with_buffer<T>(&self, run_id: &str, f: impl FnOnce(&StreamingBuffer) -> T) -> Result<T> {
        if let Some(state) = self.runs.read().get(run_id).cloned() {
            let guard = state.lock();
            return Ok(f(&guard.buffer));
        }
        let (buffer, _delegations) = self.replay_from_archive(run_id)?;
        Ok(f(&buffer))
    }

    pub fn get_buffered_messages(&self, run_id: &str) -> Result<Vec<BufferedMessage>> {
        self.with_buffer(run_id, StreamingBuffer::messages)
    }

    pub fn get_reasoning(&self, run_id: &str) -> Result<Vec<String>> {
        self.with_buffer(run_id, StreamingBuffer::reasoning)
    }

    pub fn get_refusals(&self, run_id: &str) -> Result<Vec<String>> {
        self.with_buffer(run_id, StreamingBuffer::refusals)
    }

    pub fn get_output_audio(&self, run_id: &str) -> Result<Vec<AudioSegment>> {
        self.with_buffer(run_id, StreamingBuffer::output_audio)
    }

    pub fn get_images(&self, run_id: &str) -> Result<Vec<ImageSegment>> {
        self.with_buffer(run_id, StreamingBuffer::images)
    }

    pub fn get_input_transcripts(&self, run_id: &str) -> Result<Vec<TranscriptSegment>> {
        self.with_buffer(run_id, StreamingBuffer::input_transcripts)
    }

    pub fn get_delegations(&self, run_id: &str) -> Result<Vec<DelegationRecord>> {
        if let Some(state) = self.runs.read().get(run_id).cloned() {
            return Ok(state.lock().delegations.entries());
        }
        let (_buffer, delegations) = self.replay_from_archive(run_id)?;
        Ok(delegations.entries())
    }
}
