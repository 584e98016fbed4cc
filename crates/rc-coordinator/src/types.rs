use std::collections::HashMap;

use rc_planning::BuildToolPayloadInput;
use rc_types::model::{ConversationContext, ConversationPolicy, HistoryInput, HistoryPlan};
use rc_types::provider::ProviderRequest;
use serde_json::Value;

/// Speech-mode knobs folded into a run's request metadata per spec.md §4.9
/// step 3. `transcription_enabled` maps to the `speech_transcription`
/// metadata value (`"enabled"`/`"disabled"`), not a boolean field directly,
/// since metadata is a string→string map.
#[derive(Debug, Clone, Default)]
pub struct SpeechOptions {
    pub mode: Option<String>,
    pub input_format: Option<String>,
    pub transcription_enabled: bool,
    pub transcription_model: Option<String>,
}

/// Input to `RunCoordinator::start_run`.
pub struct StartRunOptions {
    pub run_id: String,
    pub tenant_id: Option<String>,
    pub request: ProviderRequest,
    pub policy: Option<ConversationPolicy>,
    pub metadata: Option<HashMap<String, String>>,
    pub background: bool,
    pub previous_response_id: Option<String>,
    pub existing_conversation_id: Option<String>,
    pub tools: Option<BuildToolPayloadInput>,
    pub history: Option<HistoryInput>,
    pub max_tool_calls: Option<u32>,
    pub tool_choice: Option<Value>,
    pub safety_identifier: Option<String>,
    pub speech: Option<SpeechOptions>,
    pub trace_id: Option<String>,
}

impl StartRunOptions {
    pub fn new(run_id: impl Into<String>, request: ProviderRequest) -> Self {
        Self {
            run_id: run_id.into(),
            tenant_id: None,
            request,
            policy: None,
            metadata: None,
            background: false,
            previous_response_id: None,
            existing_conversation_id: None,
            tools: None,
            history: None,
            max_tool_calls: None,
            tool_choice: None,
            safety_identifier: None,
            speech: None,
            trace_id: None,
        }
    }
}

/// `StartRun`'s return value, per spec.md §4.9 step 10.
#[derive(Debug, Clone)]
pub struct StartRunOutcome {
    pub request: ProviderRequest,
    pub context: ConversationContext,
    pub history_plan: Option<HistoryPlan>,
}
