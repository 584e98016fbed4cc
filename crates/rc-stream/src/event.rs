use rc_types::model::RunStatus;
use serde_json::Value;

/// The provider's event stream modeled as a finite tagged variant plus an
/// `Other` catch-all, per spec.md §9's design note on replacing open/dynamic
/// payloads with a closed type the router and buffer can both match on. The
/// Archive still stores the raw JSON payload verbatim; this is purely the
/// dispatch-time view.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    ResponseQueued,
    ResponseCreated,
    ResponseInProgress,
    ResponseCompleted { response: Option<Value> },
    ResponseFailed { response: Option<Value> },
    ResponseCancelled { response: Option<Value> },
    ResponseIncomplete { response: Option<Value> },
    OutputItemAdded { item: Value },
    OutputItemDone { item: Value },
    OutputTextDelta { item_id: String, delta: String },
    OutputTextDone { item_id: String, text: Option<String> },
    ReasoningSummaryPartDone { item_id: String, part: Value },
    RefusalDone { item_id: String, refusal: String },
    OutputAudioDelta { item_id: String, delta: String },
    OutputAudioDone { item_id: String, format: Option<String> },
    OutputAudioTranscriptDelta { item_id: String, delta: String },
    OutputAudioTranscriptDone { item_id: String, transcript: String },
    InputAudioTranscriptionDelta { item_id: String, delta: String },
    InputAudioTranscriptionDone { item_id: String, transcript: String },
    ImageGenerationPartialImage { item_id: String, partial_b64: String },
    ImageGenerationCompleted { item_id: String, payload: Value },
    FunctionCallArgumentsDone { payload: Value },
    Other { event_type: String, payload: Value },
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn opt_str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Parses a raw provider event into its dispatch view. Malformed/unknown
/// shapes never fail — they fall back to `Other` or empty fields, per
/// spec.md §4.3 ("malformed events must not throw").
pub fn parse(raw: &Value) -> ProviderEvent {
    let event_type = raw.get("type").and_then(Value::as_str).unwrap_or("unknown");
    match event_type {
        "response.queued" => ProviderEvent::ResponseQueued,
        "response.created" => ProviderEvent::ResponseCreated,
        "response.in_progress" => ProviderEvent::ResponseInProgress,
        "response.completed" => ProviderEvent::ResponseCompleted {
            response: raw.get("response").cloned(),
        },
        "response.failed" => ProviderEvent::ResponseFailed {
            response: raw.get("response").cloned(),
        },
        "response.cancelled" => ProviderEvent::ResponseCancelled {
            response: raw.get("response").cloned(),
        },
        "response.incomplete" => ProviderEvent::ResponseIncomplete {
            response: raw.get("response").cloned(),
        },
        "response.output_item.added" => ProviderEvent::OutputItemAdded {
            item: raw.get("item").cloned().unwrap_or(Value::Null),
        },
        "response.output_item.done" => ProviderEvent::OutputItemDone {
            item: raw.get("item").cloned().unwrap_or(Value::Null),
        },
        "response.output_text.delta" => ProviderEvent::OutputTextDelta {
            item_id: str_field(raw, "item_id"),
            delta: str_field(raw, "delta"),
        },
        "response.output_text.done" => ProviderEvent::OutputTextDone {
            item_id: str_field(raw, "item_id"),
            text: opt_str_field(raw, "text"),
        },
        "response.reasoning_summary_part.done" => ProviderEvent::ReasoningSummaryPartDone {
            item_id: str_field(raw, "item_id"),
            part: raw.get("part").cloned().unwrap_or(Value::Null),
        },
        "response.refusal.done" => ProviderEvent::RefusalDone {
            item_id: str_field(raw, "item_id"),
            refusal: str_field(raw, "refusal"),
        },
        "response.output_audio.delta" => ProviderEvent::OutputAudioDelta {
            item_id: str_field(raw, "item_id"),
            delta: str_field(raw, "delta"),
        },
        "response.output_audio.done" => ProviderEvent::OutputAudioDone {
            item_id: str_field(raw, "item_id"),
            format: opt_str_field(raw, "format"),
        },
        "response.output_audio_transcript.delta" => ProviderEvent::OutputAudioTranscriptDelta {
            item_id: str_field(raw, "item_id"),
            delta: str_field(raw, "delta"),
        },
        "response.output_audio_transcript.done" => ProviderEvent::OutputAudioTranscriptDone {
            item_id: str_field(raw, "item_id"),
            transcript: str_field(raw, "transcript"),
        },
        "conversation.item.input_audio_transcription.delta" => {
            ProviderEvent::InputAudioTranscriptionDelta {
                item_id: str_field(raw, "item_id"),
                delta: str_field(raw, "delta"),
            }
        }
        "conversation.item.input_audio_transcription.done" => {
            ProviderEvent::InputAudioTranscriptionDone {
                item_id: str_field(raw, "item_id"),
                transcript: str_field(raw, "transcript"),
            }
        }
        "response.image_generation_call.partial_image" => ProviderEvent::ImageGenerationPartialImage {
            item_id: str_field(raw, "item_id"),
            partial_b64: str_field(raw, "partial_image_b64"),
        },
        "response.image_generation_call.completed" => ProviderEvent::ImageGenerationCompleted {
            item_id: str_field(raw, "item_id"),
            payload: raw.clone(),
        },
        "response.function_call_arguments.done" => {
            ProviderEvent::FunctionCallArgumentsDone { payload: raw.clone() }
        }
        other => ProviderEvent::Other {
            event_type: other.to_string(),
            payload: raw.clone(),
        },
    }
}

/// Status this event type projects onto the run, per spec.md §4.2's table.
/// `None` means the event passes through without a status change.
pub fn projected_status(event: &ProviderEvent) -> Option<RunStatus> {
    match event {
        ProviderEvent::ResponseQueued => Some(RunStatus::Queued),
        ProviderEvent::ResponseCreated | ProviderEvent::ResponseInProgress => {
            Some(RunStatus::InProgress)
        }
        ProviderEvent::ResponseCompleted { .. } => Some(RunStatus::Completed),
        ProviderEvent::ResponseFailed { .. } => Some(RunStatus::Failed),
        ProviderEvent::ResponseCancelled { .. } => Some(RunStatus::Cancelled),
        ProviderEvent::ResponseIncomplete { .. } => Some(RunStatus::Incomplete),
        _ => None,
    }
}

pub fn is_terminal(event: &ProviderEvent) -> bool {
    matches!(
        event,
        ProviderEvent::ResponseCompleted { .. }
            | ProviderEvent::ResponseFailed { .. }
            | ProviderEvent::ResponseCancelled { .. }
            | ProviderEvent::ResponseIncomplete { .. }
    )
}

pub fn event_type_str(raw: &Value) -> String {
    raw.get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

/// Extracts the sequence number a raw event carries. Accepts `sequence_number`
/// first, falling back to `sequence`, per spec.md §4.2 ("prefer
/// `sequence_number` over alternate spellings"). Must be a positive integer.
pub fn extract_sequence(raw: &Value) -> Option<u64> {
    let candidate = raw
        .get("sequence_number")
        .or_else(|| raw.get("sequence"))?;
    let n = candidate.as_i64()?;
    if n <= 0 {
        return None;
    }
    Some(n as u64)
}
