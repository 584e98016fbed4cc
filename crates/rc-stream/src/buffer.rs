use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::event::ProviderEvent;

#[derive(Debug, Clone)]
pub struct BufferedMessage {
    pub item_id: String,
    pub text: String,
    /// Set once `response.output_text.done` supplies an authoritative
    /// value; further deltas are ignored once finalized.
    finalized: bool,
}

#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub item_id: String,
    pub audio_base64: String,
    pub format: Option<String>,
    pub transcript: Option<String>,
    transcript_finalized: bool,
}

#[derive(Debug, Clone)]
pub struct TranscriptSegment {
    pub item_id: String,
    pub transcript: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImageSegment {
    pub item_id: String,
    pub preview_b64: Option<String>,
    pub final_b64: Option<String>,
    pub image_url: Option<String>,
    pub background: Option<Value>,
    pub size: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ImageSegment {
    /// The image data a caller should show: the final frame if the provider
    /// supplied one, else the most recent partial preview.
    pub fn best_b64(&self) -> Option<&str> {
        self.final_b64.as_deref().or(self.preview_b64.as_deref())
    }
}

/// First-seen insertion order, keyed by `item_id`. A plain `Vec` scan is
/// fine at the sizes a single run's buffer ever holds.
struct OrderedById<T> {
    entries: Vec<(String, T)>,
}

impl<T> OrderedById<T> {
    fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.entries.iter_mut().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == id)
    }

    fn insert(&mut self, id: String, value: T) {
        self.entries.push((id, value));
    }

    fn get_or_insert_with(&mut self, id: &str, f: impl FnOnce() -> T) -> &mut T {
        if !self.contains(id) {
            self.insert(id.to_string(), f());
        }
        self.get_mut(id).expect("just inserted")
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }
}

/// Per-run, purely in-memory. Stitches the provider's multi-modal deltas
/// into whole messages/segments, per spec.md §4.3. Owned by the
/// Coordinator; mutation happens only on the event path the coordinator
/// already serializes per run.
pub struct StreamingBuffer {
    messages: OrderedById<BufferedMessage>,
    reasoning: Vec<String>,
    refusals: Vec<String>,
    output_audio: OrderedById<AudioSegment>,
    input_transcripts: OrderedById<TranscriptSegment>,
    images: OrderedById<ImageSegment>,
}

impl StreamingBuffer {
    pub fn new() -> Self {
        Self {
            messages: OrderedById::new(),
            reasoning: Vec::new(),
            refusals: Vec::new(),
            output_audio: OrderedById::new(),
            input_transcripts: OrderedById::new(),
            images: OrderedById::new(),
        }
    }

    /// Feeds one parsed event into the buffer. Never fails: unknown/odd
    /// shapes are silently ignored per spec.md §4.3.
    pub fn apply(&mut self, event: &ProviderEvent) {
        match event {
            ProviderEvent::OutputItemAdded { item } => self.on_output_item_added(item),
            ProviderEvent::OutputTextDelta { item_id, delta } => {
                let msg = self
                    .messages
                    .get_or_insert_with(item_id, || BufferedMessage {
                        item_id: item_id.clone(),
                        text: String::new(),
                        finalized: false,
                    });
                if !msg.finalized {
                    msg.text.push_str(delta);
                }
            }
            ProviderEvent::OutputTextDone { item_id, text } => {
                let msg = self
                    .messages
                    .get_or_insert_with(item_id, || BufferedMessage {
                        item_id: item_id.clone(),
                        text: String::new(),
                        finalized: false,
                    });
                if let Some(text) = text {
                    msg.text = text.clone();
                }
                msg.finalized = true;
            }
            ProviderEvent::ReasoningSummaryPartDone { part, .. } => {
                if part.get("type").and_then(Value::as_str) == Some("summary_text") {
                    if let Some(text) = part.get("text").and_then(Value::as_str) {
                        self.reasoning.push(text.to_string());
                    }
                }
            }
            ProviderEvent::RefusalDone { refusal, .. } => {
                self.refusals.push(refusal.clone());
            }
            ProviderEvent::OutputAudioDelta { item_id, delta } => {
                let seg = self.output_audio.get_or_insert_with(item_id, || AudioSegment {
                    item_id: item_id.clone(),
                    audio_base64: String::new(),
                    format: None,
                    transcript: None,
                    transcript_finalized: false,
                });
                seg.audio_base64.push_str(delta);
            }
            ProviderEvent::OutputAudioDone { item_id, format } => {
                let seg = self.output_audio.get_or_insert_with(item_id, || AudioSegment {
                    item_id: item_id.clone(),
                    audio_base64: String::new(),
                    format: None,
                    transcript: None,
                    transcript_finalized: false,
                });
                if format.is_some() {
                    seg.format = format.clone();
                }
            }
            ProviderEvent::OutputAudioTranscriptDelta { item_id, delta } => {
                let seg = self.output_audio.get_or_insert_with(item_id, || AudioSegment {
                    item_id: item_id.clone(),
                    audio_base64: String::new(),
                    format: None,
                    transcript: None,
                    transcript_finalized: false,
                });
                if !seg.transcript_finalized {
                    let mut current = seg.transcript.clone().unwrap_or_default();
                    current.push_str(delta);
                    seg.transcript = Some(current);
                }
            }
            ProviderEvent::OutputAudioTranscriptDone { item_id, transcript } => {
                let seg = self.output_audio.get_or_insert_with(item_id, || AudioSegment {
                    item_id: item_id.clone(),
                    audio_base64: String::new(),
                    format: None,
                    transcript: None,
                    transcript_finalized: false,
                });
                seg.transcript = Some(transcript.clone());
                seg.transcript_finalized = true;
            }
            ProviderEvent::InputAudioTranscriptionDelta { item_id, delta } => {
                let seg = self
                    .input_transcripts
                    .get_or_insert_with(item_id, || TranscriptSegment {
                        item_id: item_id.clone(),
                        transcript: String::new(),
                    });
                seg.transcript.push_str(delta);
            }
            ProviderEvent::InputAudioTranscriptionDone { item_id, transcript } => {
                let seg = self
                    .input_transcripts
                    .get_or_insert_with(item_id, || TranscriptSegment {
                        item_id: item_id.clone(),
                        transcript: String::new(),
                    });
                seg.transcript = transcript.clone();
            }
            ProviderEvent::ImageGenerationPartialImage { item_id, partial_b64 } => {
                let seg = self.images.get_or_insert_with(item_id, || ImageSegment {
                    item_id: item_id.clone(),
                    ..Default::default()
                });
                seg.preview_b64 = Some(partial_b64.clone());
            }
            ProviderEvent::ImageGenerationCompleted { item_id, payload } => {
                let seg = self.images.get_or_insert_with(item_id, || ImageSegment {
                    item_id: item_id.clone(),
                    ..Default::default()
                });
                if let Some(b64) = payload.get("b64_json").and_then(Value::as_str) {
                    seg.final_b64 = Some(b64.to_string());
                }
                if let Some(url) = payload.get("image_url").and_then(Value::as_str) {
                    seg.image_url = Some(url.to_string());
                }
                if let Some(background) = payload.get("background") {
                    seg.background = Some(background.clone());
                }
                if let Some(size) = payload.get("size").and_then(Value::as_str) {
                    seg.size = Some(size.to_string());
                }
                if let Some(created) = payload.get("created_at").and_then(Value::as_i64) {
                    seg.created_at = Utc.timestamp_opt(created, 0).single();
                }
            }
            _ => {}
        }
    }

    fn on_output_item_added(&mut self, item: &Value) {
        let is_assistant_message = item.get("type").and_then(Value::as_str) == Some("message")
            && item.get("role").and_then(Value::as_str) == Some("assistant");
        if !is_assistant_message {
            return;
        }
        let Some(item_id) = item.get("id").and_then(Value::as_str) else {
            return;
        };
        if !self.messages.contains(item_id) {
            self.messages.insert(
                item_id.to_string(),
                BufferedMessage {
                    item_id: item_id.to_string(),
                    text: String::new(),
                    finalized: false,
                },
            );
        }
    }

    pub fn messages(&self) -> Vec<BufferedMessage> {
        self.messages.values().cloned().collect()
    }

    pub fn reasoning(&self) -> Vec<String> {
        self.reasoning.clone()
    }

    pub fn refusals(&self) -> Vec<String> {
        self.refusals.clone()
    }

    pub fn output_audio(&self) -> Vec<AudioSegment> {
        self.output_audio.values().cloned().collect()
    }

    pub fn input_transcripts(&self) -> Vec<TranscriptSegment> {
        self.input_transcripts
            .values()
            .filter(|t| !t.transcript.is_empty())
            .cloned()
            .collect()
    }

    pub fn images(&self) -> Vec<ImageSegment> {
        self.images.values().cloned().collect()
    }

    /// Rebuilds buffer state from a persisted `ProviderResult`, walking
    /// `result.output[]` and injecting the same synthetic events a live
    /// stream would have produced, so getters agree with the originally
    /// streamed run. Used by `ResyncFromArchive`.
    pub fn seed_from_result(&mut self, output: &[Value]) {
        for item in output {
            let item_type = item.get("type").and_then(Value::as_str).unwrap_or("");
            match item_type {
                "message" => {
                    self.apply(&ProviderEvent::OutputItemAdded { item: item.clone() });
                    let Some(item_id) = item.get("id").and_then(Value::as_str) else {
                        continue;
                    };
                    let text = item
                        .get("content")
                        .and_then(Value::as_array)
                        .map(|parts| {
                            parts
                                .iter()
                                .filter(|p| p.get("type").and_then(Value::as_str) == Some("output_text"))
                                .filter_map(|p| p.get("text").and_then(Value::as_str))
                                .collect::<Vec<_>>()
                                .join("")
                        })
                        .unwrap_or_default();
                    self.apply(&ProviderEvent::OutputTextDone {
                        item_id: item_id.to_string(),
                        text: Some(text),
                    });
                }
                "reasoning" => {
                    if let Some(summary) = item.get("summary").and_then(Value::as_array) {
                        for part in summary {
                            self.apply(&ProviderEvent::ReasoningSummaryPartDone {
                                item_id: item.get("id").and_then(Value::as_str).unwrap_or("").to_string(),
                                part: part.clone(),
                            });
                        }
                    }
                }
                "audio" => {
                    let Some(item_id) = item.get("id").and_then(Value::as_str) else {
                        continue;
                    };
                    if let Some(data) = item.get("data").and_then(Value::as_str) {
                        self.apply(&ProviderEvent::OutputAudioDelta {
                            item_id: item_id.to_string(),
                            delta: data.to_string(),
                        });
                    }
                    self.apply(&ProviderEvent::OutputAudioDone {
                        item_id: item_id.to_string(),
                        format: item.get("format").and_then(Value::as_str).map(str::to_string),
                    });
                    if let Some(transcript) = item.get("transcript").and_then(Value::as_str) {
                        self.apply(&ProviderEvent::OutputAudioTranscriptDone {
                            item_id: item_id.to_string(),
                            transcript: transcript.to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
    }
}

impl Default for StreamingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stitches_audio_and_transcript() {
        let mut buffer = StreamingBuffer::new();
        buffer.apply(&ProviderEvent::OutputItemAdded {
            item: serde_json::json!({"type": "message", "role": "assistant", "id": "msg"}),
        });
        buffer.apply(&ProviderEvent::OutputAudioDelta {
            item_id: "msg".to_string(),
            delta: "QUJD".to_string(),
        });
        buffer.apply(&ProviderEvent::OutputAudioDelta {
            item_id: "msg".to_string(),
            delta: "RUY=".to_string(),
        });
        buffer.apply(&ProviderEvent::OutputAudioTranscriptDone {
            item_id: "msg".to_string(),
            transcript: "hello world".to_string(),
        });
        buffer.apply(&ProviderEvent::OutputAudioDone {
            item_id: "msg".to_string(),
            format: Some("mp3".to_string()),
        });

        let segments = buffer.output_audio();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].audio_base64, "QUJDREY=");
        assert_eq!(segments[0].format.as_deref(), Some("mp3"));
        assert_eq!(segments[0].transcript.as_deref(), Some("hello world"));
    }

    #[test]
    fn output_text_done_overrides_concatenation() {
        let mut buffer = StreamingBuffer::new();
        buffer.apply(&ProviderEvent::OutputTextDelta {
            item_id: "msg".to_string(),
            delta: "he".to_string(),
        });
        buffer.apply(&ProviderEvent::OutputTextDelta {
            item_id: "msg".to_string(),
            delta: "llo".to_string(),
        });
        buffer.apply(&ProviderEvent::OutputTextDone {
            item_id: "msg".to_string(),
            text: Some("hello".to_string()),
        });
        let messages = buffer.messages();
        assert_eq!(messages[0].text, "hello");
    }

    #[test]
    fn empty_input_transcripts_are_excluded() {
        let mut buffer = StreamingBuffer::new();
        buffer.apply(&ProviderEvent::InputAudioTranscriptionDone {
            item_id: "seg".to_string(),
            transcript: String::new(),
        });
        assert!(buffer.input_transcripts().is_empty());
    }
}
