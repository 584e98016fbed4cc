pub mod buffer;
pub mod event;
pub mod router;

pub use buffer::{AudioSegment, BufferedMessage, ImageSegment, StreamingBuffer, TranscriptSegment};
pub use event::ProviderEvent;
pub use router::EventRouter;
