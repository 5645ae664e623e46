//! Splitting raw response bodies into frames

use std::io;
use std::pin::Pin;

use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::{Stream, StreamExt, TryStreamExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::error::LlmError;
use crate::provider::ByteStream;

/// Longest accepted line in a newline-delimited body
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// How a vendor delimits frames in a streamed body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `text/event-stream`, one JSON object per `data:` event
    ServerSentEvents,
    /// One JSON object per line
    JsonLines,
}

/// One discrete unit of a streaming wire protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// SSE event name, absent for unnamed events and JSON lines
    pub event: Option<String>,
    /// Frame payload
    pub data: String,
}

impl Frame {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
        }
    }

    /// Keep-alive frames carry no payload
    pub fn is_blank(&self) -> bool {
        self.data.trim().is_empty()
    }
}

/// Frames read from one response body
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, LlmError>> + Send>>;

/// Split a body into frames according to the vendor's framing rule
///
/// Reading is lazy: bytes are only pulled from the network when the next
/// frame is requested.
pub fn frames(body: ByteStream, framing: Framing) -> FrameStream {
    match framing {
        Framing::ServerSentEvents => sse_frames(body),
        Framing::JsonLines => json_line_frames(body),
    }
}

fn sse_frames(body: ByteStream) -> FrameStream {
    let events = body.eventsource().map(|result| match result {
        Ok(event) => {
            let name = (!event.event.is_empty() && event.event != "message").then_some(event.event);
            Ok(Frame {
                event: name,
                data: event.data,
            })
        }
        Err(EventStreamError::Transport(e)) => Err(e),
        Err(e) => Err(LlmError::Communication(format!("invalid event stream: {e}"))),
    });

    Box::pin(events)
}

fn json_line_frames(body: ByteStream) -> FrameStream {
    let reader = StreamReader::new(body.map_err(io::Error::other));
    let lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    Box::pin(lines.map(|result| result.map(Frame::data).map_err(line_error)))
}

/// Recover the transport error a line read failed on, if there is one
fn line_error(error: LinesCodecError) -> LlmError {
    match error {
        LinesCodecError::MaxLineLengthExceeded => {
            LlmError::Communication(format!("stream line exceeds {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(e) => match e.into_inner().map(|inner| inner.downcast::<LlmError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => LlmError::Communication(other.to_string()),
            None => LlmError::Communication("stream read failed".to_owned()),
        },
    }
}
