//! Frame-to-chunk state machine
//!
//! The translator is pull-driven: a frame is only read from the network
//! when the consumer asks for the next chunk. It moves through
//! `AwaitingFrame -> HaveFrame -> Emitting` until the body ends, a
//! sentinel arrives, or something fails, and then stays `Terminal`.
//!
//! A chunk that finishes a choice is held back for exactly one frame so a
//! trailing usage-only frame can be folded into it. Usage never appears on
//! intermediate chunks.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{ChoiceDelta, ChunkStream, Frame, FrameEvent, FrameParser, FrameStream, FrameUpdate};
use crate::error::LlmError;
use crate::types::{ChatCompletionChunk, ChunkChoice, Delta, Role, Usage, unix_now};

/// Per-stream settings
#[derive(Debug, Clone)]
pub struct TranslatorOptions {
    /// Model alias stamped on every chunk
    pub model: String,
    /// Longest allowed wait for the next frame
    pub idle_timeout: Option<Duration>,
    /// End of the call's operation budget, bounding the whole stream
    pub deadline: Option<Instant>,
    /// Caller's cancellation signal
    pub cancel: CancellationToken,
}

enum State {
    AwaitingFrame,
    HaveFrame(Frame),
    Emitting { finished: bool },
    Terminal,
}

/// Turns one vendor frame stream into canonical chunks
pub struct StreamTranslator {
    frames: Option<FrameStream>,
    parser: Box<dyn FrameParser>,
    options: TranslatorOptions,
    state: State,
    id: Option<String>,
    created: u64,
    /// Finishing chunk waiting for a possible usage-only frame
    held: Option<ChatCompletionChunk>,
    ready: VecDeque<Result<ChatCompletionChunk, LlmError>>,
    usage: Option<Usage>,
    started: HashSet<u32>,
    emitted: u64,
}

impl StreamTranslator {
    pub fn new(frames: FrameStream, parser: Box<dyn FrameParser>, options: TranslatorOptions) -> Self {
        Self {
            frames: Some(frames),
            parser,
            options,
            state: State::AwaitingFrame,
            id: None,
            created: unix_now(),
            held: None,
            ready: VecDeque::with_capacity(2),
            usage: None,
            started: HashSet::new(),
            emitted: 0,
        }
    }

    /// Lazy chunk sequence driven by this translator
    pub fn into_stream(self) -> ChunkStream {
        Box::pin(futures_util::stream::unfold(self, |mut translator| async move {
            translator.next_chunk().await.map(|item| (item, translator))
        }))
    }

    /// Produce the next item, or `None` once the sequence is over
    pub async fn next_chunk(&mut self) -> Option<Result<ChatCompletionChunk, LlmError>> {
        loop {
            match std::mem::replace(&mut self.state, State::Terminal) {
                State::Terminal => {
                    self.frames = None;
                    return None;
                }
                State::Emitting { finished } => {
                    if let Some(item) = self.ready.pop_front() {
                        self.state = State::Emitting { finished };
                        if item.is_ok() {
                            self.emitted += 1;
                        }
                        return Some(item);
                    }

                    self.state = if finished {
                        tracing::debug!(model = %self.options.model, chunks = self.emitted, "stream finished");
                        State::Terminal
                    } else {
                        State::AwaitingFrame
                    };
                }
                State::AwaitingFrame => match self.read_frame().await {
                    Ok(Some(frame)) => self.state = State::HaveFrame(frame),
                    Ok(None) => self.finish(None),
                    Err(e) => self.finish(Some(e)),
                },
                State::HaveFrame(frame) => {
                    if frame.is_blank() {
                        self.state = State::AwaitingFrame;
                        continue;
                    }

                    match self.parser.parse(&frame) {
                        Ok(FrameEvent::Skip) => self.state = State::AwaitingFrame,
                        Ok(FrameEvent::Done) => self.finish(None),
                        Ok(FrameEvent::Update(update)) => {
                            self.apply(update);
                            self.state = State::Emitting { finished: false };
                        }
                        Err(e) => self.finish(Some(e)),
                    }
                }
            }
        }
    }

    async fn read_frame(&mut self) -> Result<Option<Frame>, LlmError> {
        let Some(frames) = self.frames.as_mut() else {
            return Ok(None);
        };

        let cancel = self.options.cancel.clone();
        let idle_timeout = self.options.idle_timeout;
        let deadline = self.options.deadline;

        let idle = async move {
            match idle_timeout {
                Some(limit) => tokio::time::timeout(limit, frames.next())
                    .await
                    .map_err(|_| LlmError::Timeout(format!("no stream frame received within {limit:?}"))),
                None => Ok(frames.next().await),
            }
        };

        let next = async move {
            match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, idle)
                    .await
                    .unwrap_or_else(|_| Err(LlmError::Timeout("stream exceeded its operation budget".to_owned()))),
                None => idle.await,
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(LlmError::Cancelled),
            next = next => next?.transpose(),
        }
    }

    fn apply(&mut self, update: FrameUpdate) {
        let FrameUpdate { id, choices, usage } = update;

        if self.id.is_none() {
            self.id = Some(id.unwrap_or_else(|| format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())));
        }

        let has_usage = usage.is_some();
        if has_usage {
            self.usage = usage;
        }

        let choices: Vec<ChunkChoice> = choices
            .into_iter()
            .filter(ChoiceDelta::is_meaningful)
            .map(|delta| self.chunk_choice(delta))
            .collect();

        if choices.is_empty() {
            if has_usage && let Some(chunk) = self.release_held(true) {
                self.ready.push_back(Ok(chunk));
            }
            return;
        }

        let chunk = self.chunk(choices);

        if let Some(previous) = self.release_held(false) {
            self.ready.push_back(Ok(previous));
        }

        if chunk.is_finishing() {
            self.held = Some(chunk);
        } else {
            self.ready.push_back(Ok(chunk));
        }
    }

    /// Enter the terminal path, flushing anything held
    fn finish(&mut self, error: Option<LlmError>) {
        let clean = error.is_none();

        if let Some(chunk) = self.release_held(clean) {
            self.ready.push_back(Ok(chunk));
        } else if clean && let Some(usage) = self.usage.take() {
            let mut chunk = self.chunk(Vec::new());
            chunk.usage = Some(usage);
            self.ready.push_back(Ok(chunk));
        }

        if let Some(error) = error {
            tracing::warn!(model = %self.options.model, error = %error, "stream terminated with error");
            self.ready.push_back(Err(error));
        }

        self.frames = None;
        self.state = State::Emitting { finished: true };
    }

    fn release_held(&mut self, attach_usage: bool) -> Option<ChatCompletionChunk> {
        let mut chunk = self.held.take()?;
        if attach_usage {
            chunk.usage = self.usage.take();
        }
        Some(chunk)
    }

    fn chunk_choice(&mut self, delta: ChoiceDelta) -> ChunkChoice {
        let first = self.started.insert(delta.index);
        let role = delta.role.or_else(|| first.then_some(Role::Assistant));

        ChunkChoice {
            index: delta.index,
            delta: Delta {
                role,
                content: delta.content.filter(|c| !c.is_empty()),
            },
            finish_reason: delta.finish_reason,
        }
    }

    fn chunk(&self, choices: Vec<ChunkChoice>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone().unwrap_or_default(),
            object: ChatCompletionChunk::OBJECT.to_owned(),
            created: self.created,
            model: self.options.model.clone(),
            choices,
            usage: None,
        }
    }
}
