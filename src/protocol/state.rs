//! Task state machine
//!
//! [`TaskSession`] owns the lifecycle of one synthesis task. The driver feeds
//! it [`TaskEvent`]s (socket, timer and write-completion events) one at a time
//! and performs the [`Action`]s it returns. The transition function is total:
//! every event has a defined effect in every state, and once the session is
//! `Completed` or `Failed` every further event is ignored.

use bytes::Bytes;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Deadline used when `now + budget` is not representable
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);
use tracing::{debug, warn};

use crate::core::{Result, TtsError};
use crate::protocol::types::AudioResult;

/// Lifecycle states, ordered; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskState {
    Connecting,
    AwaitingStart,
    Streaming,
    AwaitingCompletion,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::AwaitingStart => "awaiting_start",
            Self::Streaming => "streaming",
            Self::AwaitingCompletion => "awaiting_completion",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Control events decoded from a text frame, profile independent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Backend accepted the task ("task-started" / "SynthesisStarted")
    Started,
    /// Informational progress event, carries nothing the client needs
    ResultGenerated,
    /// Backend finished the task ("task-finished" / "SynthesisCompleted")
    Finished,
    /// Backend failed the task ("task-failed" / "TaskFailed")
    Failed {
        code: Option<String>,
        message: Option<String>,
    },
    /// Event name this client does not know
    Unknown(String),
}

/// Everything that can happen to a session
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// Connection established
    Opened,
    /// Parsed control message
    Control(ControlEvent),
    /// Binary audio frame
    Audio(Bytes),
    /// The finish-input message was written to the socket
    InputFinished,
    /// Transport-level failure (connect, read or write)
    TransportError(String),
    /// Close frame received from the peer
    Closed { code: Option<u16>, reason: String },
    /// Stream ended without a close frame
    Disconnected,
    /// Overall budget exhausted
    DeadlineElapsed,
}

/// Side effects requested by the state machine, performed in order
#[derive(Debug)]
pub enum Action {
    /// Send the start-task control message
    SendStart,
    /// Send the whole input text in one continue message
    SendText,
    /// Send the finish-input control message
    FinishInput,
    /// Settle the invocation
    Settle(Result<AudioResult>),
    /// Close the connection
    Close,
}

/// State of one in-flight synthesis task
#[derive(Debug)]
pub struct TaskSession {
    task_id: String,
    state: TaskState,
    chunks: Vec<Bytes>,
    deadline: Instant,
    budget: Duration,
}

impl TaskSession {
    /// Start a session whose deadline is `budget` from now
    pub fn new(task_id: impl Into<String>, budget: Duration) -> Self {
        let now = Instant::now();
        Self {
            task_id: task_id.into(),
            state: TaskState::Connecting,
            chunks: Vec::new(),
            deadline: now.checked_add(budget).unwrap_or(now + FAR_FUTURE),
            budget,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Number of audio frames buffered so far
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_settled(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply one event and return the actions the driver must perform
    pub fn handle(&mut self, event: TaskEvent) -> Vec<Action> {
        if self.state.is_terminal() {
            debug!(task_id = %self.task_id, state = %self.state, ?event, "Ignoring event after settlement");
            return Vec::new();
        }

        match event {
            TaskEvent::Opened => {
                if self.state == TaskState::Connecting {
                    self.advance(TaskState::AwaitingStart);
                    vec![Action::SendStart]
                } else {
                    Vec::new()
                }
            }
            TaskEvent::Control(ControlEvent::Started) => {
                if self.state == TaskState::AwaitingStart {
                    self.advance(TaskState::Streaming);
                    vec![Action::SendText, Action::FinishInput]
                } else {
                    debug!(task_id = %self.task_id, state = %self.state, "Duplicate started event");
                    Vec::new()
                }
            }
            TaskEvent::InputFinished => {
                if self.state == TaskState::Streaming {
                    self.advance(TaskState::AwaitingCompletion);
                }
                Vec::new()
            }
            TaskEvent::Audio(chunk) => {
                if self.state == TaskState::Connecting {
                    warn!(task_id = %self.task_id, "Audio frame before connection opened");
                } else {
                    self.chunks.push(chunk);
                }
                Vec::new()
            }
            TaskEvent::Control(ControlEvent::ResultGenerated) => Vec::new(),
            TaskEvent::Control(ControlEvent::Unknown(name)) => {
                debug!(task_id = %self.task_id, event = %name, "Ignoring unknown control event");
                Vec::new()
            }
            TaskEvent::Control(ControlEvent::Finished) => {
                if self.state == TaskState::Connecting {
                    return Vec::new();
                }
                let audio = AudioResult::from_chunks(std::mem::take(&mut self.chunks));
                self.advance(TaskState::Completed);
                vec![Action::Settle(Ok(audio)), Action::Close]
            }
            TaskEvent::Control(ControlEvent::Failed { code, message }) => {
                let message = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "synthesis task failed".to_string());
                self.fail(true, TtsError::backend(code, message))
            }
            TaskEvent::TransportError(message) => self.fail(true, TtsError::transport(message)),
            TaskEvent::Closed { code, reason } => {
                let message = match code {
                    Some(code) => format!(
                        "connection closed unexpectedly (code {}): {}",
                        code,
                        if reason.is_empty() { "no reason" } else { reason.as_str() }
                    ),
                    None => "connection closed unexpectedly (no close code)".to_string(),
                };
                self.fail(false, TtsError::transport(message))
            }
            TaskEvent::Disconnected => self.fail(
                false,
                TtsError::transport("connection closed unexpectedly without close frame"),
            ),
            TaskEvent::DeadlineElapsed => self.fail(true, TtsError::timeout(self.budget)),
        }
    }

    fn fail(&mut self, close: bool, error: TtsError) -> Vec<Action> {
        // No partial audio leaves a failed session.
        self.chunks.clear();
        self.advance(TaskState::Failed);
        let mut actions = vec![Action::Settle(Err(error))];
        if close {
            actions.push(Action::Close);
        }
        actions
    }

    fn advance(&mut self, next: TaskState) {
        debug_assert!(next > self.state, "backward transition {} -> {}", self.state, next);
        debug!(task_id = %self.task_id, from = %self.state, to = %next, "Task state transition");
        self.state = next;
    }
}
