//! Task protocol client
//!
//! Every call to [`TaskClient::synthesize`] opens its own connection and
//! spawns a session actor that owns the socket, the [`TaskSession`] state
//! machine and the [`Settlement`] cell. The actor races socket frames against
//! the session deadline in a single `select!` loop, so events for one task are
//! always handled one at a time. The caller only awaits the settlement.

use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep_until, timeout, timeout_at};
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::core::{Result, TtsError};
use crate::protocol::ids::new_task_id;
use crate::protocol::profile::ProtocolProfile;
use crate::protocol::settle::Settlement;
use crate::protocol::state::{Action, TaskEvent, TaskSession};
use crate::protocol::types::{AudioResult, SynthesisRequest};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on waiting for our close frame to be written. Closing always
/// happens after the task has settled.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Drives remote synthesis tasks for one backend profile
#[derive(Clone)]
pub struct TaskClient {
    profile: Arc<dyn ProtocolProfile>,
    timeout: Duration,
}

impl TaskClient {
    /// Create a client whose tasks must settle within `timeout`
    pub fn new(profile: Arc<dyn ProtocolProfile>, timeout: Duration) -> Self {
        Self { profile, timeout }
    }

    pub fn profile(&self) -> &dyn ProtocolProfile {
        self.profile.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one synthesis task to completion.
    ///
    /// Resolves exactly once: with the audio of every binary frame in arrival
    /// order, or with a transport, timeout or backend failure.
    pub async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioResult> {
        let task_id = new_task_id();
        let (settlement, rx) = Settlement::new();
        let span = info_span!("tts_task", task_id = %task_id, profile = %self.profile.kind());

        let actor = SessionActor {
            profile: Arc::clone(&self.profile),
            request: request.clone(),
            session: TaskSession::new(task_id, self.timeout),
            settlement,
            socket: None,
            outbound: None,
        };
        tokio::spawn(actor.run().instrument(span));

        rx.await
            .unwrap_or_else(|_| Err(TtsError::internal("synthesis task ended without settling")))
    }
}

/// Control messages are fully determined by the request, so they are encoded
/// before connecting.
struct Outbound {
    start: String,
    text: String,
    finish: String,
}

#[derive(Debug, Clone, Copy)]
enum Outgoing {
    Start,
    Text,
    Finish,
}

/// What one turn of the event loop produced
enum Inbound {
    Frame(Option<std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>),
    Deadline,
}

struct SessionActor {
    profile: Arc<dyn ProtocolProfile>,
    request: SynthesisRequest,
    session: TaskSession,
    settlement: Settlement<Result<AudioResult>>,
    socket: Option<WsStream>,
    outbound: Option<Outbound>,
}

impl SessionActor {
    async fn run(mut self) {
        let started = std::time::Instant::now();
        info!(
            chars = self.request.text().chars().count(),
            voice = self.request.voice(),
            format = %self.request.format(),
            "Starting synthesis task"
        );

        let handshake = match self.prepare() {
            Ok(handshake) => handshake,
            Err(e) => {
                warn!(error = %e, "Failed to prepare synthesis task");
                self.settlement.settle(Err(e));
                return;
            }
        };

        let deadline = sleep_until(self.session.deadline());
        tokio::pin!(deadline);

        let opened = tokio::select! {
            result = connect_async(handshake) => match result {
                Ok((socket, response)) => {
                    debug!(
                        endpoint = self.profile.endpoint(),
                        status = %response.status(),
                        "Connection established"
                    );
                    self.socket = Some(socket);
                    TaskEvent::Opened
                }
                Err(e) => TaskEvent::TransportError(format!("connect failed: {}", e)),
            },
            _ = &mut deadline => TaskEvent::DeadlineElapsed,
        };
        self.dispatch(opened).await;

        while !self.session.is_settled() {
            let inbound = {
                let Some(socket) = self.socket.as_mut() else {
                    break;
                };
                tokio::select! {
                    frame = socket.next() => Inbound::Frame(frame),
                    _ = &mut deadline => Inbound::Deadline,
                }
            };

            let event = match inbound {
                Inbound::Deadline => Some(TaskEvent::DeadlineElapsed),
                Inbound::Frame(frame) => self.translate(frame),
            };
            if let Some(event) = event {
                self.dispatch(event).await;
            }
        }

        debug!(
            state = %self.session.state(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Synthesis task finished"
        );
    }

    fn prepare(&mut self) -> Result<Request> {
        let task_id = self.session.task_id();
        self.outbound = Some(Outbound {
            start: self.profile.start_message(task_id, &self.request)?,
            text: self.profile.continue_message(task_id, self.request.text())?,
            finish: self.profile.finish_message(task_id)?,
        });
        self.profile.connect_request(self.request.credential())
    }

    /// Turn a socket frame into a state machine event; `None` means ignore
    fn translate(
        &self,
        frame: Option<std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>,
    ) -> Option<TaskEvent> {
        match frame {
            Some(Ok(Message::Text(text))) => match self.profile.parse_event(text.as_str()) {
                Ok(control) => {
                    if let Some(id) = control.task_id.as_deref() {
                        if !id.is_empty() && id != self.session.task_id() {
                            warn!(received = id, "Ignoring control message for another task");
                            return None;
                        }
                    }
                    debug!(event = ?control.event, "Control event");
                    Some(TaskEvent::Control(control.event))
                }
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed control message");
                    None
                }
            },
            Some(Ok(Message::Binary(data))) => Some(TaskEvent::Audio(data)),
            Some(Ok(Message::Close(frame))) => Some(match frame {
                Some(frame) => TaskEvent::Closed {
                    code: Some(u16::from(frame.code)),
                    reason: frame.reason.as_str().to_string(),
                },
                None => TaskEvent::Closed {
                    code: None,
                    reason: String::new(),
                },
            }),
            Some(Ok(_)) => None,
            Some(Err(e)) => Some(TaskEvent::TransportError(e.to_string())),
            None => Some(TaskEvent::Disconnected),
        }
    }

    /// Feed an event to the state machine and perform the resulting actions.
    /// Write outcomes become follow-up events.
    async fn dispatch(&mut self, event: TaskEvent) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            for action in self.session.handle(event) {
                match action {
                    Action::SendStart => {
                        if let Err(event) = self.send(Outgoing::Start).await {
                            pending.push_back(event);
                            break;
                        }
                    }
                    Action::SendText => {
                        if let Err(event) = self.send(Outgoing::Text).await {
                            pending.push_back(event);
                            break;
                        }
                    }
                    Action::FinishInput => match self.send(Outgoing::Finish).await {
                        Ok(()) => pending.push_back(TaskEvent::InputFinished),
                        Err(event) => {
                            pending.push_back(event);
                            break;
                        }
                    },
                    Action::Settle(outcome) => self.settle(outcome),
                    Action::Close => self.close().await,
                }
            }
        }
    }

    /// Write one control message, bounded by the session deadline.
    /// A failed write is returned as the event it causes.
    async fn send(&mut self, which: Outgoing) -> std::result::Result<(), TaskEvent> {
        let deadline = self.session.deadline();
        let (Some(socket), Some(outbound)) = (self.socket.as_mut(), self.outbound.as_ref()) else {
            return Err(TaskEvent::TransportError("connection is not open".to_string()));
        };
        let text = match which {
            Outgoing::Start => outbound.start.clone(),
            Outgoing::Text => outbound.text.clone(),
            Outgoing::Finish => outbound.finish.clone(),
        };
        match timeout_at(deadline, socket.send(Message::text(text))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TaskEvent::TransportError(format!("send failed: {}", e))),
            Err(_) => {
                debug!(message = ?which, "Write did not finish before the deadline");
                Err(TaskEvent::DeadlineElapsed)
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            match timeout(CLOSE_GRACE, socket.close(None)).await {
                Ok(Ok(())) => debug!("Connection closed"),
                Ok(Err(e)) => debug!(error = %e, "Close handshake failed"),
                Err(_) => debug!("Close handshake timed out"),
            }
        }
    }

    fn settle(&mut self, outcome: Result<AudioResult>) {
        match &outcome {
            Ok(audio) => info!(
                bytes = audio.len(),
                chunks = audio.chunk_count(),
                "Synthesis task completed"
            ),
            Err(e) => warn!(kind = %e.kind(), error = %e, "Synthesis task failed"),
        }
        if !self.settlement.settle(outcome) {
            warn!("Suppressed duplicate settlement");
        }
    }
}
