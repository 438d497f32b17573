//! One request/response exchange at a time.
//!
//! The conversation owns the transcript and the turn guard. The HTTP call
//! itself lives in [`OutboundTurn`] so the front end can run it on a
//! spawned task and hand the [`TurnOutcome`] back when it finishes.

use std::time::Duration;

use crate::api::{ChatBackend, ChatRequest, ChatResponse};
use crate::preferences::TripPreferences;
use crate::state::{ChatMessage, Transcript};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const FAILURE_NOTICE: &str = "Sorry, there was an error. Please try again.";
pub const TIMEOUT_NOTICE: &str =
    "Sorry, the trip planner took too long to respond. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    AwaitingReply,
    Revealing,
}

/// Server-side conversation handle plus the local turn guard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub id: Option<String>,
    pub phase: TurnPhase,
}

impl Session {
    pub fn turn_in_progress(&self) -> bool {
        self.phase != TurnPhase::Idle
    }
}

/// How a dispatched turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Reply {
        text: String,
        session_id: Option<String>,
    },
    /// The server answered with an `error` field.
    ServerError(String),
    TimedOut,
    /// Transport failure, bad status or unreadable body.
    Failed,
}

/// A request that has been accepted but not yet sent.
#[derive(Debug, Clone)]
pub struct OutboundTurn {
    request: ChatRequest,
    timeout: Duration,
}

impl OutboundTurn {
    pub fn request(&self) -> &ChatRequest {
        &self.request
    }

    /// Send the request once. Timing out drops the in-flight call.
    pub async fn dispatch<B: ChatBackend>(self, backend: &B) -> TurnOutcome {
        match tokio::time::timeout(self.timeout, backend.chat(&self.request)).await {
            Ok(Ok(ChatResponse::Reply {
                response,
                session_id,
            })) => TurnOutcome::Reply {
                text: response,
                session_id,
            },
            Ok(Ok(ChatResponse::Error { error })) => {
                tracing::warn!(%error, "planner reported an error");
                TurnOutcome::ServerError(error)
            }
            Ok(Err(e)) => {
                tracing::error!("chat request failed: {}", e);
                TurnOutcome::Failed
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "chat request timed out");
                TurnOutcome::TimedOut
            }
        }
    }
}

/// Transcript, session id and turn guard for one chat.
#[derive(Debug, Clone)]
pub struct Conversation {
    session: Session,
    transcript: Transcript,
    request_timeout: Duration,
}

impl Conversation {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            session: Session::default(),
            transcript: Transcript::new(),
            request_timeout,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.id.as_deref()
    }

    pub fn phase(&self) -> TurnPhase {
        self.session.phase
    }

    pub fn turn_in_progress(&self) -> bool {
        self.session.turn_in_progress()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Accept a user question. Returns `None` for blank input or while a
    /// turn is already running; a dropped submission is not queued.
    pub fn submit(&mut self, user_text: &str, prefs: &TripPreferences) -> Option<OutboundTurn> {
        let text = user_text.trim();
        if text.is_empty() {
            return None;
        }
        if self.turn_in_progress() {
            tracing::debug!("submission ignored, turn in progress");
            return None;
        }

        self.transcript.push(ChatMessage::user(text));
        self.session.phase = TurnPhase::AwaitingReply;

        Some(OutboundTurn {
            request: ChatRequest {
                message: format!("{}{}", text, prefs.context_suffix()),
                session_id: self.session.id.clone(),
            },
            timeout: self.request_timeout,
        })
    }

    /// Turn an outcome into exactly one assistant message and move to
    /// `Revealing`. Outcomes that arrive after a reset are dropped.
    pub fn resolve(&mut self, outcome: TurnOutcome) -> Option<&ChatMessage> {
        if self.session.phase != TurnPhase::AwaitingReply {
            tracing::debug!("stale turn outcome discarded");
            return None;
        }

        let text = match outcome {
            TurnOutcome::Reply { text, session_id } => {
                if session_id.is_some() {
                    self.session.id = session_id;
                }
                text
            }
            TurnOutcome::ServerError(error) => error,
            TurnOutcome::TimedOut => TIMEOUT_NOTICE.to_string(),
            TurnOutcome::Failed => FAILURE_NOTICE.to_string(),
        };

        self.session.phase = TurnPhase::Revealing;
        Some(self.transcript.push(ChatMessage::assistant(text)))
    }

    /// Release the turn guard once the reveal has finished or been cancelled.
    pub fn complete_turn(&mut self) {
        self.session.phase = TurnPhase::Idle;
    }

    /// Append a system notice, e.g. after a currency change.
    pub fn notice(&mut self, text: impl Into<String>) -> &ChatMessage {
        self.transcript.push(ChatMessage::system(text))
    }

    /// Forget the server session and clear the chat.
    pub fn reset(&mut self) {
        self.session = Session::default();
        self.transcript.clear();
        tracing::info!("conversation reset");
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}
