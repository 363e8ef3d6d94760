//! Room session state machine.
//!
//! A session is a client-local, ephemeral view of one room: the decrypted
//! message log, the advisory participant set, and a phase. It is rebuilt
//! from scratch on every join by fetching and unsealing the full backlog.
//!
//! # Ordering
//!
//! The backlog fetch and the live subscription are separate asynchronous
//! operations with no serialization from the backend. The session
//! reconciles them: inserts observed while the history is loading are
//! buffered, then merged after the backlog lands, with record-id dedup so
//! a row present in both never appears twice.
//!
//! # Termination
//!
//! Any delete event on the subscription is a nuke: the session discards
//! all local message state and terminates. Rejoining requires re-entering
//! the code. The nuking participant terminates the same way, through its
//! own subscription.

use std::collections::{BTreeSet, HashSet};

use ember_core::{
    ChangeEvent, CodeError, NewRecord, PresenceEvent, RecordId, RoomCode, RoomEvent, SecretRecord,
    StoreError, TimestampMs, env::Environment,
};
use ember_crypto::{ContentKey, NONCE_SIZE, derive_room_key, seal, unseal};

use crate::envelope::{ChatEnvelope, EnvelopeKind};

/// Session phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the history fetch to land; live inserts are buffered.
    Joining,

    /// History reconstructed; live updates apply directly.
    Active,

    /// Terminal. The session never leaves this phase.
    Terminated {
        /// Why the session ended.
        reason: Termination,
    },
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Join rejected: no surviving records for the code.
    AccessDenied,

    /// A delete event arrived; the room is gone.
    Nuked,

    /// The user left.
    Left,

    /// The backend could not be reached during join.
    Unavailable,

    /// The realtime stream closed; a fresh join is required.
    Disconnected,
}

/// What a reconstructed message displays as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Ordinary text.
    Text(String),

    /// The room-opened marker.
    RoomOpened,

    /// Placeholder for a record whose plaintext could not be recovered.
    ///
    /// Shown instead of dropping the record silently or crashing.
    Unreadable,
}

/// One entry in the session's ordered message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Backing record id.
    pub id: RecordId,
    /// Sender alias, if the envelope was readable.
    pub alias: Option<String>,
    /// Displayable body.
    pub body: MessageBody,
    /// Backend-assigned creation time.
    pub sent_at: TimestampMs,
}

/// Events fed into [`RoomSession`].
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The history fetch issued at join returned.
    HistoryLoaded {
        /// All records for the code, `created_at` ascending.
        records: Vec<SecretRecord>,
    },

    /// The history fetch issued at join failed.
    HistoryFailed {
        /// Failure reported by the store.
        error: StoreError,
    },

    /// An event arrived on the room subscription.
    Room(RoomEvent),

    /// The user wants to send a message.
    SendRequested {
        /// Message text. Blank submissions are ignored.
        text: String,
    },

    /// The user wants to nuke the room.
    NukeRequested,

    /// The user is leaving the room.
    LeaveRequested,

    /// The subscription stream closed without a nuke.
    SubscriptionClosed,
}

/// Actions produced by [`RoomSession`] for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open the room subscription (before fetching history, so no event
    /// falls in the gap) tracking this alias on presence.
    Subscribe {
        /// Room to subscribe to.
        code: RoomCode,
        /// Alias to track.
        alias: String,
    },

    /// Fetch the room backlog; feed the outcome back as an event.
    FetchHistory {
        /// Room to fetch.
        code: RoomCode,
    },

    /// Insert this payload; its echo arrives via the subscription.
    Insert(NewRecord),

    /// Delete every record for the room.
    DeleteRoom {
        /// Room to nuke.
        code: RoomCode,
    },

    /// Tear down the subscription; no further events may be delivered.
    Unsubscribe,

    /// Log message for debugging.
    Log {
        /// Log message.
        message: String,
    },
}

/// Room session state machine.
pub struct RoomSession<E: Environment> {
    env: E,
    alias: String,
    code: RoomCode,
    key: ContentKey,
    phase: SessionPhase,
    messages: Vec<ChatMessage>,
    participants: BTreeSet<String>,
    seen: HashSet<RecordId>,
    buffered: Vec<SecretRecord>,
    expires_at: Option<TimestampMs>,
}

impl<E: Environment> RoomSession<E> {
    /// Start joining a room.
    ///
    /// Validates the code shape, derives the room key, and returns the
    /// machine in `Joining` phase together with its startup actions.
    /// Joining never creates a record.
    ///
    /// # Errors
    ///
    /// [`CodeError`] if the code text is malformed; surfaced to the user
    /// as access denied without any backend call.
    pub fn join(
        env: E,
        alias: impl Into<String>,
        code_text: &str,
    ) -> Result<(Self, Vec<SessionAction>), CodeError> {
        let code = RoomCode::parse(code_text)?;
        let key = derive_room_key(code.as_str());
        let alias = alias.into();

        let actions = vec![
            SessionAction::Subscribe { code: code.clone(), alias: alias.clone() },
            SessionAction::FetchHistory { code: code.clone() },
        ];

        let session = Self {
            env,
            alias,
            code,
            key,
            phase: SessionPhase::Joining,
            messages: Vec::new(),
            participants: BTreeSet::new(),
            seen: HashSet::new(),
            buffered: Vec::new(),
            expires_at: None,
        };

        Ok((session, actions))
    }

    /// Current phase.
    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    /// Ordered, decrypted message log.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Advisory set of present aliases.
    pub fn participants(&self) -> &BTreeSet<String> {
        &self.participants
    }

    /// The room's code.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// This participant's alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The room's expiry, learned from its records.
    pub fn expires_at(&self) -> Option<TimestampMs> {
        self.expires_at
    }

    /// Process an event and return resulting actions.
    ///
    /// Events that do not fit the current phase (stale responses, user
    /// intents after termination) are ignored.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        match event {
            SessionEvent::HistoryLoaded { records } => self.handle_history_loaded(records),
            SessionEvent::HistoryFailed { error } => self.handle_history_failed(&error),
            SessionEvent::Room(room_event) => self.handle_room_event(room_event),
            SessionEvent::SendRequested { text } => self.handle_send(&text),
            SessionEvent::NukeRequested => self.handle_nuke(),
            SessionEvent::LeaveRequested => self.handle_leave(),
            SessionEvent::SubscriptionClosed => self.handle_stream_closed(),
        }
    }

    fn handle_history_loaded(&mut self, records: Vec<SecretRecord>) -> Vec<SessionAction> {
        if !matches!(self.phase, SessionPhase::Joining) {
            return vec![];
        }

        let now = self.env.unix_time_ms();
        let live: Vec<SecretRecord> =
            records.into_iter().filter(|record| !record.is_expired(now)).collect();

        if live.is_empty() {
            // Unknown code, nuked room, or everything lapsed: all the same
            // denial, none creates a record.
            self.phase = SessionPhase::Terminated { reason: Termination::AccessDenied };
            return vec![
                SessionAction::Unsubscribe,
                SessionAction::Log { message: "join denied: no surviving records".to_owned() },
            ];
        }

        self.expires_at = live.first().and_then(|record| record.expires_at);

        for record in live {
            self.ingest(record);
        }

        // Merge inserts that raced the backlog fetch; ingest dedupes by id.
        let buffered = std::mem::take(&mut self.buffered);
        for record in buffered {
            if !record.is_expired(now) {
                self.ingest(record);
            }
        }
        self.messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));

        let message = format!("joined with {} messages", self.messages.len());
        self.phase = SessionPhase::Active;
        vec![SessionAction::Log { message }]
    }

    fn handle_history_failed(&mut self, error: &StoreError) -> Vec<SessionAction> {
        if !matches!(self.phase, SessionPhase::Joining) {
            return vec![];
        }

        self.phase = SessionPhase::Terminated { reason: Termination::Unavailable };
        vec![
            SessionAction::Unsubscribe,
            SessionAction::Log { message: format!("join failed: {error}") },
        ]
    }

    fn handle_room_event(&mut self, event: RoomEvent) -> Vec<SessionAction> {
        match event {
            RoomEvent::Change(ChangeEvent::Inserted(record)) => {
                if matches!(self.phase, SessionPhase::Joining) {
                    self.buffered.push(record);
                } else if matches!(self.phase, SessionPhase::Active)
                    && !record.is_expired(self.env.unix_time_ms())
                {
                    self.ingest(record);
                }
                vec![]
            },
            RoomEvent::Change(ChangeEvent::Deleted { id }) => self.handle_deleted(&id),
            RoomEvent::Presence(PresenceEvent::Sync { participants }) => {
                if !matches!(self.phase, SessionPhase::Terminated { .. }) {
                    self.participants = participants;
                }
                vec![]
            },
        }
    }

    /// Any observed delete is a nuke: discard everything and terminate.
    fn handle_deleted(&mut self, id: &RecordId) -> Vec<SessionAction> {
        if matches!(self.phase, SessionPhase::Terminated { .. }) {
            return vec![];
        }

        self.messages.clear();
        self.buffered.clear();
        self.seen.clear();
        self.participants.clear();
        self.phase = SessionPhase::Terminated { reason: Termination::Nuked };

        vec![
            SessionAction::Unsubscribe,
            SessionAction::Log { message: format!("room nuked (delete of {id} observed)") },
        ]
    }

    fn handle_send(&mut self, text: &str) -> Vec<SessionAction> {
        if !matches!(self.phase, SessionPhase::Active) || text.trim().is_empty() {
            return vec![];
        }

        let mut nonce = [0u8; NONCE_SIZE];
        self.env.random_bytes(&mut nonce);
        let blob = seal(&ChatEnvelope::text(&self.alias, text).encode(), &self.key, nonce);

        // Not appended locally: the message lands in the log through the
        // subscription echo, keeping ordering backend-assigned.
        vec![SessionAction::Insert(NewRecord::room_message(
            blob,
            self.code.clone(),
            self.expires_at,
        ))]
    }

    fn handle_nuke(&mut self) -> Vec<SessionAction> {
        if !matches!(self.phase, SessionPhase::Active) {
            return vec![];
        }

        // Termination follows through our own subscription's delete event,
        // the same path every other participant takes.
        vec![SessionAction::DeleteRoom { code: self.code.clone() }]
    }

    fn handle_leave(&mut self) -> Vec<SessionAction> {
        if matches!(self.phase, SessionPhase::Terminated { .. }) {
            return vec![];
        }

        self.phase = SessionPhase::Terminated { reason: Termination::Left };
        vec![SessionAction::Unsubscribe]
    }

    fn handle_stream_closed(&mut self) -> Vec<SessionAction> {
        if matches!(self.phase, SessionPhase::Terminated { .. }) {
            return vec![];
        }

        self.phase = SessionPhase::Terminated { reason: Termination::Disconnected };
        vec![SessionAction::Log { message: "realtime stream closed; session ended".to_owned() }]
    }

    /// Decode and append a record, once.
    fn ingest(&mut self, record: SecretRecord) {
        if self.seen.contains(&record.id) {
            return;
        }
        self.seen.insert(record.id.clone());

        let message = decode_message(&self.key, &record);
        self.messages.push(message);
    }
}

/// Unseal one record into a display entry; failures become placeholders.
fn decode_message(key: &ContentKey, record: &SecretRecord) -> ChatMessage {
    let (alias, body) = match unseal(&record.content, key) {
        Ok(plaintext) => match ChatEnvelope::decode(&plaintext) {
            Some(envelope) => {
                let body = match envelope.kind {
                    EnvelopeKind::Text { body } => MessageBody::Text(body),
                    EnvelopeKind::RoomOpened => MessageBody::RoomOpened,
                };
                (Some(envelope.alias), body)
            },
            None => (None, MessageBody::Unreadable),
        },
        Err(_) => (None, MessageBody::Unreadable),
    };

    ChatMessage { id: record.id.clone(), alias, body, sent_at: record.created_at }
}
