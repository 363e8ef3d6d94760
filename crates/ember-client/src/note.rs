//! One-shot note lifecycle state machines.
//!
//! Two machines cover the burn-on-read flow:
//!
//! - [`NotePublisher`]: seal plaintext under a fresh random link key,
//!   insert the ciphertext, combine the returned id with the key into a
//!   shareable [`Locator`].
//! - [`NoteViewer`]: parse a locator, fetch the row, unseal, and on
//!   success burn the row. The machine's Idle state doubles as the
//!   at-most-once latch: whatever fires the open trigger twice, only the
//!   first transition emits a fetch, so a note can never be burned by a
//!   repeated trigger before it is shown.
//!
//! Fetch, unseal, and delete are three separate steps by design; two
//! simultaneous openers may both fetch before either deletes. The burn is
//! best-effort single-read, not transactionally exclusive.

use ember_core::{NewRecord, RecordId, SecretRecord, StoreError, env::Environment};
use ember_crypto::{LINK_KEY_SIZE, LinkKey, NONCE_SIZE, expand_link_key, seal, unseal};

use crate::locator::Locator;

/// Publisher lifecycle.
pub enum PublisherState {
    /// Waiting for plaintext to submit.
    Composing,

    /// Insert in flight; holds the locator's key half until the backend
    /// returns the id half.
    Waiting {
        /// Origin the locator will be built for.
        origin: String,
        /// Freshly generated link key.
        key: LinkKey,
    },

    /// Note stored; locator ready to share.
    Published {
        /// The complete shareable locator.
        locator: Locator,
    },

    /// Insert failed; nothing was stored.
    Failed {
        /// Backend failure that ended the flow.
        error: StoreError,
    },
}

/// Events fed into [`NotePublisher`].
#[derive(Debug, Clone)]
pub enum PublisherEvent {
    /// User submitted plaintext for a one-shot note.
    Submit {
        /// Note text. Blank submissions are ignored.
        plaintext: String,
        /// Origin for the locator, e.g. `https://ember.example`.
        origin: String,
    },

    /// The insert issued by the machine completed.
    InsertCompleted {
        /// The stored record (backend-assigned id and timestamp).
        record: SecretRecord,
    },

    /// The insert issued by the machine failed.
    InsertFailed {
        /// Failure reported by the store.
        error: StoreError,
    },
}

/// Actions produced by [`NotePublisher`] for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublisherAction {
    /// Insert this payload; feed the outcome back as an event.
    Insert(NewRecord),

    /// Log message for debugging.
    Log {
        /// Log message.
        message: String,
    },
}

/// One-shot note publisher state machine.
pub struct NotePublisher<E: Environment> {
    env: E,
    state: PublisherState,
}

impl<E: Environment> NotePublisher<E> {
    /// Create a publisher ready to accept a submission.
    pub fn new(env: E) -> Self {
        Self { env, state: PublisherState::Composing }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &PublisherState {
        &self.state
    }

    /// Process an event and return resulting actions.
    ///
    /// Events that do not fit the current state (stale responses, repeated
    /// triggers) are ignored.
    pub fn handle(&mut self, event: PublisherEvent) -> Vec<PublisherAction> {
        match event {
            PublisherEvent::Submit { plaintext, origin } => self.handle_submit(&plaintext, origin),
            PublisherEvent::InsertCompleted { record } => self.handle_insert_completed(record),
            PublisherEvent::InsertFailed { error } => self.handle_insert_failed(error),
        }
    }

    fn handle_insert_completed(&mut self, record: SecretRecord) -> Vec<PublisherAction> {
        let PublisherState::Waiting { origin, key } = &self.state else {
            return vec![];
        };

        let locator = Locator::new(origin.clone(), record.id, key.clone());
        self.state = PublisherState::Published { locator };
        vec![PublisherAction::Log { message: "note stored; locator ready".to_owned() }]
    }

    fn handle_insert_failed(&mut self, error: StoreError) -> Vec<PublisherAction> {
        if !matches!(self.state, PublisherState::Waiting { .. }) {
            return vec![];
        }

        let message = format!("note insert failed: {error}");
        self.state = PublisherState::Failed { error };
        vec![PublisherAction::Log { message }]
    }

    fn handle_submit(&mut self, plaintext: &str, origin: String) -> Vec<PublisherAction> {
        if !matches!(self.state, PublisherState::Composing) || plaintext.trim().is_empty() {
            return vec![];
        }

        let mut key_bytes = [0u8; LINK_KEY_SIZE];
        self.env.random_bytes(&mut key_bytes);
        let key = LinkKey::new(key_bytes);

        let mut nonce = [0u8; NONCE_SIZE];
        self.env.random_bytes(&mut nonce);

        let blob = seal(plaintext, &expand_link_key(&key), nonce);

        self.state = PublisherState::Waiting { origin, key };
        vec![PublisherAction::Insert(NewRecord::one_shot(blob))]
    }
}

/// Why a viewer ended without plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Missing key material, unknown id, burned, or expired - deliberately
    /// indistinguishable.
    AccessDenied,

    /// Ciphertext was present but the supplied key could not unseal it.
    InvalidKey,

    /// The backend could not be reached.
    Unavailable,
}

/// Viewer lifecycle.
pub enum ViewerState {
    /// Nothing opened yet. The only state that accepts an open trigger.
    Idle,

    /// Fetch in flight.
    Fetching {
        /// Record being fetched.
        id: RecordId,
        /// Key from the locator fragment.
        key: LinkKey,
    },

    /// Plaintext recovered; the burn was issued.
    Revealed {
        /// The decrypted note.
        plaintext: String,
    },

    /// Terminal rejection.
    Denied {
        /// What the user is told.
        reason: Denial,
    },
}

/// Events fed into [`NoteViewer`].
#[derive(Debug, Clone)]
pub enum ViewerEvent {
    /// The open trigger fired with the shared link.
    ///
    /// May fire more than once (retries, re-renders); only the first
    /// occurrence has any effect.
    Opened {
        /// The full locator URL, fragment included.
        url: String,
    },

    /// The fetch issued by the machine returned a record.
    RecordArrived {
        /// The fetched record.
        record: SecretRecord,
    },

    /// The fetch issued by the machine failed.
    FetchFailed {
        /// Failure reported by the store.
        error: StoreError,
    },

    /// The burn issued by the machine completed.
    BurnCompleted,

    /// The burn issued by the machine failed.
    ///
    /// Accepted limitation: the note was already shown, so this is only
    /// logged; the record stays readable until an external purge or a
    /// later reader burns it.
    BurnFailed {
        /// Failure reported by the store.
        error: StoreError,
    },
}

/// Actions produced by [`NoteViewer`] for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerAction {
    /// Fetch this record; feed the outcome back as an event.
    Fetch {
        /// Record to fetch.
        id: RecordId,
    },

    /// Delete this record (burn-on-read); feed the outcome back.
    Burn {
        /// Record to delete.
        id: RecordId,
    },

    /// Log message for debugging.
    Log {
        /// Log message.
        message: String,
    },
}

/// One-shot note viewer state machine with an at-most-once burn latch.
pub struct NoteViewer<E: Environment> {
    env: E,
    state: ViewerState,
}

impl<E: Environment> NoteViewer<E> {
    /// Create a viewer ready to open one locator.
    pub fn new(env: E) -> Self {
        Self { env, state: ViewerState::Idle }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// Process an event and return resulting actions.
    pub fn handle(&mut self, event: ViewerEvent) -> Vec<ViewerAction> {
        match event {
            ViewerEvent::Opened { url } => self.handle_opened(&url),
            ViewerEvent::RecordArrived { record } => self.handle_record(record),
            ViewerEvent::FetchFailed { error } => self.handle_fetch_failed(&error),
            ViewerEvent::BurnCompleted => {
                vec![ViewerAction::Log { message: "note burned after read".to_owned() }]
            },
            ViewerEvent::BurnFailed { error } => {
                vec![ViewerAction::Log { message: format!("burn failed, record may linger: {error}") }]
            },
        }
    }

    fn handle_opened(&mut self, url: &str) -> Vec<ViewerAction> {
        if !matches!(self.state, ViewerState::Idle) {
            // The latch: repeated triggers never refetch or reburn.
            return vec![];
        }

        match Locator::parse(url) {
            Ok(locator) => {
                let id = locator.id().clone();
                self.state =
                    ViewerState::Fetching { id: id.clone(), key: locator.key().clone() };
                vec![ViewerAction::Fetch { id }]
            },
            Err(error) => {
                // No key material: denied before any network call.
                self.state = ViewerState::Denied { reason: Denial::AccessDenied };
                vec![ViewerAction::Log { message: format!("locator rejected: {error}") }]
            },
        }
    }

    fn handle_record(&mut self, record: SecretRecord) -> Vec<ViewerAction> {
        let ViewerState::Fetching { id, key } = &self.state else {
            return vec![];
        };

        if record.id != *id {
            return vec![ViewerAction::Log {
                message: format!("ignoring record {} while fetching {id}", record.id),
            }];
        }

        if record.is_expired(self.env.unix_time_ms()) {
            // Lapsed but not yet purged: same outcome as never existing.
            self.state = ViewerState::Denied { reason: Denial::AccessDenied };
            return vec![ViewerAction::Log { message: "record lapsed before read".to_owned() }];
        }

        match unseal(&record.content, &expand_link_key(key)) {
            Ok(plaintext) => {
                let burn = ViewerAction::Burn { id: record.id };
                self.state = ViewerState::Revealed { plaintext };
                vec![burn]
            },
            Err(error) => {
                // Wrong key or corrupt blob. No burn: the rightful key
                // holder must still be able to read it once.
                self.state = ViewerState::Denied { reason: Denial::InvalidKey };
                vec![ViewerAction::Log { message: format!("unseal failed: {error}") }]
            },
        }
    }

    fn handle_fetch_failed(&mut self, error: &StoreError) -> Vec<ViewerAction> {
        if !matches!(self.state, ViewerState::Fetching { .. }) {
            return vec![];
        }

        let reason = match error {
            StoreError::NotFound => Denial::AccessDenied,
            StoreError::Conflict | StoreError::Unavailable { .. } => Denial::Unavailable,
        };
        self.state = ViewerState::Denied { reason };
        vec![ViewerAction::Log { message: format!("fetch failed: {error}") }]
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use ember_core::TimestampMs;

    use super::*;

    /// Deterministic environment with a settable clock.
    #[derive(Clone)]
    struct TestEnv {
        rng_state: Arc<Mutex<u64>>,
        clock_ms: Arc<Mutex<TimestampMs>>,
    }

    impl TestEnv {
        fn new() -> Self {
            Self { rng_state: Arc::new(Mutex::new(0x9E37_79B9)), clock_ms: Arc::new(Mutex::new(1_000)) }
        }

        fn set_clock(&self, at: TimestampMs) {
            *self.clock_ms.lock().unwrap() = at;
        }
    }

    impl Environment for TestEnv {
        type Instant = std::time::Instant;

        fn now(&self) -> Self::Instant {
            std::time::Instant::now()
        }

        fn unix_time_ms(&self) -> TimestampMs {
            *self.clock_ms.lock().unwrap()
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let mut state = self.rng_state.lock().unwrap();
            for byte in buffer.iter_mut() {
                *state ^= *state << 13;
                *state ^= *state >> 7;
                *state ^= *state << 17;
                *byte = (*state & 0xFF) as u8;
            }
        }
    }

    fn stored(publisher_actions: &[PublisherAction], id: &str) -> SecretRecord {
        let [PublisherAction::Insert(new_record)] = publisher_actions else {
            panic!("expected a single insert action");
        };
        SecretRecord {
            id: RecordId::new(id),
            content: new_record.content.clone(),
            room_code: None,
            created_at: 1_000,
            expires_at: None,
        }
    }

    fn published_locator(publisher: &NotePublisher<TestEnv>) -> &Locator {
        match publisher.state() {
            PublisherState::Published { locator } => locator,
            _ => panic!("publisher not in Published state"),
        }
    }

    #[test]
    fn publish_then_view_roundtrip() {
        let env = TestEnv::new();

        let mut publisher = NotePublisher::new(env.clone());
        let actions = publisher.handle(PublisherEvent::Submit {
            plaintext: "hello world".to_owned(),
            origin: "https://ember.example".to_owned(),
        });
        let record = stored(&actions, "abc123");
        let _ = publisher.handle(PublisherEvent::InsertCompleted { record: record.clone() });

        let locator = published_locator(&publisher);
        let url = locator.to_url();
        assert!(url.starts_with("https://ember.example/view/abc123#"));

        let mut viewer = NoteViewer::new(env);
        let actions = viewer.handle(ViewerEvent::Opened { url });
        assert_eq!(actions, vec![ViewerAction::Fetch { id: RecordId::new("abc123") }]);

        let actions = viewer.handle(ViewerEvent::RecordArrived { record });
        assert_eq!(actions, vec![ViewerAction::Burn { id: RecordId::new("abc123") }]);
        match viewer.state() {
            ViewerState::Revealed { plaintext } => assert_eq!(plaintext, "hello world"),
            _ => panic!("viewer should have revealed the note"),
        }
    }

    #[test]
    fn blank_submission_is_ignored() {
        let mut publisher = NotePublisher::new(TestEnv::new());
        let actions = publisher.handle(PublisherEvent::Submit {
            plaintext: "   \n".to_owned(),
            origin: "https://ember.example".to_owned(),
        });
        assert!(actions.is_empty());
        assert!(matches!(publisher.state(), PublisherState::Composing));
    }

    #[test]
    fn insert_failure_ends_the_flow() {
        let mut publisher = NotePublisher::new(TestEnv::new());
        let _ = publisher.handle(PublisherEvent::Submit {
            plaintext: "x".to_owned(),
            origin: "o".to_owned(),
        });
        let _ = publisher.handle(PublisherEvent::InsertFailed {
            error: StoreError::unavailable("down"),
        });
        assert!(matches!(publisher.state(), PublisherState::Failed { .. }));
    }

    #[test]
    fn missing_fragment_denies_without_fetching() {
        let mut viewer = NoteViewer::new(TestEnv::new());
        let actions = viewer.handle(ViewerEvent::Opened {
            url: "https://ember.example/view/abc123".to_owned(),
        });
        assert!(
            !actions.iter().any(|a| matches!(a, ViewerAction::Fetch { .. })),
            "no network call may happen without key material"
        );
        assert!(matches!(viewer.state(), ViewerState::Denied { reason: Denial::AccessDenied }));
    }

    #[test]
    fn open_trigger_is_latched() {
        let env = TestEnv::new();
        let mut publisher = NotePublisher::new(env.clone());
        let actions = publisher.handle(PublisherEvent::Submit {
            plaintext: "once".to_owned(),
            origin: "https://ember.example".to_owned(),
        });
        let record = stored(&actions, "abc123");
        let _ = publisher.handle(PublisherEvent::InsertCompleted { record: record.clone() });
        let url = published_locator(&publisher).to_url();

        let mut viewer = NoteViewer::new(env);
        let first = viewer.handle(ViewerEvent::Opened { url: url.clone() });
        assert_eq!(first.len(), 1);

        // Double-fire before the fetch resolves: ignored.
        assert!(viewer.handle(ViewerEvent::Opened { url: url.clone() }).is_empty());

        let _ = viewer.handle(ViewerEvent::RecordArrived { record });

        // And after reveal: still ignored, no second burn.
        assert!(viewer.handle(ViewerEvent::Opened { url }).is_empty());
    }

    #[test]
    fn wrong_key_denies_and_does_not_burn() {
        let env = TestEnv::new();
        let mut publisher = NotePublisher::new(env.clone());
        let actions = publisher.handle(PublisherEvent::Submit {
            plaintext: "secret".to_owned(),
            origin: "https://ember.example".to_owned(),
        });
        let record = stored(&actions, "abc123");
        let _ = publisher.handle(PublisherEvent::InsertCompleted { record: record.clone() });

        // Same id, different key in the fragment.
        let forged = format!(
            "https://ember.example/view/abc123#{}",
            LinkKey::new([0x00; LINK_KEY_SIZE]).to_hex()
        );

        let mut viewer = NoteViewer::new(env);
        let _ = viewer.handle(ViewerEvent::Opened { url: forged });
        let actions = viewer.handle(ViewerEvent::RecordArrived { record });

        assert!(
            !actions.iter().any(|a| matches!(a, ViewerAction::Burn { .. })),
            "an unreadable note must stay burnable by the real key holder"
        );
        assert!(matches!(viewer.state(), ViewerState::Denied { reason: Denial::InvalidKey }));
    }

    #[test]
    fn not_found_is_access_denied() {
        let env = TestEnv::new();
        let mut viewer = NoteViewer::new(env);
        let url = format!(
            "https://ember.example/view/gone#{}",
            LinkKey::new([0x01; LINK_KEY_SIZE]).to_hex()
        );
        let _ = viewer.handle(ViewerEvent::Opened { url });
        let _ = viewer.handle(ViewerEvent::FetchFailed { error: StoreError::NotFound });
        assert!(matches!(viewer.state(), ViewerState::Denied { reason: Denial::AccessDenied }));
    }

    #[test]
    fn backend_outage_is_distinct_from_denial() {
        let env = TestEnv::new();
        let mut viewer = NoteViewer::new(env);
        let url = format!(
            "https://ember.example/view/abc#{}",
            LinkKey::new([0x01; LINK_KEY_SIZE]).to_hex()
        );
        let _ = viewer.handle(ViewerEvent::Opened { url });
        let _ = viewer.handle(ViewerEvent::FetchFailed { error: StoreError::unavailable("reset") });
        assert!(matches!(viewer.state(), ViewerState::Denied { reason: Denial::Unavailable }));
    }

    #[test]
    fn lapsed_record_is_denied_on_read() {
        let env = TestEnv::new();
        let mut publisher = NotePublisher::new(env.clone());
        let actions = publisher.handle(PublisherEvent::Submit {
            plaintext: "stale".to_owned(),
            origin: "https://ember.example".to_owned(),
        });
        let mut record = stored(&actions, "abc123");
        record.expires_at = Some(2_000);
        let _ = publisher.handle(PublisherEvent::InsertCompleted { record: record.clone() });
        let url = published_locator(&publisher).to_url();

        env.set_clock(3_000);
        let mut viewer = NoteViewer::new(env);
        let _ = viewer.handle(ViewerEvent::Opened { url });
        let actions = viewer.handle(ViewerEvent::RecordArrived { record });

        assert!(!actions.iter().any(|a| matches!(a, ViewerAction::Burn { .. })));
        assert!(matches!(viewer.state(), ViewerState::Denied { reason: Denial::AccessDenied }));
    }

    #[test]
    fn burn_failure_is_logged_only() {
        let env = TestEnv::new();
        let mut publisher = NotePublisher::new(env.clone());
        let actions = publisher.handle(PublisherEvent::Submit {
            plaintext: "hello".to_owned(),
            origin: "https://ember.example".to_owned(),
        });
        let record = stored(&actions, "abc123");
        let _ = publisher.handle(PublisherEvent::InsertCompleted { record: record.clone() });
        let url = published_locator(&publisher).to_url();

        let mut viewer = NoteViewer::new(env);
        let _ = viewer.handle(ViewerEvent::Opened { url });
        let _ = viewer.handle(ViewerEvent::RecordArrived { record });
        let actions =
            viewer.handle(ViewerEvent::BurnFailed { error: StoreError::unavailable("flaky") });

        assert!(matches!(actions.as_slice(), [ViewerAction::Log { .. }]));
        assert!(matches!(viewer.state(), ViewerState::Revealed { .. }), "reveal survives");
    }
}
