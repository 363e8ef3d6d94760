//! Room creation with bounded collision retry.
//!
//! Creating a room means inserting its initializer record (a sealed
//! room-opened envelope) under a freshly generated code. The backend's
//! uniqueness constraint may reject the insert if the code is taken; the
//! machine then regenerates a new code and retries the whole sequence,
//! bounded by [`CreateConfig::max_attempts`] so a pathological backend can
//! never recurse unbounded.

use std::time::Duration;

use ember_core::{NewRecord, RoomCode, SecretRecord, StoreError, env::Environment};
use ember_crypto::{NONCE_SIZE, derive_room_key, seal};

use crate::envelope::ChatEnvelope;

/// Tunables for room creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateConfig {
    /// Total insert attempts before giving up. Clamped to at least 1.
    pub max_attempts: u32,

    /// Room lifetime; sets `expires_at` on the initializer and every
    /// subsequent message. `None` means no expiry.
    pub ttl: Option<Duration>,
}

impl Default for CreateConfig {
    fn default() -> Self {
        Self { max_attempts: 8, ttl: None }
    }
}

/// Creation lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationState {
    /// Not started.
    Idle,

    /// Initializer insert in flight.
    Inserting {
        /// Code being claimed.
        code: RoomCode,
        /// 1-based attempt counter.
        attempt: u32,
    },

    /// Room exists; code ready to share out-of-band.
    Created {
        /// The claimed code.
        code: RoomCode,
    },

    /// Creation gave up.
    Failed {
        /// Why.
        failure: CreateFailure,
    },
}

/// Terminal creation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateFailure {
    /// Every generated code collided.
    ///
    /// With a 40^6 code space this signals a broken backend, not bad luck.
    AttemptsExhausted {
        /// Attempts that were made.
        attempts: u32,
    },

    /// Non-conflict backend failure; not retried.
    Backend {
        /// Failure reported by the store.
        error: StoreError,
    },
}

/// Events fed into [`RoomCreation`].
#[derive(Debug, Clone)]
pub enum CreationEvent {
    /// Begin creating.
    Start,

    /// The insert issued by the machine succeeded.
    InsertSucceeded {
        /// The stored initializer record.
        record: SecretRecord,
    },

    /// The insert issued by the machine failed.
    InsertFailed {
        /// Failure reported by the store.
        error: StoreError,
    },
}

/// Actions produced by [`RoomCreation`] for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationAction {
    /// Insert this payload; feed the outcome back as an event.
    Insert(NewRecord),

    /// Log message for debugging.
    Log {
        /// Log message.
        message: String,
    },
}

/// Room creation state machine.
pub struct RoomCreation<E: Environment> {
    env: E,
    alias: String,
    config: CreateConfig,
    state: CreationState,
}

impl<E: Environment> RoomCreation<E> {
    /// Create a machine for one creation sequence.
    pub fn new(env: E, alias: impl Into<String>, config: CreateConfig) -> Self {
        Self { env, alias: alias.into(), config, state: CreationState::Idle }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &CreationState {
        &self.state
    }

    /// The claimed code, once created.
    pub fn code(&self) -> Option<&RoomCode> {
        match &self.state {
            CreationState::Created { code } => Some(code),
            _ => None,
        }
    }

    /// Process an event and return resulting actions.
    pub fn handle(&mut self, event: CreationEvent) -> Vec<CreationAction> {
        match event {
            CreationEvent::Start => {
                if !matches!(self.state, CreationState::Idle) {
                    return vec![];
                }
                self.attempt(1)
            },
            CreationEvent::InsertSucceeded { record: _ } => {
                let CreationState::Inserting { code, attempt } = &self.state else {
                    return vec![];
                };
                let code = code.clone();
                let message = format!("room created on attempt {attempt}");
                self.state = CreationState::Created { code };
                vec![CreationAction::Log { message }]
            },
            CreationEvent::InsertFailed { error } => self.handle_insert_failed(error),
        }
    }

    fn handle_insert_failed(&mut self, error: StoreError) -> Vec<CreationAction> {
        let CreationState::Inserting { attempt, .. } = &self.state else {
            return vec![];
        };
        let attempt = *attempt;

        if !matches!(error, StoreError::Conflict) {
            self.state = CreationState::Failed { failure: CreateFailure::Backend { error } };
            return vec![];
        }

        if attempt >= self.config.max_attempts.max(1) {
            self.state = CreationState::Failed {
                failure: CreateFailure::AttemptsExhausted { attempts: attempt },
            };
            return vec![CreationAction::Log {
                message: format!("giving up after {attempt} colliding codes"),
            }];
        }

        let mut actions = vec![CreationAction::Log {
            message: format!("code collision on attempt {attempt}; regenerating"),
        }];
        actions.extend(self.attempt(attempt + 1));
        actions
    }

    /// Generate a fresh code and emit the initializer insert.
    fn attempt(&mut self, attempt: u32) -> Vec<CreationAction> {
        let code = RoomCode::generate(&self.env);
        let key = derive_room_key(code.as_str());

        let mut nonce = [0u8; NONCE_SIZE];
        self.env.random_bytes(&mut nonce);
        let blob = seal(&ChatEnvelope::room_opened(&self.alias).encode(), &key, nonce);

        let expires_at = self
            .config
            .ttl
            .map(|ttl| self.env.unix_time_ms().saturating_add(ttl.as_millis() as u64));

        self.state = CreationState::Inserting { code: code.clone(), attempt };
        vec![CreationAction::Insert(NewRecord::room_message(blob, code, expires_at))]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use ember_core::{RecordId, TimestampMs};
    use ember_crypto::unseal;

    use super::*;
    use crate::envelope::EnvelopeKind;

    #[derive(Clone)]
    struct TestEnv {
        rng_state: Arc<Mutex<u64>>,
        clock_ms: TimestampMs,
    }

    impl TestEnv {
        fn new() -> Self {
            Self { rng_state: Arc::new(Mutex::new(0xDEAD_BEEF)), clock_ms: 50_000 }
        }
    }

    impl Environment for TestEnv {
        type Instant = std::time::Instant;

        fn now(&self) -> Self::Instant {
            std::time::Instant::now()
        }

        fn unix_time_ms(&self) -> TimestampMs {
            self.clock_ms
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

    fn insert_payload(actions: &[CreationAction]) -> &NewRecord {
        actions
            .iter()
            .find_map(|a| match a {
                CreationAction::Insert(record) => Some(record),
                CreationAction::Log { .. } => None,
            })
            .expect("expected an insert action")
    }

    fn stored(payload: &NewRecord) -> SecretRecord {
        SecretRecord {
            id: RecordId::new("init-1"),
            content: payload.content.clone(),
            room_code: payload.room_code.clone(),
            created_at: 50_000,
            expires_at: payload.expires_at,
        }
    }

    #[test]
    fn creation_claims_a_generated_code() {
        let mut creation = RoomCreation::new(TestEnv::new(), "creator", CreateConfig::default());
        let actions = creation.handle(CreationEvent::Start);
        let payload = insert_payload(&actions).clone();

        let code = payload.room_code.clone().expect("initializer must carry the room code");
        let _ = creation.handle(CreationEvent::InsertSucceeded { record: stored(&payload) });

        assert_eq!(creation.code(), Some(&code));
    }

    #[test]
    fn initializer_is_a_sealed_room_opened_envelope() {
        let mut creation = RoomCreation::new(TestEnv::new(), "creator", CreateConfig::default());
        let actions = creation.handle(CreationEvent::Start);
        let payload = insert_payload(&actions);

        let code = payload.room_code.as_ref().unwrap();
        let plaintext = unseal(&payload.content, &derive_room_key(code.as_str())).unwrap();
        let envelope = ChatEnvelope::decode(&plaintext).unwrap();

        assert_eq!(envelope.alias, "creator");
        assert_eq!(envelope.kind, EnvelopeKind::RoomOpened);
    }

    #[test]
    fn conflict_regenerates_a_different_code() {
        let mut creation = RoomCreation::new(TestEnv::new(), "creator", CreateConfig::default());
        let first = insert_payload(&creation.handle(CreationEvent::Start)).clone();
        let retry = creation.handle(CreationEvent::InsertFailed { error: StoreError::Conflict });
        let second = insert_payload(&retry);

        assert_ne!(first.room_code, second.room_code, "a colliding code must not be reused");
        assert!(matches!(creation.state(), CreationState::Inserting { attempt: 2, .. }));
    }

    #[test]
    fn retries_are_bounded_and_injectable() {
        let config = CreateConfig { max_attempts: 3, ttl: None };
        let mut creation = RoomCreation::new(TestEnv::new(), "creator", config);

        let mut inserts = 0;
        let mut actions = creation.handle(CreationEvent::Start);
        loop {
            if actions.iter().any(|a| matches!(a, CreationAction::Insert(_))) {
                inserts += 1;
                actions = creation.handle(CreationEvent::InsertFailed { error: StoreError::Conflict });
            } else {
                break;
            }
        }

        assert_eq!(inserts, 3, "exactly max_attempts inserts");
        assert!(matches!(
            creation.state(),
            CreationState::Failed { failure: CreateFailure::AttemptsExhausted { attempts: 3 } }
        ));
    }

    #[test]
    fn non_conflict_failure_is_not_retried() {
        let mut creation = RoomCreation::new(TestEnv::new(), "creator", CreateConfig::default());
        let _ = creation.handle(CreationEvent::Start);
        let actions = creation
            .handle(CreationEvent::InsertFailed { error: StoreError::unavailable("down") });

        assert!(!actions.iter().any(|a| matches!(a, CreationAction::Insert(_))));
        assert!(matches!(
            creation.state(),
            CreationState::Failed { failure: CreateFailure::Backend { .. } }
        ));
    }

    #[test]
    fn ttl_sets_absolute_expiry() {
        let config = CreateConfig { max_attempts: 8, ttl: Some(Duration::from_secs(60)) };
        let mut creation = RoomCreation::new(TestEnv::new(), "creator", config);
        let actions = creation.handle(CreationEvent::Start);

        assert_eq!(insert_payload(&actions).expires_at, Some(50_000 + 60_000));
    }

    #[test]
    fn start_is_not_repeatable() {
        let mut creation = RoomCreation::new(TestEnv::new(), "creator", CreateConfig::default());
        let _ = creation.handle(CreationEvent::Start);
        assert!(creation.handle(CreationEvent::Start).is_empty());
    }
}
