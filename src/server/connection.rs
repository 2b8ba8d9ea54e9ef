//! Per-connection session state

use super::accessory::CharacteristicId;
use super::encrypted_channel::{EncryptedChannel, EncryptionError};
use crate::protocol::pairing::{PairSetupState, PairVerifyState, SessionKeys};
use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;

/// Identifier of one accepted TCP connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handshake position of a connection
#[derive(Debug, Default)]
pub enum SessionState {
    /// No handshake in progress
    #[default]
    Unauthenticated,
    /// Pair-Setup between two messages
    PairSetupInProgress(PairSetupState),
    /// Pair-Verify waiting for M3
    PairVerifyInProgress(PairVerifyState),
    /// Pair-Verify completed for `username`
    Authenticated { username: String },
}

impl SessionState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

/// Single-use token from `PUT /prepare`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedWrite {
    pub pid: u64,
    pub deadline: Instant,
}

/// State owned by one connection task
#[derive(Debug)]
pub struct HapConnection {
    id: ConnectionId,
    peer: SocketAddr,
    state: SessionState,
    channel: Option<EncryptedChannel>,
    subscriptions: BTreeSet<CharacteristicId>,
    timed_write: Option<TimedWrite>,
    close_after_flush: bool,
}

impl HapConnection {
    #[must_use]
    pub fn new(id: ConnectionId, peer: SocketAddr) -> Self {
        Self {
            id,
            peer,
            state: SessionState::Unauthenticated,
            channel: None,
            subscriptions: BTreeSet::new(),
            timed_write: None,
            close_after_flush: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Take the pending Pair-Setup state, leaving the connection idle
    pub fn take_setup_state(&mut self) -> Option<PairSetupState> {
        match std::mem::take(&mut self.state) {
            SessionState::PairSetupInProgress(state) => Some(state),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Take the pending Pair-Verify state, leaving the connection idle
    pub fn take_verify_state(&mut self) -> Option<PairVerifyState> {
        match std::mem::take(&mut self.state) {
            SessionState::PairVerifyInProgress(state) => Some(state),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Verified controller of this session
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { username } => Some(username),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    /// Complete Pair-Verify: install traffic keys and mark the session
    ///
    /// # Errors
    ///
    /// Returns error if the keys cannot initialize the ciphers
    pub fn authenticate(
        &mut self,
        username: String,
        keys: &SessionKeys,
    ) -> Result<(), EncryptionError> {
        self.channel = Some(EncryptedChannel::for_accessory(keys)?);
        self.state = SessionState::Authenticated { username };
        Ok(())
    }

    /// Transport channel, present once Pair-Verify completed
    pub fn channel_mut(&mut self) -> Option<&mut EncryptedChannel> {
        self.channel.as_mut()
    }

    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.channel.is_some()
    }

    /// Add an event subscription; `true` if it was not present
    pub fn subscribe(&mut self, id: CharacteristicId) -> bool {
        self.subscriptions.insert(id)
    }

    /// Drop an event subscription; `true` if it was present
    pub fn unsubscribe(&mut self, id: CharacteristicId) -> bool {
        self.subscriptions.remove(&id)
    }

    #[must_use]
    pub fn is_subscribed(&self, id: CharacteristicId) -> bool {
        self.subscriptions.contains(&id)
    }

    /// Remove and return every subscription
    pub fn take_subscriptions(&mut self) -> Vec<CharacteristicId> {
        std::mem::take(&mut self.subscriptions).into_iter().collect()
    }

    /// Store a timed-write token, replacing any previous one
    pub fn prepare_timed_write(&mut self, pid: u64, ttl: Duration, now: Instant) {
        self.timed_write = Some(TimedWrite {
            pid,
            deadline: now + ttl,
        });
    }

    /// Consume the token if `pid` matches and it has not expired
    pub fn take_timed_write(&mut self, pid: u64, now: Instant) -> bool {
        match self.timed_write {
            Some(token) if token.pid == pid && now < token.deadline => {
                self.timed_write = None;
                true
            }
            _ => false,
        }
    }

    /// Deadline of the pending token
    #[must_use]
    pub fn timed_write_deadline(&self) -> Option<Instant> {
        self.timed_write.map(|token| token.deadline)
    }

    /// Clear the token if its deadline has passed
    pub fn expire_timed_write(&mut self, now: Instant) {
        if self.timed_write.is_some_and(|token| now >= token.deadline) {
            tracing::debug!(connection = %self.id, "Timed write token expired");
            self.timed_write = None;
        }
    }

    /// Close once the current response is written
    pub fn close_after_flush(&mut self) {
        self.close_after_flush = true;
    }

    #[must_use]
    pub fn should_close(&self) -> bool {
        self.close_after_flush
    }
}
