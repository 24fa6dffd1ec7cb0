//! Session State Machine
//!
//! Each provider owns exactly one [`Session`], holding the opaque session
//! token issued during the `initialize` handshake. The machine has three
//! states, `Absent → Initializing → Active`, with `Active → Absent` on
//! detected expiry and `Initializing → Absent` on handshake failure. No
//! other transitions exist.
//!
//! Single-flight is promise-based rather than busy-polling: the state lives
//! in a `tokio::sync::watch` channel, the transition `Absent → Initializing`
//! is a compare-and-swap inside `send_if_modified`, and followers await the
//! winner's completion through `Receiver::wait_for` under a bounded timeout.
//! Exactly one concurrent caller wins the race; a follower that observes the
//! winner's failure does not take over the handshake, it simply times out.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{ debug, info, warn };

use crate::errors::Error;
use crate::protocol::ProviderId;

/// Default budget a follower spends waiting for another caller's handshake
pub const DEFAULT_WAIT_BUDGET: Duration = Duration::from_secs(3);

/// Provider-specific marker the upstream embeds in error bodies when the
/// session token is no longer valid.
const SESSION_EXPIRED_MARKER: &str = "SessionExpired";

/// Best-effort session-expiry detection.
///
/// This is a heuristic substring match on an error response body, not a
/// structured signal; it is isolated here so it can be replaced wholesale if
/// the upstream protocol ever grows a proper expiry code.
pub fn signals_session_expiry(body: &str) -> bool {
    body.contains(SESSION_EXPIRED_MARKER)
}

/// Lifecycle states of one provider session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No session; the next caller must handshake
    Absent,
    /// A handshake is in flight; callers wait for its outcome
    Initializing,
    /// The session is established; the token goes on every request header
    Active(Arc<str>),
}

/// What a caller holds after asking the session for admission
pub enum Claim {
    /// Session already active; use this token
    Active(Arc<str>),
    /// This caller won the race and must perform the handshake
    Winner(InitPermit),
    /// Another caller is initializing; wait for it via [`Session::wait_active`]
    Follower,
}

/// One provider's session and its lifecycle
pub struct Session {
    provider: ProviderId,
    state: Arc<watch::Sender<SessionState>>,
    wait_budget: Duration,
}

impl Session {
    /// Create a fresh session in the `Absent` state
    pub fn new(provider: ProviderId) -> Self {
        Self::with_wait_budget(provider, DEFAULT_WAIT_BUDGET)
    }

    /// Create a session with a custom follower wait budget
    pub fn with_wait_budget(provider: ProviderId, wait_budget: Duration) -> Self {
        let (state, _rx) = watch::channel(SessionState::Absent);
        Self {
            provider,
            state: Arc::new(state),
            wait_budget,
        }
    }

    /// The provider this session belongs to
    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// The active token, if any
    pub fn token(&self) -> Option<Arc<str>> {
        match &*self.state.borrow() {
            SessionState::Active(token) => Some(token.clone()),
            _ => None,
        }
    }

    /// Ask for admission. The whole decision happens inside one atomic
    /// update of the state channel, so exactly one concurrent caller can
    /// observe `Absent` and claim the handshake.
    pub fn claim(&self) -> Claim {
        let mut claim = Claim::Follower;
        self.state.send_if_modified(|state| {
            match state {
                SessionState::Active(token) => {
                    claim = Claim::Active(token.clone());
                    false
                }
                SessionState::Initializing => {
                    claim = Claim::Follower;
                    false
                }
                SessionState::Absent => {
                    *state = SessionState::Initializing;
                    claim = Claim::Winner(InitPermit {
                        state: self.state.clone(),
                        provider: self.provider,
                        resolved: false,
                    });
                    true
                }
            }
        });
        claim
    }

    /// Wait for the winner's handshake to complete, up to the budget.
    ///
    /// If the winner fails (state reverts to `Absent`) this keeps waiting.
    /// Followers never take over the handshake; they eventually fail with
    /// [`Error::SessionWaitTimeout`].
    pub async fn wait_active(&self) -> Result<Arc<str>, Error> {
        let mut rx = self.state.subscribe();
        let became_active = rx.wait_for(|state| matches!(state, SessionState::Active(_)));

        match tokio::time::timeout(self.wait_budget, became_active).await {
            Ok(Ok(state)) => {
                match &*state {
                    SessionState::Active(token) => {
                        debug!(provider = %self.provider, "session initialized by another caller");
                        Ok(token.clone())
                    }
                    // wait_for only resolves on Active
                    _ => unreachable!("wait_for resolved on non-active state"),
                }
            }
            // Channel closed: the session owner is gone; surface as a timeout.
            Ok(Err(_)) => Err(Error::SessionWaitTimeout),
            Err(_) => {
                warn!(provider = %self.provider, "timed out waiting for session initialization");
                Err(Error::SessionWaitTimeout)
            }
        }
    }

    /// Unconditionally force the session back to `Absent`, discarding any
    /// token. Called when a response body signals expiry.
    pub fn invalidate(&self) {
        warn!(provider = %self.provider, "session invalidated");
        self.state.send_replace(SessionState::Absent);
    }

    /// Test hook: reset to `Absent` without the expiry logging
    pub fn reset(&self) {
        self.state.send_replace(SessionState::Absent);
    }
}

/// Exclusive permission to perform the handshake, held by the race winner.
///
/// Must be resolved with [`complete`](InitPermit::complete) or
/// [`fail`](InitPermit::fail); dropping it unresolved (a panic on the
/// handshake path) reverts the session to `Absent` so later callers are not
/// stuck behind a dead `Initializing`.
pub struct InitPermit {
    state: Arc<watch::Sender<SessionState>>,
    provider: ProviderId,
    resolved: bool,
}

impl InitPermit {
    /// Handshake succeeded: publish the token and wake every follower
    pub fn complete(mut self, token: impl Into<Arc<str>>) -> Arc<str> {
        let token: Arc<str> = token.into();
        self.resolved = true;
        info!(provider = %self.provider, "session initialized");
        self.state.send_replace(SessionState::Active(token.clone()));
        token
    }

    /// Handshake failed: revert to `Absent`. Followers keep waiting until
    /// their own budget expires.
    pub fn fail(mut self) {
        self.resolved = true;
        warn!(provider = %self.provider, "session handshake failed, reverting to absent");
        self.state.send_replace(SessionState::Absent);
    }
}

impl Drop for InitPermit {
    fn drop(&mut self) {
        if !self.resolved {
            self.state.send_replace(SessionState::Absent);
        }
    }
}
