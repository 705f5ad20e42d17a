use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::AccountStore;

/// Authentication errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Unknown username or wrong PIN
    #[error("Login information is incorrect")]
    AuthenticationFailed,
    /// Nobody is logged in
    #[error("No active session")]
    NoSession,
}

/// State of the single user session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    LoggedOut,
    Active {
        /// Username of the authenticated account
        username: String,
        /// Seconds left before the session is forced closed
        remaining_secs: u32,
    },
}

/// What a clock tick did to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Session still active with this many seconds left
    Remaining(u32),
    /// The countdown ran out; the session for this username was closed
    Expired(String),
    /// No session was active, nothing changed
    Idle,
}

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    /// The authenticated username
    pub username: String,
    /// Owner display name
    pub owner: String,
    /// Countdown budget the session starts with
    pub remaining_secs: u32,
}

/// Session engine: tracks who is logged in and counts down to an automatic
/// logout. Only a login re-arms the countdown; activity does not.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    budget_secs: u32,
}

impl Session {
    /// Create a logged-out session with a countdown budget of `budget_secs`
    pub fn new(budget_secs: u32) -> Self {
        Self {
            state: SessionState::LoggedOut,
            budget_secs: budget_secs.max(1),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn budget_secs(&self) -> u32 {
        self.budget_secs
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active { .. })
    }

    /// Username of the logged-in account, or `NoSession`
    pub fn current_username(&self) -> Result<&str, AuthError> {
        match &self.state {
            SessionState::Active { username, .. } => Ok(username),
            SessionState::LoggedOut => Err(AuthError::NoSession),
        }
    }

    pub fn remaining_secs(&self) -> Option<u32> {
        match &self.state {
            SessionState::Active { remaining_secs, .. } => Some(*remaining_secs),
            SessionState::LoggedOut => None,
        }
    }

    /// Countdown as `MM:SS`, or `None` when logged out
    pub fn countdown_label(&self) -> Option<String> {
        self.remaining_secs()
            .map(|secs| format!("{:02}:{:02}", secs / 60, secs % 60))
    }

    /// Authenticate against the store and start a fresh countdown.
    ///
    /// A failed attempt leaves the engine logged out, ending whatever
    /// session was active before it.
    pub fn login(&mut self, store: &AccountStore, username: &str, pin: u32) -> Result<AuthResult, AuthError> {
        let account = match store.find(username) {
            Some(account) if account.verify_pin(pin) => account,
            Some(_) => {
                warn!("Failed login for {}: wrong PIN", username);
                self.state = SessionState::LoggedOut;
                return Err(AuthError::AuthenticationFailed);
            }
            None => {
                warn!("Failed login: unknown username {}", username);
                self.state = SessionState::LoggedOut;
                return Err(AuthError::AuthenticationFailed);
            }
        };

        self.state = SessionState::Active {
            username: account.username().to_string(),
            remaining_secs: self.budget_secs,
        };

        info!("{} logged in, session expires in {}s", account.username(), self.budget_secs);

        Ok(AuthResult {
            username: account.username().to_string(),
            owner: account.owner().to_string(),
            remaining_secs: self.budget_secs,
        })
    }

    /// End the session. Returns the username that was logged in, if any.
    pub fn logout(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.state, SessionState::LoggedOut) {
            SessionState::Active { username, .. } => {
                info!("{} logged out", username);
                Some(username)
            }
            SessionState::LoggedOut => None,
        }
    }

    /// Advance the countdown by one second.
    ///
    /// After `budget` ticks the session is closed. Ticking while logged out
    /// changes nothing.
    pub fn tick(&mut self) -> TickOutcome {
        let remaining = match &mut self.state {
            SessionState::Active { remaining_secs, .. } => {
                *remaining_secs = remaining_secs.saturating_sub(1);
                *remaining_secs
            }
            SessionState::LoggedOut => return TickOutcome::Idle,
        };

        if remaining > 0 {
            return TickOutcome::Remaining(remaining);
        }

        match self.logout() {
            Some(username) => {
                info!("Session for {} expired", username);
                TickOutcome::Expired(username)
            }
            None => TickOutcome::Idle,
        }
    }

    /// Re-arm the full countdown without changing who is logged in
    pub fn reset_countdown(&mut self) -> Result<(), AuthError> {
        match &mut self.state {
            SessionState::Active { remaining_secs, .. } => {
                *remaining_secs = self.budget_secs;
                debug!("Session countdown reset to {}s", self.budget_secs);
                Ok(())
            }
            SessionState::LoggedOut => Err(AuthError::NoSession),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use rstest::rstest;

    fn store() -> AccountStore {
        AccountStore::from_seeds(&Config::demo().unwrap().accounts)
    }

    #[test]
    fn test_login_success() {
        let store = store();
        let mut session = Session::new(120);

        let auth = session.login(&store, "jd", 2222).unwrap();

        assert_eq!(auth.username, "jd");
        assert_eq!(auth.owner, "Jessica Davis");
        assert_eq!(session.current_username(), Ok("jd"));
        assert_eq!(session.remaining_secs(), Some(120));
        assert_eq!(session.countdown_label().as_deref(), Some("02:00"));
    }

    #[rstest]
    #[case("js", 2222)]
    #[case("jd", 1111)]
    #[case("nobody", 1111)]
    fn test_login_failure(#[case] username: &str, #[case] pin: u32) {
        let store = store();
        let mut session = Session::new(120);

        assert_eq!(session.login(&store, username, pin), Err(AuthError::AuthenticationFailed));
        assert_eq!(session.state(), &SessionState::LoggedOut);
    }

    #[test]
    fn test_failed_login_ends_previous_session() {
        let store = store();
        let mut session = Session::new(120);
        session.login(&store, "js", 1111).unwrap();

        assert!(session.login(&store, "jd", 9999).is_err());
        assert_eq!(session.current_username(), Err(AuthError::NoSession));
    }

    #[test]
    fn test_countdown_expires_after_budget() {
        let store = store();
        let budget = 5;
        let mut session = Session::new(budget);
        session.login(&store, "js", 1111).unwrap();

        for n in 1..budget {
            assert_eq!(session.tick(), TickOutcome::Remaining(budget - n));
            assert_eq!(session.remaining_secs(), Some(budget - n));
        }

        assert_eq!(session.tick(), TickOutcome::Expired("js".to_string()));
        assert!(!session.is_active());
        assert_eq!(session.tick(), TickOutcome::Idle);
        assert_eq!(session.tick(), TickOutcome::Idle);
    }

    #[test]
    fn test_login_resets_countdown() {
        let store = store();
        let mut session = Session::new(10);
        session.login(&store, "js", 1111).unwrap();
        session.tick();
        session.tick();

        session.login(&store, "jd", 2222).unwrap();

        assert_eq!(session.remaining_secs(), Some(10));
        assert_eq!(session.current_username(), Ok("jd"));
    }

    #[test]
    fn test_reset_countdown() {
        let store = store();
        let mut session = Session::new(10);
        assert_eq!(session.reset_countdown(), Err(AuthError::NoSession));

        session.login(&store, "js", 1111).unwrap();
        session.tick();
        session.reset_countdown().unwrap();

        assert_eq!(session.remaining_secs(), Some(10));
        assert_eq!(session.current_username(), Ok("js"));
    }

    #[test]
    fn test_countdown_label_formatting() {
        let store = store();
        let mut session = Session::new(65);
        assert_eq!(session.countdown_label(), None);

        session.login(&store, "js", 1111).unwrap();
        session.tick();
        assert_eq!(session.countdown_label().as_deref(), Some("01:04"));
    }

    #[test]
    fn test_logout() {
        let store = store();
        let mut session = Session::new(10);
        session.login(&store, "js", 1111).unwrap();

        assert_eq!(session.logout().as_deref(), Some("js"));
        assert_eq!(session.logout(), None);
    }
}
