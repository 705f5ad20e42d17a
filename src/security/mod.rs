// Session and authentication module.
// PINs are compared as plain numbers; this is a simulator, not a vault.

pub mod auth;

pub use auth::{AuthError, AuthResult, Session, SessionState, TickOutcome};
