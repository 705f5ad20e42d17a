use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of events the bank reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    LoginSucceeded,
    LoginFailed,
    Logout,
    SessionExpired,
    TransferCompleted,
    TransferRejected,
    LoanScheduled,
    LoanRejected,
    LoanCredited,
    LoanCancelled,
    AccountClosed,
}

impl AuditEventType {
    pub fn as_str(&self) -> &str {
        match self {
            AuditEventType::LoginSucceeded => "login_succeeded",
            AuditEventType::LoginFailed => "login_failed",
            AuditEventType::Logout => "logout",
            AuditEventType::SessionExpired => "session_expired",
            AuditEventType::TransferCompleted => "transfer_completed",
            AuditEventType::TransferRejected => "transfer_rejected",
            AuditEventType::LoanScheduled => "loan_scheduled",
            AuditEventType::LoanRejected => "loan_rejected",
            AuditEventType::LoanCredited => "loan_credited",
            AuditEventType::LoanCancelled => "loan_cancelled",
            AuditEventType::AccountClosed => "account_closed",
        }
    }
}

/// Audit event
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuditEvent {
    pub id: Uuid,
    pub event_type: AuditEventType,
    pub username: Option<String>,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// In-memory record of what happened to the bank.
///
/// The presentation layer drains it to learn about things that completed
/// without a direct call, like a loan credit landing or a session expiring.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    events: Vec<AuditEvent>,
    cursor: usize,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event and return its id
    pub fn record(
        &mut self,
        event_type: AuditEventType,
        username: Option<&str>,
        details: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Uuid {
        let event = AuditEvent {
            id: Uuid::new_v4(),
            event_type,
            username: username.map(|s| s.to_string()),
            details,
            timestamp,
        };

        info!(
            "Audit event {}: {} {}",
            event.event_type.as_str(),
            event.username.as_deref().unwrap_or("-"),
            event.details.as_deref().unwrap_or("")
        );

        let id = event.id;
        self.events.push(event);
        id
    }

    /// Every event recorded so far
    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    /// Events recorded since the previous call
    pub fn drain_new(&mut self) -> Vec<AuditEvent> {
        let fresh = self.events[self.cursor..].to_vec();
        self.cursor = self.events.len();
        fresh
    }

    pub fn of_type(&self, event_type: AuditEventType) -> impl Iterator<Item = &AuditEvent> {
        self.events.iter().filter(move |e| e.event_type == event_type)
    }
}
