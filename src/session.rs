use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One conversation, owned by the caller. The client and decoder only ever
/// read a session identifier; they never mutate session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub message_count: u32,
    pub is_active: bool,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            started_at: now,
            last_activity_at: now,
            message_count: 0,
            is_active: true,
        }
    }

    /// Record one sent message.
    pub fn record_message(&mut self) {
        self.message_count += 1;
        self.last_activity_at = Utc::now();
    }

    pub fn close(&mut self) {
        self.is_active = false;
        self.last_activity_at = Utc::now();
    }
}

/// Process-unique message identifier: epoch millis plus a short random
/// suffix. Uniqueness within a session is the only hard requirement.
pub fn new_message_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("msg-{millis}-{suffix}")
}

/// Pick the effective session id: the remote echo wins, then the caller's
/// id, then the locally stored default.
pub fn resolve_session_id(remote: Option<&str>, requested: Option<&str>, fallback: &str) -> String {
    non_empty(remote)
        .or_else(|| non_empty(requested))
        .unwrap_or(fallback)
        .to_string()
}

fn non_empty(id: Option<&str>) -> Option<&str> {
    id.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_unique_and_prefixed() {
        let a = new_message_id();
        let b = new_message_id();
        assert_ne!(a, b);
        assert!(a.starts_with("msg-"));
    }

    #[test]
    fn remote_id_wins_resolution() {
        let resolved = resolve_session_id(Some("remote"), Some("requested"), "fallback");
        assert_eq!(resolved, "remote");
    }

    #[test]
    fn requested_id_beats_fallback() {
        let resolved = resolve_session_id(None, Some("requested"), "fallback");
        assert_eq!(resolved, "requested");
    }

    #[test]
    fn blank_ids_are_ignored() {
        let resolved = resolve_session_id(Some("  "), Some(""), "fallback");
        assert_eq!(resolved, "fallback");
    }

    #[test]
    fn session_records_activity() {
        let mut session = Session::new("sess-1");
        assert_eq!(session.message_count, 0);
        assert!(session.is_active);

        session.record_message();
        session.record_message();
        assert_eq!(session.message_count, 2);
        assert!(session.last_activity_at >= session.started_at);

        session.close();
        assert!(!session.is_active);
    }
}
