//! Audit logging for authorization decisions.
//!
//! Every final decision is emitted via `tracing::info!` with the event
//! serialized as a JSON blob in the `audit` field, making the trail
//! queryable by any log aggregator.

use serde::Serialize;

use crate::authorize::AuthStatus;

/// Structured audit event for one authorization decision.
#[derive(Debug, Serialize)]
pub struct AuditEvent<'a> {
    /// Event type string (`"request.allowed"` / `"request.denied"`).
    pub event: &'static str,
    /// HTTP status code of the decision.
    pub status: u16,
    /// Resource path the decision applied to.
    pub resource: &'a str,
    /// Peer hostname.
    pub hostname: &'a str,
    /// Resolved username, when one was established.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
    /// Path of the rule block that drove the decision, for audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<&'a str>,
}

impl<'a> AuditEvent<'a> {
    /// Build the event for a decision.
    #[must_use]
    pub fn decision(
        status: AuthStatus,
        resource: &'a str,
        hostname: &'a str,
        username: Option<&'a str>,
        rule: Option<&'a str>,
    ) -> Self {
        Self {
            event: if status == AuthStatus::Ok {
                "request.allowed"
            } else {
                "request.denied"
            },
            status: status.code(),
            resource,
            hostname,
            username,
            rule,
        }
    }
}

/// Emit an audit event.
pub fn emit(event: &AuditEvent<'_>) {
    match serde_json::to_string(event) {
        Ok(ref json) => tracing::info!(audit = %json, "authorization audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_decision_has_allowed_event_type() {
        let event = AuditEvent::decision(AuthStatus::Ok, "/admin", "localhost", Some("alice"), None);
        assert_eq!(event.event, "request.allowed");
        assert_eq!(event.status, 200);
    }

    #[test]
    fn denied_decision_has_denied_event_type() {
        let event =
            AuditEvent::decision(AuthStatus::Forbidden, "/admin", "peer", None, Some("/admin"));
        assert_eq!(event.event, "request.denied");
        assert_eq!(event.status, 403);
    }

    #[test]
    fn events_serialize_to_json() {
        let event = AuditEvent::decision(
            AuthStatus::Unauthorized,
            "/printers/laser",
            "client.example.com",
            None,
            Some("/printers"),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("request.denied"));
        assert!(json.contains("401"));
        // Absent username is omitted entirely
        assert!(!json.contains("username"));
    }

    #[test]
    fn emit_does_not_panic() {
        let event = AuditEvent::decision(AuthStatus::Ok, "/", "localhost", None, None);
        emit(&event);
    }
}
