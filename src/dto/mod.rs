use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Shared reply envelopes.
pub mod common;
/// Health check body.
pub mod health;
/// Prize pool bodies.
pub mod prize;
/// Quiz bodies.
pub mod question;
/// Session and voting bodies.
pub mod session;
/// Field validators.
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
