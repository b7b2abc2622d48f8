//! Freshness evaluator: local import time vs. remote last-updated.
//!
//! Advisory only. It drives status display and the single overwrite
//! confirmation gate in sync/pull; it never blocks an operation on its
//! own.

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    InSync,
    RemoteNewer,
    LocalNewer,
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Freshness::InSync => "In sync",
            Freshness::RemoteNewer => "Remote newer",
            Freshness::LocalNewer => "Local newer",
        })
    }
}

/// Parse a remote timestamp leniently; anything unparseable counts as
/// absent.
pub fn parse_remote_ts(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Classify the local/remote relationship. Missing or unparseable
/// timestamps, and equal instants, are conservatively "In sync" so a
/// half-configured pair never looks alarming.
pub fn evaluate(local: Option<DateTime<Utc>>, remote: Option<&str>) -> Freshness {
    let (Some(local), Some(remote)) = (local, parse_remote_ts(remote)) else {
        return Freshness::InSync;
    };
    match remote.cmp(&local) {
        std::cmp::Ordering::Equal => Freshness::InSync,
        std::cmp::Ordering::Greater => Freshness::RemoteNewer,
        std::cmp::Ordering::Less => Freshness::LocalNewer,
    }
}
