//! Threshold evaluation and the monitoring output contract.
//!
//! The output line and exit codes follow the plugin convention the
//! monitoring supervisor parses: `STATE - message | ttl=<seconds>s;<warn>;<crit>;;`
//! with exit codes OK=0, WARNING=1, CRITICAL=2, UNKNOWN=3.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::crl::CrlInfo;

/// Monitoring service state, ordered by severity of the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl State {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Critical => 2,
            Self::Unknown => 3,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower bound levels in seconds: less remaining time is worse, so the
/// warning mark must not be below the critical mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Levels {
    pub warning: i64,
    pub critical: i64,
}

impl Levels {
    pub fn classify(&self, remaining: i64) -> State {
        if remaining <= self.critical {
            State::Critical
        } else if remaining <= self.warning {
            State::Warning
        } else {
            State::Ok
        }
    }
}

/// The `ttl` performance metric with its reference levels.
#[derive(Debug, Clone, Copy)]
pub struct PerfData {
    pub remaining: i64,
    pub levels: Option<Levels>,
}

impl fmt::Display for PerfData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.levels {
            Some(levels) => write!(
                f,
                "ttl={}s;{};{};;",
                self.remaining, levels.warning, levels.critical
            ),
            None => write!(f, "ttl={}s;;;;", self.remaining),
        }
    }
}

/// One finished check: everything needed to print the result line and exit.
#[derive(Debug)]
pub struct CheckResult {
    pub state: State,
    pub summary: String,
    pub perfdata: Option<PerfData>,
}

impl CheckResult {
    /// Result for a run that never produced a TTL: usage, fetch or decode
    /// failure. Carries no perfdata.
    pub fn unknown(summary: impl Into<String>) -> Self {
        Self {
            state: State::Unknown,
            summary: summary.into(),
            perfdata: None,
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.state, self.summary)?;
        if let Some(perfdata) = &self.perfdata {
            write!(f, " | {}", perfdata)?;
        }
        Ok(())
    }
}

/// Classify the decoded CRL against the configured levels at time `now`.
///
/// Without levels the result is always OK, even for a CRL whose next update
/// is already in the past; the raw remaining time still shows up in the
/// message and the perfdata.
pub fn evaluate(crl: &CrlInfo, levels: Option<Levels>, now: DateTime<Utc>) -> CheckResult {
    let remaining = crl.next_update.timestamp() - now.timestamp();
    let state = match levels {
        Some(levels) => levels.classify(remaining),
        None => State::Ok,
    };

    let next_update = crl.next_update.format("%Y-%m-%d %H:%M:%S UTC");
    let summary = if remaining < 0 {
        format!(
            "CRL expired {} ago (next update was {})",
            render_duration(-remaining),
            next_update
        )
    } else {
        format!(
            "CRL expires in {} (next update {})",
            render_duration(remaining),
            next_update
        )
    };

    CheckResult {
        state,
        summary,
        perfdata: Some(PerfData { remaining, levels }),
    }
}

/// Render a span of seconds with its two most significant units, e.g.
/// `15d 6h` or `3m 20s`.
pub fn render_duration(seconds: i64) -> String {
    let total = seconds.unsigned_abs();
    let units = [
        (total / 86_400, "d"),
        (total / 3_600 % 24, "h"),
        (total / 60 % 60, "m"),
        (total % 60, "s"),
    ];

    let mut parts: Vec<String> = units
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, suffix)| format!("{value}{suffix}"))
        .collect();
    if parts.is_empty() {
        return "0s".to_string();
    }
    parts.truncate(2);
    parts.join(" ")
}
