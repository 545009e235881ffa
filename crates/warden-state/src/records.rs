//! The persisted data model
//!
//! A `SessionRecord` is one continuous login instance, identified by the
//! opaque id the session manager announced. Within a session,
//! `SegmentRecord`s track the intervals during which the user was actually
//! engaged (screen unlocked, host awake). Usage accounting sums segment
//! durations, so locked and suspended time costs nothing.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use warden_util::{SessionId, TimeRange};

/// Why a segment was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentCloseReason {
    /// The user locked their screen
    UserLock,
    /// The host suspended
    SystemSleep,
    /// The session ended
    Logout,
    /// Closed by crash recovery: the daemon was not running to observe
    /// the real end
    DaemonOffline,
}

impl fmt::Display for SegmentCloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SegmentCloseReason::UserLock => "user_lock",
            SegmentCloseReason::SystemSleep => "system_sleep",
            SegmentCloseReason::Logout => "logout",
            SegmentCloseReason::DaemonOffline => "daemon_offline",
        };
        f.write_str(s)
    }
}

/// A contiguous engaged interval within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub start: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Local>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SegmentCloseReason>,
}

impl SegmentRecord {
    fn open_at(start: DateTime<Local>) -> Self {
        Self {
            start,
            end: None,
            reason: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Whole seconds covered by this segment; an open segment accrues up
    /// to `now`
    pub fn duration_secs(&self, now: DateTime<Local>) -> i64 {
        let end = self.end.unwrap_or(now);
        (end - self.start).num_seconds().max(0)
    }
}

/// One continuous login instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub start: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Local>>,
    #[serde(default)]
    pub segments: Vec<SegmentRecord>,
}

impl SessionRecord {
    /// Start a new session with its first segment open
    pub fn begin(session_id: SessionId, start: DateTime<Local>) -> Self {
        Self {
            session_id,
            start,
            end: None,
            segments: vec![SegmentRecord::open_at(start)],
        }
    }

    pub fn is_active(&self) -> bool {
        self.end.is_none()
    }

    /// Active with no open segment (locked or asleep)
    pub fn is_idle(&self) -> bool {
        self.is_active() && self.open_segment().is_none()
    }

    /// Active with an open segment (the user is engaged)
    pub fn is_engaged(&self) -> bool {
        self.is_active() && self.open_segment().is_some()
    }

    fn open_segment(&self) -> Option<&SegmentRecord> {
        self.segments.last().filter(|s| s.is_open())
    }

    /// Open a new segment. Refused (returns false) when the session is
    /// ended or already has an open segment, keeping the at-most-one-open
    /// invariant.
    pub fn open_segment_at(&mut self, now: DateTime<Local>) -> bool {
        if !self.is_active() || self.open_segment().is_some() {
            return false;
        }
        self.segments.push(SegmentRecord::open_at(now));
        true
    }

    /// Close the open segment, if any
    pub fn close_segment(&mut self, now: DateTime<Local>, reason: SegmentCloseReason) -> bool {
        match self.segments.last_mut() {
            Some(segment) if segment.is_open() => {
                segment.end = Some(now);
                segment.reason = Some(reason);
                true
            }
            _ => false,
        }
    }

    /// End the session, closing its open segment with the same timestamp
    pub fn close(&mut self, end: DateTime<Local>, reason: SegmentCloseReason) {
        self.end = Some(end);
        self.close_segment(end, reason);
    }

    /// Whole seconds of engaged time across all segments
    pub fn engaged_secs(&self, now: DateTime<Local>) -> i64 {
        self.segments.iter().map(|s| s.duration_secs(now)).sum()
    }
}

/// A temporary policy exception
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    #[serde(default)]
    pub reason: String,
    pub expires_at: DateTime<Local>,
    #[serde(flatten)]
    pub kind: OverrideKind,
}

/// Exactly one of: an extra time budget, or a replacement login window.
/// The untagged + flattened representation keeps the stored document to a
/// single `extra_minutes` or `allowed_hours` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverrideKind {
    ExtraTime { extra_minutes: u32 },
    AllowedHours { allowed_hours: TimeRange },
}

impl Override {
    pub fn extra_time(
        reason: impl Into<String>,
        extra_minutes: u32,
        expires_at: DateTime<Local>,
    ) -> Self {
        Self {
            reason: reason.into(),
            expires_at,
            kind: OverrideKind::ExtraTime { extra_minutes },
        }
    }

    pub fn allowed_hours(
        reason: impl Into<String>,
        allowed_hours: TimeRange,
        expires_at: DateTime<Local>,
    ) -> Self {
        Self {
            reason: reason.into(),
            expires_at,
            kind: OverrideKind::AllowedHours { allowed_hours },
        }
    }

    pub fn is_expired(&self, now: DateTime<Local>) -> bool {
        now > self.expires_at
    }
}

/// Everything tracked for one username
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    #[serde(default)]
    pub overrides: Vec<Override>,
    #[serde(default)]
    pub paused: bool,
}

impl User {
    /// The user's active session, if any
    pub fn active_session(&self) -> Option<&SessionRecord> {
        self.sessions.iter().find(|s| s.is_active())
    }

    /// The active session with the given id
    pub fn active_session_mut(&mut self, id: &SessionId) -> Option<&mut SessionRecord> {
        self.sessions
            .iter_mut()
            .find(|s| s.session_id == *id && s.is_active())
    }

    pub fn add_session(&mut self, id: SessionId, start: DateTime<Local>) {
        self.sessions.push(SessionRecord::begin(id, start));
    }

    /// Engaged seconds across every session whose start falls on `now`'s
    /// calendar day. A session begun yesterday and still open contributes
    /// nothing today; attribution follows the session's start day.
    pub fn seconds_used_today(&self, now: DateTime<Local>) -> i64 {
        let today = now.date_naive();
        self.sessions
            .iter()
            .filter(|s| s.start.date_naive() == today)
            .map(|s| s.engaged_secs(now))
            .sum()
    }

    /// All non-expired replacement login windows
    pub fn active_hours_overrides(&self, now: DateTime<Local>) -> Vec<&TimeRange> {
        self.overrides
            .iter()
            .filter(|o| !o.is_expired(now))
            .filter_map(|o| match &o.kind {
                OverrideKind::AllowedHours { allowed_hours } => Some(allowed_hours),
                OverrideKind::ExtraTime { .. } => None,
            })
            .collect()
    }

    /// Sum of extra minutes across non-expired extra-time overrides
    pub fn extra_minutes(&self, now: DateTime<Local>) -> u64 {
        self.overrides
            .iter()
            .filter(|o| !o.is_expired(now))
            .map(|o| match o.kind {
                OverrideKind::ExtraTime { extra_minutes } => extra_minutes as u64,
                OverrideKind::AllowedHours { .. } => 0,
            })
            .sum()
    }
}

/// The top-level persisted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub users: HashMap<String, User>,
    pub version: u32,
}

impl State {
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            version: 1,
        }
    }

    pub fn user(&self, username: &str) -> Option<&User> {
        self.users.get(username)
    }

    pub fn ensure_user(&mut self, username: &str) -> &mut User {
        self.users.entry(username.to_string()).or_default()
    }

    /// Locate the unique active session with the given id, across users
    pub fn find_active_session_mut(
        &mut self,
        id: &SessionId,
    ) -> Option<(&String, &mut SessionRecord)> {
        self.users
            .iter_mut()
            .find_map(|(name, user)| user.active_session_mut(id).map(|s| (&*name, s)))
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}
