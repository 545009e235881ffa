//! Conversions from stored records to protocol view types

use chrono::{DateTime, Local};
use warden_api::{OverrideView, SegmentView, SessionView, UserStatus};
use warden_state::{Override, OverrideKind, SessionRecord, State};
use warden_util::{Result, WardenError};

pub fn user_status(state: &State, username: &str, now: DateTime<Local>) -> Result<UserStatus> {
    let user = state
        .user(username)
        .ok_or_else(|| WardenError::user_not_found(username))?;

    Ok(UserStatus {
        username: username.to_string(),
        paused: user.paused,
        seconds_used_today: user.seconds_used_today(now),
        sessions: user.sessions.iter().map(session_view).collect(),
        overrides: user.overrides.iter().map(override_view).collect(),
    })
}

pub fn session_view(session: &SessionRecord) -> SessionView {
    SessionView {
        session_id: session.session_id.clone(),
        start: session.start,
        end: session.end,
        segments: session
            .segments
            .iter()
            .map(|segment| SegmentView {
                start: segment.start,
                end: segment.end,
                reason: segment.reason.map(|r| r.to_string()),
            })
            .collect(),
    }
}

pub fn override_view(ov: &Override) -> OverrideView {
    let (extra_minutes, allowed_hours) = match &ov.kind {
        OverrideKind::ExtraTime { extra_minutes } => (Some(*extra_minutes), None),
        OverrideKind::AllowedHours { allowed_hours } => (None, Some(*allowed_hours)),
    };

    OverrideView {
        reason: ov.reason.clone(),
        expires_at: ov.expires_at,
        extra_minutes,
        allowed_hours,
    }
}
