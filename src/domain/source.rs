// src/domain/source.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{truncate_error, BriefingId, SourceId, TransitionError, UserId};

/// Strategy selector for fetching a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Rss,
    Website,
    Reddit,
    Email,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Rss => write!(f, "RSS"),
            SourceType::Website => write!(f, "WEBSITE"),
            SourceType::Reddit => write!(f, "REDDIT"),
            SourceType::Email => write!(f, "EMAIL"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RSS" => Ok(SourceType::Rss),
            "WEBSITE" => Ok(SourceType::Website),
            "REDDIT" => Ok(SourceType::Reddit),
            "EMAIL" => Ok(SourceType::Email),
            _ => Err(format!("Invalid source type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceStatus {
    Active,
    Paused,
    Error,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchStatus {
    Idle,
    Queued,
    Fetching,
}

/// A content origin owned by exactly one briefing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub briefing_id: BriefingId,
    /// Owner of the parent briefing, denormalized for admission filtering.
    pub owner_id: UserId,
    pub name: String,
    pub source_type: SourceType,
    /// Feed URL, page URL, subreddit name or inbox address depending on type.
    pub url: String,
    pub status: SourceStatus,
    pub fetch_status: FetchStatus,
    pub refresh_interval_minutes: i64,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub queued_at: Option<DateTime<Utc>>,
    pub fetch_started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// One edge of the fetch state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceTransition {
    Queue { at: DateTime<Utc> },
    RevertQueue,
    StartFetch { at: DateTime<Utc> },
    CompleteFetch { at: DateTime<Utc> },
    FailFetch { error: String },
    ResetIdle,
}

impl SourceTransition {
    fn action(&self) -> &'static str {
        match self {
            SourceTransition::Queue { .. } => "queue",
            SourceTransition::RevertQueue => "revert queue",
            SourceTransition::StartFetch { .. } => "start fetch",
            SourceTransition::CompleteFetch { .. } => "complete fetch",
            SourceTransition::FailFetch { .. } => "fail fetch",
            SourceTransition::ResetIdle => "reset",
        }
    }
}

impl Source {
    pub const DEFAULT_REFRESH_INTERVAL_MINUTES: i64 = 60;

    pub fn new(
        briefing_id: BriefingId,
        owner_id: UserId,
        source_type: SourceType,
        url: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            id: Uuid::new_v4(),
            briefing_id,
            owner_id,
            name: url.clone(),
            source_type,
            url,
            status: SourceStatus::Active,
            fetch_status: FetchStatus::Idle,
            refresh_interval_minutes: Self::DEFAULT_REFRESH_INTERVAL_MINUTES,
            last_fetched_at: None,
            queued_at: None,
            fetch_started_at: None,
            last_error: None,
        }
    }

    pub fn with_refresh_interval(mut self, minutes: i64) -> Self {
        self.refresh_interval_minutes = minutes;
        self
    }

    pub fn with_last_fetched_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_fetched_at = Some(at);
        self
    }

    /// Never-fetched sources are always due; otherwise once the refresh interval elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_fetched_at {
            None => true,
            Some(last) => now >= last + Duration::minutes(self.refresh_interval_minutes.max(0)),
        }
    }

    pub fn is_first_import(&self) -> bool {
        self.last_fetched_at.is_none()
    }

    /// QUEUED ⇔ only `queued_at`, FETCHING ⇔ only `fetch_started_at`, IDLE ⇔ neither.
    pub fn timestamps_consistent(&self) -> bool {
        match self.fetch_status {
            FetchStatus::Idle => self.queued_at.is_none() && self.fetch_started_at.is_none(),
            FetchStatus::Queued => self.queued_at.is_some() && self.fetch_started_at.is_none(),
            FetchStatus::Fetching => self.queued_at.is_none() && self.fetch_started_at.is_some(),
        }
    }

    /// ACTIVE, or ERROR awaiting a retry. PAUSED and DELETED are never fetched.
    pub fn is_fetchable(&self) -> bool {
        matches!(self.status, SourceStatus::Active | SourceStatus::Error)
    }

    /// Whether `transition` may be applied to the current state.
    pub fn allows(&self, transition: &SourceTransition) -> bool {
        match transition {
            SourceTransition::Queue { .. } => {
                self.is_fetchable() && self.fetch_status == FetchStatus::Idle
            }
            SourceTransition::RevertQueue => self.fetch_status == FetchStatus::Queued,
            SourceTransition::StartFetch { .. } => {
                self.is_fetchable()
                    && matches!(self.fetch_status, FetchStatus::Queued | FetchStatus::Idle)
            }
            SourceTransition::CompleteFetch { .. } | SourceTransition::FailFetch { .. } => {
                self.fetch_status == FetchStatus::Fetching
            }
            SourceTransition::ResetIdle => true,
        }
    }

    pub fn apply(&mut self, transition: SourceTransition) -> Result<(), TransitionError> {
        if !self.allows(&transition) {
            return Err(TransitionError::Precondition {
                entity: "source",
                id: self.id,
                action: transition.action(),
                state: format!("{:?}/{:?}", self.status, self.fetch_status),
            });
        }

        match transition {
            SourceTransition::Queue { at } => {
                self.fetch_status = FetchStatus::Queued;
                self.queued_at = Some(at);
                self.fetch_started_at = None;
            }
            SourceTransition::RevertQueue | SourceTransition::ResetIdle => {
                self.clear_fetch_state();
            }
            SourceTransition::StartFetch { at } => {
                self.fetch_status = FetchStatus::Fetching;
                self.queued_at = None;
                self.fetch_started_at = Some(at);
            }
            SourceTransition::CompleteFetch { at } => {
                self.clear_fetch_state();
                self.last_fetched_at = Some(at);
                self.last_error = None;
                if self.status == SourceStatus::Error {
                    self.status = SourceStatus::Active;
                }
            }
            SourceTransition::FailFetch { error } => {
                self.clear_fetch_state();
                self.status = SourceStatus::Error;
                self.last_error = Some(truncate_error(&error));
            }
        }
        Ok(())
    }

    fn clear_fetch_state(&mut self) {
        self.fetch_status = FetchStatus::Idle;
        self.queued_at = None;
        self.fetch_started_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source() -> Source {
        Source::new(Uuid::new_v4(), Uuid::new_v4(), SourceType::Rss, "https://example.com/feed")
    }

    #[test]
    fn never_fetched_source_is_due() {
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        assert!(source().is_due(now));
    }

    #[test]
    fn due_only_after_refresh_interval() {
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        let s = source().with_refresh_interval(30).with_last_fetched_at(t0);
        assert!(!s.is_due(t0 + Duration::minutes(29)));
        assert!(s.is_due(t0 + Duration::minutes(30)));
    }

    #[test]
    fn full_fetch_cycle_keeps_timestamps_consistent() {
        let now = Utc::now();
        let mut s = source();
        assert!(s.timestamps_consistent());

        s.apply(SourceTransition::Queue { at: now }).unwrap();
        assert_eq!(s.fetch_status, FetchStatus::Queued);
        assert!(s.timestamps_consistent());

        s.apply(SourceTransition::StartFetch { at: now }).unwrap();
        assert_eq!(s.fetch_status, FetchStatus::Fetching);
        assert!(s.timestamps_consistent());

        s.apply(SourceTransition::CompleteFetch { at: now }).unwrap();
        assert_eq!(s.fetch_status, FetchStatus::Idle);
        assert_eq!(s.last_fetched_at, Some(now));
        assert!(s.timestamps_consistent());
    }

    #[test]
    fn failed_fetch_marks_error_and_success_clears_it() {
        let now = Utc::now();
        let mut s = source();
        s.apply(SourceTransition::StartFetch { at: now }).unwrap();
        s.apply(SourceTransition::FailFetch { error: "timeout".into() }).unwrap();
        assert_eq!(s.status, SourceStatus::Error);
        assert_eq!(s.fetch_status, FetchStatus::Idle);
        assert_eq!(s.last_error.as_deref(), Some("timeout"));
        assert!(s.timestamps_consistent());

        s.apply(SourceTransition::StartFetch { at: now }).unwrap();
        s.apply(SourceTransition::CompleteFetch { at: now }).unwrap();
        assert_eq!(s.status, SourceStatus::Active);
        assert!(s.last_error.is_none());
    }

    #[test]
    fn cannot_queue_twice_or_queue_paused() {
        let now = Utc::now();
        let mut s = source();
        s.apply(SourceTransition::Queue { at: now }).unwrap();
        assert!(s.apply(SourceTransition::Queue { at: now }).is_err());

        let mut paused = source();
        paused.status = SourceStatus::Paused;
        assert!(paused.apply(SourceTransition::Queue { at: now }).is_err());

        let mut failed = source();
        failed.status = SourceStatus::Error;
        assert!(failed.apply(SourceTransition::Queue { at: now }).is_ok());
        assert_eq!(failed.status, SourceStatus::Error);
    }

    #[test]
    fn complete_requires_fetching() {
        let mut s = source();
        let err = s
            .apply(SourceTransition::CompleteFetch { at: Utc::now() })
            .unwrap_err();
        assert!(err.to_string().contains("complete fetch"));
    }

    #[test]
    fn source_type_parses_case_insensitive() {
        assert_eq!("reddit".parse::<SourceType>().unwrap(), SourceType::Reddit);
        assert_eq!(SourceType::Rss.to_string(), "RSS");
        assert!("gopher".parse::<SourceType>().is_err());
    }
}
