// src/domain/briefing.rs
use chrono::{DateTime, Duration, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{truncate_error, BriefingId, TransitionError, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BriefingStatus {
    Active,
    Paused,
    Queued,
    Processing,
    Error,
    Deleted,
}

/// A user's recurring digest configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Briefing {
    pub id: BriefingId,
    pub user_id: UserId,
    pub name: String,
    pub frequency: Frequency,
    /// Local time of day (in `timezone`) after which the briefing is due.
    pub schedule_time: NaiveTime,
    /// Only consulted for weekly briefings.
    pub schedule_day_of_week: Option<Weekday>,
    /// IANA zone name, e.g. "Europe/Prague".
    pub timezone: String,
    pub status: BriefingStatus,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub queued_at: Option<DateTime<Utc>>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub recipient_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BriefingTransition {
    Queue { at: DateTime<Utc> },
    RevertQueue,
    StartProcessing { at: DateTime<Utc> },
    Complete { at: DateTime<Utc> },
    Fail { message: String },
    MarkStuck { message: String },
}

impl BriefingTransition {
    fn action(&self) -> &'static str {
        match self {
            BriefingTransition::Queue { .. } => "queue",
            BriefingTransition::RevertQueue => "revert queue",
            BriefingTransition::StartProcessing { .. } => "start processing",
            BriefingTransition::Complete { .. } => "complete",
            BriefingTransition::Fail { .. } => "fail",
            BriefingTransition::MarkStuck { .. } => "mark stuck",
        }
    }
}

impl Briefing {
    pub fn new(user_id: UserId, frequency: Frequency, schedule_time: NaiveTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: String::new(),
            frequency,
            schedule_time,
            schedule_day_of_week: None,
            timezone: "UTC".to_string(),
            status: BriefingStatus::Active,
            last_executed_at: None,
            queued_at: None,
            processing_started_at: None,
            error_message: None,
            recipient_email: None,
        }
    }

    pub fn with_timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = tz.into();
        self
    }

    pub fn with_day_of_week(mut self, day: Weekday) -> Self {
        self.schedule_day_of_week = Some(day);
        self
    }

    /// Start of the content window for the next report.
    ///
    /// Never executed: one day back for daily, seven for weekly.
    pub fn lookback_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.last_executed_at {
            Some(last) => last,
            None => match self.frequency {
                Frequency::Daily => now - Duration::days(1),
                Frequency::Weekly => now - Duration::days(7),
            },
        }
    }

    pub fn timestamps_consistent(&self) -> bool {
        match self.status {
            BriefingStatus::Queued => self.queued_at.is_some() && self.processing_started_at.is_none(),
            BriefingStatus::Processing => {
                self.queued_at.is_none() && self.processing_started_at.is_some()
            }
            _ => self.queued_at.is_none() && self.processing_started_at.is_none(),
        }
    }

    pub fn allows(&self, transition: &BriefingTransition) -> bool {
        match transition {
            BriefingTransition::Queue { .. } => self.status == BriefingStatus::Active,
            BriefingTransition::RevertQueue | BriefingTransition::StartProcessing { .. } => {
                self.status == BriefingStatus::Queued
            }
            BriefingTransition::Complete { .. } | BriefingTransition::Fail { .. } => {
                self.status == BriefingStatus::Processing
            }
            BriefingTransition::MarkStuck { .. } => {
                matches!(self.status, BriefingStatus::Queued | BriefingStatus::Processing)
            }
        }
    }

    pub fn apply(&mut self, transition: BriefingTransition) -> Result<(), TransitionError> {
        if !self.allows(&transition) {
            return Err(TransitionError::Precondition {
                entity: "briefing",
                id: self.id,
                action: transition.action(),
                state: format!("{:?}", self.status),
            });
        }

        match transition {
            BriefingTransition::Queue { at } => {
                self.status = BriefingStatus::Queued;
                self.queued_at = Some(at);
                self.processing_started_at = None;
            }
            BriefingTransition::RevertQueue => {
                self.status = BriefingStatus::Active;
                self.clear_timestamps();
            }
            BriefingTransition::StartProcessing { at } => {
                self.status = BriefingStatus::Processing;
                self.queued_at = None;
                self.processing_started_at = Some(at);
            }
            BriefingTransition::Complete { at } => {
                self.status = BriefingStatus::Active;
                self.clear_timestamps();
                self.last_executed_at = Some(at);
                self.error_message = None;
            }
            BriefingTransition::Fail { message } | BriefingTransition::MarkStuck { message } => {
                self.status = BriefingStatus::Error;
                self.clear_timestamps();
                self.error_message = Some(truncate_error(&message));
            }
        }
        Ok(())
    }

    fn clear_timestamps(&mut self) {
        self.queued_at = None;
        self.processing_started_at = None;
    }
}
