// src/domain/mod.rs
//! Entities owned by the orchestration core and their state machines.
//!
//! Every status change goes through `apply(transition)` on the entity, so the
//! pairing of a transient status with its timestamp is enforced in one place.

pub mod briefing;
pub mod news_item;
pub mod report;
pub mod source;

use uuid::Uuid;

pub use briefing::{Briefing, BriefingStatus, BriefingTransition, Frequency};
pub use news_item::{NewsItem, NewsItemStatus};
pub use report::{Report, ReportItem, ReportStatus};
pub use source::{FetchStatus, Source, SourceStatus, SourceTransition, SourceType};

pub type SourceId = Uuid;
pub type BriefingId = Uuid;
pub type NewsItemId = Uuid;
pub type ReportId = Uuid;
pub type UserId = Uuid;

/// An attempted state change whose precondition does not hold.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("{entity} {id}: cannot {action} while {state}")]
    Precondition {
        entity: &'static str,
        id: Uuid,
        action: &'static str,
        state: String,
    },
}

/// Max stored length of an error message on any entity.
pub const MAX_ERROR_LEN: usize = 500;

/// Cap an error message to `MAX_ERROR_LEN` chars (char-boundary safe).
pub fn truncate_error(msg: &str) -> String {
    if msg.chars().count() <= MAX_ERROR_LEN {
        return msg.to_string();
    }
    let mut out: String = msg.chars().take(MAX_ERROR_LEN - 3).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_are_kept() {
        assert_eq!(truncate_error("boom"), "boom");
    }

    #[test]
    fn long_messages_are_capped_on_char_boundary() {
        let msg = "é".repeat(MAX_ERROR_LEN * 2);
        let out = truncate_error(&msg);
        assert_eq!(out.chars().count(), MAX_ERROR_LEN);
        assert!(out.ends_with("..."));
    }
}
