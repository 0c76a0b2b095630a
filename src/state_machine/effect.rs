//! Effects produced by state transitions

use super::state::TranscriptEntry;
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Tell observers about a newly appended transcript entry
    PublishEntry { entry: TranscriptEntry },

    /// Tell observers the composing flag, node, or choices changed
    PublishState,

    /// Start the typing delay; completes with `ReplyDue { reply_id }`
    ScheduleReply { reply_id: String, delay: Duration },

    /// Cancel the outstanding typing delay, if any
    CancelReply,

    /// Tell observers the whole session was replaced
    PublishReset,
}

impl Effect {
    pub fn publish_entry(entry: TranscriptEntry) -> Self {
        Effect::PublishEntry { entry }
    }

    pub fn schedule_reply(reply_id: impl Into<String>, delay: Duration) -> Self {
        Effect::ScheduleReply {
            reply_id: reply_id.into(),
            delay,
        }
    }
}
