//! Queue items and their lifecycle.
//!
//! Status changes go through `reduce()`, which maps (status, event) to the next
//! status or rejects the event. The audio and error payloads live inside the
//! status, so an item can never hold both.

use std::sync::Arc;

use uuid::Uuid;

use crate::audio::AudioClip;
use crate::processing::Pace;

pub type ItemId = Uuid;

/// Lifecycle status of a queue item.
#[derive(Debug, Clone)]
pub enum ItemStatus {
    Idle,
    Generating,
    Completed { clip: Arc<AudioClip> },
    Error { message: String },
}

impl ItemStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            ItemStatus::Idle => StatusKind::Idle,
            ItemStatus::Generating => StatusKind::Generating,
            ItemStatus::Completed { .. } => StatusKind::Completed,
            ItemStatus::Error { .. } => StatusKind::Error,
        }
    }

    /// Idle and errored items are picked up by the next run.
    pub fn is_pending(&self) -> bool {
        matches!(self, ItemStatus::Idle | ItemStatus::Error { .. })
    }
}

/// Payload-free view of `ItemStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Idle,
    Generating,
    Completed,
    Error,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Idle => "IDLE",
            StatusKind::Generating => "GENERATING",
            StatusKind::Completed => "COMPLETED",
            StatusKind::Error => "ERROR",
        }
    }
}

/// Events that move an item between statuses.
#[derive(Debug, Clone)]
pub enum ItemEvent {
    /// Selected by a run
    Dispatch,
    /// Backend returned valid audio
    Succeed { clip: Arc<AudioClip> },
    /// Backend call or validation failed
    Fail { message: String },
    /// Run was cancelled before this item finished
    Revert,
}

/// Reducer: (status, event) -> next status, or `None` if the event does not
/// apply in this status.
pub fn reduce(status: &ItemStatus, event: ItemEvent) -> Option<ItemStatus> {
    use ItemEvent::*;
    use ItemStatus::*;

    match (status, event) {
        (Idle | Error { .. }, Dispatch) => Some(Generating),
        (Generating, Succeed { clip }) => Some(Completed { clip }),
        (Generating, Fail { message }) => Some(Error { message }),
        (Generating, Revert) => Some(Idle),
        _ => None,
    }
}

/// Parameters for a new queue item. Immutable once queued.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub text: String,
    pub voice: String,
    pub pace: Pace,
    pub instructions: String,
}

/// One unit of synthesizable work.
#[derive(Debug, Clone)]
pub struct QueueItem {
    id: ItemId,
    text: String,
    voice: String,
    pace: Pace,
    instructions: String,
    pub(crate) status: ItemStatus,
}

impl QueueItem {
    pub(crate) fn new(item: NewItem) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: item.text,
            voice: item.voice,
            pace: item.pace,
            instructions: item.instructions,
            status: ItemStatus::Idle,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn pace(&self) -> Pace {
        self.pace
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn status(&self) -> &ItemStatus {
        &self.status
    }

    /// Audio, present only when completed.
    pub fn clip(&self) -> Option<&Arc<AudioClip>> {
        match &self.status {
            ItemStatus::Completed { clip } => Some(clip),
            _ => None,
        }
    }

    /// Failure message, present only when errored.
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            ItemStatus::Error { message } => Some(message),
            _ => None,
        }
    }
}
