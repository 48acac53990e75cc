//! Queue entry model.

use core_metadata::TrackHandle;
use serde::{Deserialize, Serialize};

/// The chat user who submitted a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    /// Host-platform user id.
    pub id: String,
    /// Name shown next to the track in queue listings.
    pub display_name: String,
}

impl Requester {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// One entry in a session's queue.
///
/// The track record is shared with the metadata cache and with every other
/// entry pointing at the same link; only the requester attribution is
/// per-entry.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedTrack {
    pub track: TrackHandle,
    pub requested_by: Requester,
}
