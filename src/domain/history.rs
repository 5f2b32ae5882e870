//! Folding a post's stored revisions into a readable timeline.

use std::collections::BTreeMap;

use feedsync_api_types::PostHistoryDto;
use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::entities::Media;

/// Everything that changed on a post at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revision {
    pub date: OffsetDateTime,
    pub text: Option<String>,
    pub is_deleted: Option<bool>,
    pub added_media: Vec<Media>,
    pub deleted_media: Vec<Media>,
}

impl Revision {
    fn empty(date: OffsetDateTime) -> Self {
        Self {
            date,
            text: None,
            is_deleted: None,
            added_media: Vec::new(),
            deleted_media: Vec::new(),
        }
    }
}

/// Group text revisions and attachment changes by timestamp, oldest first.
///
/// An attachment appears as added at its creation time and, when removed, as
/// deleted at its last update time.
pub fn fold_history(history: PostHistoryDto) -> Vec<Revision> {
    let mut revisions: BTreeMap<OffsetDateTime, Revision> = BTreeMap::new();

    for change in history.changes {
        let mut revision = Revision::empty(change.created_at);
        revision.text = change.text;
        revision.is_deleted = Some(change.is_deleted);
        revisions.insert(change.created_at, revision);
    }

    for entry in history.media {
        let media = Media::from(entry.media);
        if entry.is_deleted {
            revisions
                .entry(entry.updated_at)
                .or_insert_with(|| Revision::empty(entry.updated_at))
                .deleted_media
                .push(media.clone());
        }
        revisions
            .entry(entry.created_at)
            .or_insert_with(|| Revision::empty(entry.created_at))
            .added_media
            .push(media);
    }

    revisions.into_values().collect()
}
