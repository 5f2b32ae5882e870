//! Patch plan generation.
//!
//! Turns a post reference into the list of copies a patch must reach.

use std::fmt;

use super::keys::CopyLocation;
use super::origin::PostRef;

/// Every copy of one post that a mutation patches.
///
/// The entity-store copy covers the home feed, the single-post view, the
/// author's feed, favorites and top-level comments. Responses and tag or
/// search entries are private copies and are listed separately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchPlan {
    pub locations: Vec<CopyLocation>,
}

impl fmt::Display for PatchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let embedded = self
            .locations
            .iter()
            .filter(|location| matches!(location, CopyLocation::Embedded { .. }))
            .count();
        let responses = self
            .locations
            .iter()
            .filter(|location| matches!(location, CopyLocation::Response { .. }))
            .count();
        write!(
            f,
            "PatchPlan {{ locations: {}, embedded: {}, responses: {} }}",
            self.locations.len(),
            embedded,
            responses,
        )
    }
}

impl PatchPlan {
    pub fn for_post(post: &PostRef) -> Self {
        let mut plan = Self::default();
        plan.push(CopyLocation::Entity(post.id));

        if let (Some(thread), Some(comment_id)) = (post.comment_to_id, post.response_to_id) {
            plan.push(CopyLocation::Response {
                thread,
                comment_id,
                post_id: post.id,
            });
        }

        for view in post.origin.embedded_views() {
            plan.push(CopyLocation::Embedded {
                view,
                post_id: post.id,
            });
        }

        plan
    }

    /// Add copies the reference itself does not name.
    pub fn extend(&mut self, locations: impl IntoIterator<Item = CopyLocation>) {
        for location in locations {
            self.push(location);
        }
    }

    fn push(&mut self, location: CopyLocation) {
        if !self.locations.contains(&location) {
            self.locations.push(location);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
