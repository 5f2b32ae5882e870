//! View accumulators.
//!
//! One accumulator per `ViewKey` holds every page merged so far plus the
//! entries inserted locally by mutations. Pages are keyed by page number, so
//! responses landing out of order still render in page order. An id appears
//! in at most one place inside an accumulator.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::application::error::EngineError;
use crate::domain::entities::{Post, PostId, TagCount, UserProfile};

use super::keys::ViewKey;
use super::patch::{Patch, PostPatch};
use super::store::{EntityStore, recency_order};

#[derive(Debug, Clone, Default)]
struct PageSlice {
    ids: Vec<PostId>,
    has_more: bool,
}

// ============================================================================
// Post lists
// ============================================================================

/// Accumulator for recency-ordered post lists.
///
/// Identity lists reference the entity store; tag and search lists keep their
/// own copies in `embedded`.
#[derive(Debug, Clone, Default)]
pub struct PostList {
    pages: BTreeMap<u32, PageSlice>,
    inserted: Vec<PostId>,
    embedded: Option<HashMap<PostId, Post>>,
    total: Option<u64>,
}

impl PostList {
    pub fn new(embeds_copies: bool) -> Self {
        Self {
            embedded: embeds_copies.then(HashMap::new),
            ..Self::default()
        }
    }

    pub fn embeds_copies(&self) -> bool {
        self.embedded.is_some()
    }

    /// Store `posts` as page `page`, replacing what that page held before.
    pub fn merge_page(&mut self, page: u32, posts: &[Post], has_more: bool, total: Option<u64>) {
        let ids: Vec<PostId> = posts.iter().map(|post| post.id).collect();
        let incoming: HashSet<PostId> = ids.iter().copied().collect();

        if let Some(previous) = self.pages.get(&page) {
            let dropped: Vec<PostId> = previous
                .ids
                .iter()
                .filter(|id| !incoming.contains(id))
                .copied()
                .collect();
            if let Some(embedded) = self.embedded.as_mut() {
                for id in dropped {
                    embedded.remove(&id);
                }
            }
        }
        for (other, slice) in self.pages.iter_mut() {
            if *other != page {
                slice.ids.retain(|id| !incoming.contains(id));
            }
        }

        if let Some(embedded) = self.embedded.as_mut() {
            for post in posts {
                embedded.insert(post.id, post.clone());
            }
        }
        self.pages.insert(page, PageSlice { ids, has_more });
        if total.is_some() {
            self.total = total;
        }
    }

    /// Locally insert a post already present in the entity store.
    /// Returns false when the list already shows it.
    pub fn insert(&mut self, id: PostId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.inserted.push(id);
        true
    }

    pub fn remove_inserted(&mut self, id: &PostId) -> bool {
        let before = self.inserted.len();
        self.inserted.retain(|existing| existing != id);
        before != self.inserted.len()
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.inserted.contains(id) || self.pages.values().any(|slice| slice.ids.contains(id))
    }

    /// Patch this list's own copy of `id`. Only embedding lists own copies.
    pub fn patch_embedded(&mut self, id: &PostId, patch: &Patch) -> Option<PostPatch> {
        self.embedded
            .as_mut()
            .and_then(|embedded| embedded.get_mut(id))
            .map(|post| patch.apply_to(post))
    }

    pub fn embedded(&self, id: &PostId) -> Option<&Post> {
        self.embedded.as_ref().and_then(|embedded| embedded.get(id))
    }

    pub fn ids(&self) -> HashSet<PostId> {
        self.inserted
            .iter()
            .chain(self.pages.values().flat_map(|slice| slice.ids.iter()))
            .copied()
            .collect()
    }

    /// Posts in recency order, each id once.
    pub fn render<'a>(&'a self, store: &'a EntityStore) -> Vec<&'a Post> {
        let mut posts: Vec<&Post> = self
            .ids()
            .into_iter()
            .filter_map(|id| match &self.embedded {
                Some(embedded) => embedded.get(&id),
                None => store.get(&id),
            })
            .collect();
        posts.sort_by(|a, b| recency_order(a, b));
        posts
    }

    pub fn has_more(&self) -> bool {
        self.pages
            .last_key_value()
            .is_some_and(|(_, slice)| slice.has_more)
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }
}

// ============================================================================
// Comment threads
// ============================================================================

/// Responses to one top-level comment, in server order with local inserts
/// placed after the response they answer.
#[derive(Debug, Clone, Default)]
pub struct ResponseList {
    pages: BTreeMap<u32, Vec<Post>>,
    page_has_more: BTreeMap<u32, bool>,
    local: Vec<(Option<PostId>, Post)>,
    total: u64,
}

impl ResponseList {
    /// A list with no page fetched yet whose server total is already known.
    pub fn unfetched(total: u64) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn merge_page(&mut self, page: u32, posts: Vec<Post>, has_more: bool, total: u64) {
        let mut slice = Vec::with_capacity(posts.len());
        for post in posts {
            if let Some((_, local)) = self.local.iter_mut().find(|(_, p)| p.id == post.id) {
                *local = post;
                continue;
            }
            for (other, existing) in self.pages.iter_mut() {
                if *other != page {
                    existing.retain(|p| p.id != post.id);
                }
            }
            slice.push(post);
        }
        self.pages.insert(page, slice);
        self.page_has_more.insert(page, has_more);
        self.total = total;
    }

    /// Insert after `after` when it is shown, otherwise at the front.
    pub fn insert(&mut self, post: Post, after: Option<PostId>) -> bool {
        if self.contains(&post.id) {
            return false;
        }
        self.local.push((after, post));
        self.total = self.total.saturating_add(1);
        true
    }

    pub fn remove_local(&mut self, id: &PostId) -> bool {
        let before = self.local.len();
        self.local.retain(|(_, post)| post.id != *id);
        let removed = before != self.local.len();
        if removed {
            self.total = self.total.saturating_sub(1);
        }
        removed
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.local.iter().any(|(_, post)| post.id == *id)
            || self.pages.values().flatten().any(|post| post.id == *id)
    }

    pub fn patch(&mut self, id: &PostId, patch: &Patch) -> Option<PostPatch> {
        self.local
            .iter_mut()
            .map(|(_, post)| post)
            .chain(self.pages.values_mut().flatten())
            .find(|post| post.id == *id)
            .map(|post| patch.apply_to(post))
    }

    pub fn render(&self) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self.pages.values().flatten().collect();
        for (after, post) in &self.local {
            let at = after
                .and_then(|anchor| posts.iter().position(|p| p.id == anchor))
                .map_or(0, |index| index + 1);
            posts.insert(at, post);
        }
        posts
    }

    pub fn has_more(&self) -> bool {
        match self.page_has_more.last_key_value() {
            Some((_, has_more)) => *has_more,
            None => self.total > self.local.len() as u64,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Accumulator for a post's comment thread.
///
/// Top-level comments reference the entity store. Comments created during the
/// session come first, newest first, followed by server pages in order.
#[derive(Debug, Clone, Default)]
pub struct CommentThread {
    pages: BTreeMap<u32, PageSlice>,
    fresh: Vec<PostId>,
    responses: HashMap<PostId, ResponseList>,
    total: u64,
}

impl CommentThread {
    pub fn merge_page(&mut self, page: u32, comments: &[Post], has_more: bool, total: u64) {
        let ids: Vec<PostId> = comments.iter().map(|comment| comment.id).collect();
        let incoming: HashSet<PostId> = ids.iter().copied().collect();
        for (other, slice) in self.pages.iter_mut() {
            if *other != page {
                slice.ids.retain(|id| !incoming.contains(id));
            }
        }
        self.pages.insert(page, PageSlice { ids, has_more });
        self.total = total;
    }

    pub fn insert_fresh(&mut self, id: PostId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.fresh.insert(0, id);
        true
    }

    pub fn remove_fresh(&mut self, id: &PostId) -> bool {
        let before = self.fresh.len();
        self.fresh.retain(|existing| existing != id);
        before != self.fresh.len()
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.fresh.contains(id) || self.pages.values().any(|slice| slice.ids.contains(id))
    }

    /// Top-level comment ids in display order.
    pub fn ordered_ids(&self) -> Vec<PostId> {
        let mut seen: HashSet<PostId> = HashSet::new();
        self.fresh
            .iter()
            .chain(self.pages.values().flat_map(|slice| slice.ids.iter()))
            .filter(|id| seen.insert(**id))
            .copied()
            .collect()
    }

    pub fn is_fresh(&self, id: &PostId) -> bool {
        self.fresh.contains(id)
    }

    pub fn responses(&self, comment_id: &PostId) -> Option<&ResponseList> {
        self.responses.get(comment_id)
    }

    pub fn responses_mut(&mut self, comment_id: &PostId) -> Option<&mut ResponseList> {
        self.responses.get_mut(comment_id)
    }

    pub fn responses_entry(&mut self, comment_id: PostId) -> &mut ResponseList {
        self.responses.entry(comment_id).or_default()
    }

    pub fn remove_responses(&mut self, comment_id: &PostId) -> Option<ResponseList> {
        self.responses.remove(comment_id)
    }

    pub fn has_more(&self) -> bool {
        self.pages
            .last_key_value()
            .is_some_and(|(_, slice)| slice.has_more)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn set_total(&mut self, total: u64) -> u64 {
        std::mem::replace(&mut self.total, total)
    }
}

// ============================================================================
// Entries
// ============================================================================

#[derive(Debug, Clone)]
pub enum ViewData {
    Posts(PostList),
    Thread(CommentThread),
    Single(PostId),
    Profile(Option<UserProfile>),
    Tags(Option<Vec<TagCount>>),
}

impl ViewData {
    fn empty(key: &ViewKey) -> Self {
        match key {
            ViewKey::HomeFeed
            | ViewKey::UserPosts(_)
            | ViewKey::TagPosts(_)
            | ViewKey::Search(_)
            | ViewKey::Favorites => ViewData::Posts(PostList::new(key.holds_embedded_copies())),
            ViewKey::Post(id) => ViewData::Single(*id),
            ViewKey::Comments(_) => ViewData::Thread(CommentThread::default()),
            ViewKey::UserProfile(_) => ViewData::Profile(None),
            ViewKey::PopularTags => ViewData::Tags(None),
        }
    }
}

/// State of one view: its data plus fetch bookkeeping.
#[derive(Debug, Clone)]
pub struct ViewEntry {
    /// Bumped whenever the accumulator is reset; fetches started under an
    /// older generation are discarded on arrival.
    pub generation: u64,
    /// At least one fetch has merged since the last reset.
    pub loaded: bool,
    /// Last fetch failure, cleared by the next successful merge.
    pub error: Option<EngineError>,
    /// Server data is known to be outdated; the next read should refetch.
    pub stale: bool,
    pub data: ViewData,
}

impl ViewEntry {
    pub fn new(key: &ViewKey, generation: u64) -> Self {
        Self {
            generation,
            loaded: false,
            error: None,
            stale: false,
            data: ViewData::empty(key),
        }
    }

    /// Entity-store posts this view displays.
    pub fn referenced_posts(&self) -> HashSet<PostId> {
        match &self.data {
            ViewData::Posts(list) if !list.embeds_copies() => list.ids(),
            ViewData::Thread(thread) => thread.ordered_ids().into_iter().collect(),
            ViewData::Single(id) => HashSet::from([*id]),
            _ => HashSet::new(),
        }
    }

    pub fn posts(&self) -> Option<&PostList> {
        match &self.data {
            ViewData::Posts(list) => Some(list),
            _ => None,
        }
    }

    pub fn thread(&self) -> Option<&CommentThread> {
        match &self.data {
            ViewData::Thread(thread) => Some(thread),
            _ => None,
        }
    }

    pub fn posts_mut(&mut self) -> Option<&mut PostList> {
        match &mut self.data {
            ViewData::Posts(list) => Some(list),
            _ => None,
        }
    }

    pub fn thread_mut(&mut self) -> Option<&mut CommentThread> {
        match &mut self.data {
            ViewData::Thread(thread) => Some(thread),
            _ => None,
        }
    }

    pub fn profile_mut(&mut self) -> Option<&mut UserProfile> {
        match &mut self.data {
            ViewData::Profile(profile) => profile.as_mut(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;
    use crate::domain::entities::PostBody;
    use crate::domain::reaction::Reaction;

    fn post(minutes: i64) -> Post {
        Post {
            id: Uuid::new_v4(),
            created_at: datetime!(2024-05-01 08:00 UTC) + Duration::minutes(minutes),
            updated_at: None,
            original_id: None,
            comment_to_id: None,
            response_to_id: None,
            like_count: 0,
            dislike_count: 0,
            comment_count: 0,
            response_count: 0,
            repost_count: 0,
            viewer_reaction: Reaction::None,
            is_favorite: false,
            can_comment: true,
            body: PostBody::Deleted,
        }
    }

    #[test]
    fn pages_merged_out_of_order_render_by_recency() {
        let newest = post(30);
        let middle = post(20);
        let oldest = post(10);
        let mut store = EntityStore::new();
        store.upsert_all([newest.clone(), middle.clone(), oldest.clone()]);

        let mut list = PostList::new(false);
        list.merge_page(2, &[oldest.clone()], false, None);
        list.merge_page(1, &[newest.clone(), middle.clone()], true, None);

        let ids: Vec<PostId> = list.render(&store).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![newest.id, middle.id, oldest.id]);
        assert!(!list.has_more());
    }

    #[test]
    fn remerging_a_page_moves_duplicates() {
        let shifted = post(10);
        let mut list = PostList::new(true);
        list.merge_page(1, &[shifted.clone()], true, None);
        list.merge_page(2, &[shifted.clone()], false, None);

        let store = EntityStore::new();
        assert_eq!(list.render(&store).len(), 1);
        assert_eq!(list.ids().len(), 1);
    }

    #[test]
    fn embedded_copies_are_private() {
        let tagged = post(0);
        let mut list = PostList::new(true);
        list.merge_page(1, &[tagged.clone()], false, None);

        let inverse = list.patch_embedded(
            &tagged.id,
            &Patch::from(PostPatch {
                repost_count: Some(4),
                ..PostPatch::default()
            }),
        );
        assert!(inverse.is_some());
        assert_eq!(list.embedded(&tagged.id).map(|p| p.repost_count), Some(4));

        let mut identity = PostList::new(false);
        identity.merge_page(1, &[tagged.clone()], false, None);
        assert!(
            identity
                .patch_embedded(&tagged.id, &Patch::from(PostPatch::tombstone()))
                .is_none()
        );
    }

    #[test]
    fn local_insert_is_deduplicated_and_removable() {
        let existing = post(0);
        let mut list = PostList::new(false);
        list.merge_page(1, &[existing.clone()], false, None);

        assert!(!list.insert(existing.id));
        let created = Uuid::new_v4();
        assert!(list.insert(created));
        assert!(list.contains(&created));
        assert!(list.remove_inserted(&created));
        assert!(!list.contains(&created));
    }

    #[test]
    fn fresh_comments_come_first_newest_first() {
        let server_a = post(0);
        let server_b = post(1);
        let mut thread = CommentThread::default();
        thread.merge_page(1, &[server_a.clone(), server_b.clone()], false, 2);

        let first_fresh = Uuid::new_v4();
        let second_fresh = Uuid::new_v4();
        thread.insert_fresh(first_fresh);
        thread.insert_fresh(second_fresh);

        assert_eq!(
            thread.ordered_ids(),
            vec![second_fresh, first_fresh, server_a.id, server_b.id]
        );
    }

    #[test]
    fn response_is_placed_after_the_response_it_answers() {
        let first = post(0);
        let second = post(1);
        let mut responses = ResponseList::default();
        responses.merge_page(1, vec![first.clone(), second.clone()], false, 2);

        let reply = post(2);
        responses.insert(reply.clone(), Some(first.id));
        let orphan = post(3);
        responses.insert(orphan.clone(), Some(Uuid::new_v4()));

        let ids: Vec<PostId> = responses.render().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![orphan.id, first.id, reply.id, second.id]);
        assert_eq!(responses.total(), 4);

        assert!(responses.remove_local(&reply.id));
        assert_eq!(responses.total(), 3);
    }

    #[test]
    fn has_more_follows_the_highest_page() {
        let mut list = PostList::new(false);
        list.merge_page(1, &[post(10)], false, None);
        list.merge_page(0, &[post(20)], true, None);
        assert!(!list.has_more());

        list.merge_page(2, &[post(5)], true, None);
        assert!(list.has_more());
    }

    #[test]
    fn unfetched_list_keeps_the_server_total() {
        let mut responses = ResponseList::unfetched(5);
        assert!(responses.has_more());

        let reply = post(0);
        assert!(responses.insert(reply.clone(), None));
        assert_eq!(responses.total(), 6);
        assert_eq!(responses.render().len(), 1);
        assert!(responses.has_more());

        responses.merge_page(1, vec![post(1)], false, 6);
        assert!(!responses.has_more());
        assert!(!ResponseList::unfetched(0).has_more());
    }

    #[test]
    fn server_copy_of_a_local_response_replaces_it_in_place() {
        let anchor = post(0);
        let mut responses = ResponseList::default();
        responses.merge_page(1, vec![anchor.clone()], false, 1);

        let mut reply = post(1);
        responses.insert(reply.clone(), Some(anchor.id));
        reply.like_count = 2;
        responses.merge_page(1, vec![anchor.clone(), reply.clone()], false, 2);

        let rendered = responses.render();
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[1].id, reply.id);
        assert_eq!(rendered[1].like_count, 2);
    }
}
