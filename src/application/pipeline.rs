//! Fetch/merge pipeline.
//!
//! Every fetch is tagged with a ticket naming the view and the accumulator
//! generation it started under. On arrival the ticket is checked again: if the
//! view was reset or discarded meanwhile the payload is dropped, otherwise it
//! is normalized into the entity store and merged into the accumulator by
//! page number.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, warn};

use crate::application::api::{
    ApiError, CommentsPage, FeedApi, PostListQuery, PostsPage, ResponsesPage,
};
use crate::application::error::EngineError;
use crate::cache::{
    CacheState, ChangeCause, Patch, PostPatch, ViewCache, ViewData, ViewKey,
};
use crate::domain::entities::{Post, PostId, TagCount, UserProfile};

/// Number of the first page of every paginated view.
pub const FIRST_PAGE: u32 = 0;

const METRIC_FETCH_MERGE_MS: &str = "feedsync_fetch_merge_ms";
const METRIC_FETCH_DISCARDED_TOTAL: &str = "feedsync_fetch_discarded_total";
const METRIC_FETCH_ERROR_TOTAL: &str = "feedsync_fetch_error_total";

/// Identity of one in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub key: ViewKey,
    pub page: u32,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page was merged; `items` counts the entries it carried.
    Merged { items: usize, has_more: bool },
    /// The view changed identity while the request was in flight.
    Discarded,
}

enum Fetched {
    Posts(PostsPage),
    Post(Post),
    Comments(CommentsPage),
    Responses {
        comment_id: PostId,
        page: ResponsesPage,
    },
    Profile(UserProfile),
    Tags(Vec<TagCount>),
}

pub struct FetchPipeline {
    cache: Arc<ViewCache>,
    api: Arc<dyn FeedApi>,
}

impl FetchPipeline {
    pub fn new(cache: Arc<ViewCache>, api: Arc<dyn FeedApi>) -> Self {
        Self { cache, api }
    }

    /// Fetch one page of `key` and merge it.
    pub async fn fetch_page(&self, key: &ViewKey, page: u32) -> Result<FetchOutcome, EngineError> {
        let ticket = self.begin(key, page);
        let result = self.request(key, page).await;
        self.complete(ticket, result)
    }

    /// Fetch one page of responses to `comment_id` and merge it into the
    /// comment thread of `post_id`.
    pub async fn fetch_responses(
        &self,
        post_id: PostId,
        comment_id: PostId,
        page: u32,
    ) -> Result<FetchOutcome, EngineError> {
        let ticket = self.begin(&ViewKey::Comments(post_id), page);
        let result = self
            .api
            .list_responses(post_id, comment_id, page)
            .await
            .map(|page| Fetched::Responses { comment_id, page });
        self.complete(ticket, result)
    }

    fn begin(&self, key: &ViewKey, page: u32) -> FetchTicket {
        let generation = self.cache.update("fetch_begin", ChangeCause::Merged, |state| {
            (state.views.ensure(key).generation, HashSet::new())
        });
        debug!(view = %key, page, generation, "Fetch started");
        FetchTicket {
            key: key.clone(),
            page,
            generation,
        }
    }

    async fn request(&self, key: &ViewKey, page: u32) -> Result<Fetched, ApiError> {
        let query = match key {
            ViewKey::HomeFeed => PostListQuery::Home,
            ViewKey::UserPosts(user_id) => PostListQuery::User(*user_id),
            ViewKey::TagPosts(tag) => PostListQuery::Tag(tag.clone()),
            ViewKey::Search(query) => PostListQuery::Search(query.clone()),
            ViewKey::Favorites => PostListQuery::Favorites,
            ViewKey::Post(id) => return self.api.get_post(*id).await.map(Fetched::Post),
            ViewKey::Comments(post_id) => {
                return self
                    .api
                    .list_comments(*post_id, page)
                    .await
                    .map(Fetched::Comments);
            }
            ViewKey::UserProfile(user_id) => {
                return self.api.get_user(*user_id).await.map(Fetched::Profile);
            }
            ViewKey::PopularTags => return self.api.popular_tags().await.map(Fetched::Tags),
        };
        self.api.list_posts(&query, page).await.map(Fetched::Posts)
    }

    fn complete(
        &self,
        ticket: FetchTicket,
        result: Result<Fetched, ApiError>,
    ) -> Result<FetchOutcome, EngineError> {
        match result {
            Ok(fetched) => Ok(self.merge(&ticket, fetched)),
            Err(error) => {
                let error = EngineError::from(error);
                if self.fail(&ticket, &error) {
                    Err(error)
                } else {
                    Ok(FetchOutcome::Discarded)
                }
            }
        }
    }

    fn merge(&self, ticket: &FetchTicket, fetched: Fetched) -> FetchOutcome {
        let started_at = Instant::now();
        let outcome = self.cache.update("fetch_merge", ChangeCause::Merged, |state| {
            if !is_current(state, ticket) {
                return (FetchOutcome::Discarded, HashSet::new());
            }
            let (outcome, mut touched) = merge_into(state, ticket, fetched);
            if let Some(entry) = state.views.get_mut(&ticket.key) {
                entry.loaded = true;
                entry.error = None;
                entry.stale = false;
            }
            state.views.reindex(&ticket.key);
            touched.insert(ticket.key.clone());
            (outcome, touched)
        });

        match outcome {
            FetchOutcome::Merged { items, has_more } => {
                histogram!(
                    METRIC_FETCH_MERGE_MS,
                    "view" => ticket.key.kind().as_str()
                )
                .record(started_at.elapsed().as_secs_f64() * 1000.0);
                debug!(
                    view = %ticket.key,
                    page = ticket.page,
                    items,
                    has_more,
                    "Fetched page merged"
                );
            }
            FetchOutcome::Discarded => self.record_discard(ticket),
        }
        outcome
    }

    /// Make the failure sticky on the view. Returns false when the view no
    /// longer matches the ticket.
    fn fail(&self, ticket: &FetchTicket, error: &EngineError) -> bool {
        let current = self.cache.update("fetch_fail", ChangeCause::Failed, |state| {
            if !is_current(state, ticket) {
                return (false, HashSet::new());
            }
            if let Some(entry) = state.views.get_mut(&ticket.key) {
                entry.error = Some(error.clone());
            }
            (true, HashSet::from([ticket.key.clone()]))
        });

        if current {
            counter!(
                METRIC_FETCH_ERROR_TOTAL,
                "view" => ticket.key.kind().as_str(),
                "kind" => error.kind()
            )
            .increment(1);
            warn!(
                view = %ticket.key,
                page = ticket.page,
                error = %error,
                "Fetch failed"
            );
        } else {
            self.record_discard(ticket);
        }
        current
    }

    fn record_discard(&self, ticket: &FetchTicket) {
        counter!(
            METRIC_FETCH_DISCARDED_TOTAL,
            "view" => ticket.key.kind().as_str()
        )
        .increment(1);
        debug!(
            view = %ticket.key,
            page = ticket.page,
            generation = ticket.generation,
            "Stale fetch discarded"
        );
    }
}

fn is_current(state: &CacheState, ticket: &FetchTicket) -> bool {
    state
        .views
        .get(&ticket.key)
        .is_some_and(|entry| entry.generation == ticket.generation)
}

fn clamp_count(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn set_counter(state: &mut CacheState, id: &PostId, patch: PostPatch) -> HashSet<ViewKey> {
    if state.store.update(id, &Patch::from(patch)).is_some() {
        state.views.views_for_post(id)
    } else {
        HashSet::new()
    }
}

fn merge_into(
    state: &mut CacheState,
    ticket: &FetchTicket,
    fetched: Fetched,
) -> (FetchOutcome, HashSet<ViewKey>) {
    let page = ticket.page;
    match fetched {
        Fetched::Posts(PostsPage {
            posts,
            has_more,
            total,
        }) => {
            let items = posts.len();
            let mut touched = state.upsert_posts(posts.iter().cloned());
            if let Some(list) = state.views.get_mut(&ticket.key).and_then(|e| e.posts_mut()) {
                list.merge_page(page, &posts, has_more, total);
            }
            touched.insert(ticket.key.clone());
            (FetchOutcome::Merged { items, has_more }, touched)
        }
        Fetched::Post(post) => {
            let touched = state.upsert_posts([post]);
            (
                FetchOutcome::Merged {
                    items: 1,
                    has_more: false,
                },
                touched,
            )
        }
        Fetched::Comments(CommentsPage {
            comments,
            total,
            has_more,
        }) => {
            let items = comments.len();
            let mut touched = state.upsert_posts(comments.iter().cloned());
            if let Some(thread) = state.views.get_mut(&ticket.key).and_then(|e| e.thread_mut()) {
                thread.merge_page(page, &comments, has_more, total);
            }
            if let ViewKey::Comments(post_id) = &ticket.key {
                touched.extend(set_counter(
                    state,
                    post_id,
                    PostPatch {
                        comment_count: Some(clamp_count(total)),
                        ..PostPatch::default()
                    },
                ));
            }
            (FetchOutcome::Merged { items, has_more }, touched)
        }
        Fetched::Responses {
            comment_id,
            page: responses,
        } => {
            let ResponsesPage {
                responses,
                total,
                has_more,
                total_comments,
            } = responses;
            let items = responses.len();
            let mut touched = state.upsert_posts(responses.iter().cloned());
            if let Some(thread) = state.views.get_mut(&ticket.key).and_then(|e| e.thread_mut()) {
                thread
                    .responses_entry(comment_id)
                    .merge_page(page, responses, has_more, total);
            }
            touched.extend(set_counter(
                state,
                &comment_id,
                PostPatch {
                    response_count: Some(clamp_count(total)),
                    ..PostPatch::default()
                },
            ));
            if let ViewKey::Comments(post_id) = &ticket.key {
                touched.extend(set_counter(
                    state,
                    post_id,
                    PostPatch {
                        comment_count: Some(clamp_count(total_comments)),
                        ..PostPatch::default()
                    },
                ));
            }
            (FetchOutcome::Merged { items, has_more }, touched)
        }
        Fetched::Profile(profile) => {
            if let Some(entry) = state.views.get_mut(&ticket.key) {
                entry.data = ViewData::Profile(Some(profile));
            }
            (
                FetchOutcome::Merged {
                    items: 1,
                    has_more: false,
                },
                HashSet::new(),
            )
        }
        Fetched::Tags(tags) => {
            let items = tags.len();
            if let Some(entry) = state.views.get_mut(&ticket.key) {
                entry.data = ViewData::Tags(Some(tags));
            }
            (
                FetchOutcome::Merged {
                    items,
                    has_more: false,
                },
                HashSet::new(),
            )
        }
    }
}
