//! Engine facade consumed by the presentation layer.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::application::api::FeedApi;
use crate::application::dispatcher::{Mutation, MutationDispatcher, MutationOutcome};
use crate::application::error::EngineError;
use crate::application::pipeline::{FIRST_PAGE, FetchOutcome, FetchPipeline};
use crate::cache::{
    CacheConfig, ChangeCause, ChangeHandler, HistoryStore, SubscriptionId, ViewCache, ViewKey,
    ViewSnapshot,
};
use crate::domain::entities::{PostId, UserSummary};
use crate::domain::history::{Revision, fold_history};

pub struct FeedEngine {
    cache: Arc<ViewCache>,
    api: Arc<dyn FeedApi>,
    history: Arc<HistoryStore>,
    pipeline: FetchPipeline,
    dispatcher: MutationDispatcher,
}

impl FeedEngine {
    pub fn new(api: Arc<dyn FeedApi>, config: CacheConfig) -> Self {
        let cache = Arc::new(ViewCache::new());
        let history = Arc::new(HistoryStore::new(&config));
        let pipeline = FetchPipeline::new(cache.clone(), api.clone());
        let dispatcher =
            MutationDispatcher::new(cache.clone(), api.clone(), history.clone(), &config);
        Self {
            cache,
            api,
            history,
            pipeline,
            dispatcher,
        }
    }

    /// Set or clear the signed-in user that mutations act as.
    pub fn set_viewer(&self, viewer: Option<UserSummary>) {
        let signed_in = viewer.as_ref().map(|viewer| viewer.id);
        self.cache
            .update("set_viewer", ChangeCause::Patched, |state| {
                state.viewer = viewer;
                ((), HashSet::new())
            });
        debug!(viewer = ?signed_in, "Viewer changed");
    }

    pub fn viewer(&self) -> Option<UserSummary> {
        self.cache.read("viewer", |state| state.viewer.clone())
    }

    /// Register `handler` for changes to `key` and return the view as cached
    /// now. Nothing is fetched; call [`FeedEngine::load`] or
    /// [`FeedEngine::fetch_page`] for that.
    pub fn subscribe(
        &self,
        key: ViewKey,
        handler: ChangeHandler,
    ) -> (SubscriptionId, ViewSnapshot) {
        self.cache.subscribe(key, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.cache.unsubscribe(id)
    }

    pub fn snapshot(&self, key: &ViewKey) -> Option<ViewSnapshot> {
        self.cache.snapshot(key)
    }

    /// Fetch the first page of `key` unless it is already loaded and fresh.
    pub async fn load(&self, key: &ViewKey) -> Result<Option<FetchOutcome>, EngineError> {
        let fresh = self.cache.read("load", |state| {
            state
                .views
                .get(key)
                .is_some_and(|entry| entry.loaded && !entry.stale)
        });
        if fresh {
            return Ok(None);
        }
        self.fetch_page(key, FIRST_PAGE).await.map(Some)
    }

    pub async fn fetch_page(&self, key: &ViewKey, page: u32) -> Result<FetchOutcome, EngineError> {
        self.pipeline.fetch_page(key, page).await
    }

    pub async fn fetch_responses(
        &self,
        post_id: PostId,
        comment_id: PostId,
        page: u32,
    ) -> Result<FetchOutcome, EngineError> {
        self.pipeline.fetch_responses(post_id, comment_id, page).await
    }

    pub async fn dispatch(&self, mutation: Mutation) -> Result<MutationOutcome, EngineError> {
        self.dispatcher.dispatch(mutation).await
    }

    /// Empty the accumulator of `key` and invalidate its in-flight fetches.
    /// Returns false when the view was never opened.
    pub fn refresh(&self, key: &ViewKey) -> bool {
        let generation = self.cache.update("refresh", ChangeCause::Reset, |state| {
            let generation = state.views.reset(key);
            let touched = generation
                .map(|_| HashSet::from([key.clone()]))
                .unwrap_or_default();
            (generation, touched)
        });
        if let Some(generation) = generation {
            info!(view = %key, generation, "View reset");
        }
        generation.is_some()
    }

    /// Revision timeline of a post, oldest first.
    pub async fn post_history(&self, id: PostId) -> Result<Vec<Revision>, EngineError> {
        if let Some(revisions) = self.history.get(&id) {
            debug!(post_id = %id, "History served from cache");
            return Ok(revisions);
        }
        let revisions = fold_history(self.api.post_history(id).await?);
        self.history.set(id, revisions.clone());
        Ok(revisions)
    }
}
