//! Feed view cache.
//!
//! Keeps every copy of a post consistent across the views that show it:
//!
//! - **Entity store**: normalized posts shared by identity views
//! - **Accumulators**: per-view pages merged by page number
//! - **Embedded copies**: tag, search and response entries owned by a view
//!
//! Mutations plan the copies they reach (`PatchPlan`), apply patches through
//! an undo journal (`PatchJournal`) under a single lock and notify
//! subscribers of every affected view.

mod config;
mod events;
mod journal;
mod keys;
mod lock;
mod origin;
mod patch;
mod planner;
mod registry;
mod snapshot;
mod state;
mod store;
mod view;
mod view_cache;

pub use config::CacheConfig;
pub use events::{ChangeCause, ChangeEvent, ChangeHandler, Epoch, SubscriptionId, Subscribers};
pub use journal::PatchJournal;
pub use keys::{CopyLocation, ViewKey, ViewKind};
pub use origin::{Origin, PostRef};
pub use patch::{Patch, PatchFn, PostPatch, ProfilePatch};
pub use planner::PatchPlan;
pub use registry::ViewRegistry;
pub use snapshot::{RenderedComment, RenderedPost, SnapshotContent, ViewSnapshot};
pub use state::CacheState;
pub use store::{EntityStore, HistoryStore, recency_order};
pub use view::{CommentThread, PostList, ResponseList, ViewData, ViewEntry};
pub use view_cache::ViewCache;
