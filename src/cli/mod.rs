//! Subcommand handlers of the feedsync binary.

mod print;

use feedsync::{
    application::{
        dispatcher::{Mutation, MutationOutcome, NewPost, PostChanges},
        engine::FeedEngine,
        error::{AppError, EngineError},
        pipeline::{FIRST_PAGE, FetchOutcome},
    },
    cache::{PostRef, ViewKey, ViewSnapshot},
    config::{
        CommentsArgs, Command, CreateArgs, EditArgs, FeedArgs, PostArgs, ReactArgs, UserArgs,
    },
    domain::reaction::Vote,
};
use serde::Serialize;

use self::print::print_json;

#[derive(Serialize)]
struct ViewOutput<'a, T: Serialize> {
    view: String,
    has_more: bool,
    total: Option<u64>,
    items: &'a T,
}

pub async fn run(engine: &FeedEngine, command: Command) -> Result<(), AppError> {
    match command {
        Command::Feed(args) => feed(engine, args).await,
        Command::Post(PostArgs { id }) => show(engine, ViewKey::Post(id)).await,
        Command::Comments(args) => comments(engine, args).await,
        Command::Create(args) => create(engine, args).await,
        Command::React(args) => react(engine, args).await,
        Command::Favorite(PostArgs { id }) => {
            mutate(engine, Mutation::Favorite { post: PostRef::id(id) }).await
        }
        Command::Edit(args) => edit(engine, args).await,
        Command::Delete(PostArgs { id }) => {
            mutate(engine, Mutation::Delete { post: PostRef::id(id) }).await
        }
        Command::Follow(UserArgs { id }) => {
            engine.load(&ViewKey::UserProfile(id)).await?;
            mutate(engine, Mutation::Follow { user_id: id }).await?;
            show(engine, ViewKey::UserProfile(id)).await
        }
        Command::Unfollow(UserArgs { id }) => {
            engine.load(&ViewKey::UserProfile(id)).await?;
            mutate(engine, Mutation::Unfollow { user_id: id }).await?;
            show(engine, ViewKey::UserProfile(id)).await
        }
        Command::Profile(UserArgs { id }) => show(engine, ViewKey::UserProfile(id)).await,
        Command::History(PostArgs { id }) => print_json(&engine.post_history(id).await?),
        Command::Tags => show(engine, ViewKey::PopularTags).await,
    }
}

fn feed_key(args: &FeedArgs) -> ViewKey {
    if let Some(user) = args.user {
        ViewKey::UserPosts(user)
    } else if let Some(tag) = &args.tag {
        ViewKey::TagPosts(tag.clone())
    } else if let Some(query) = &args.search {
        ViewKey::Search(query.clone())
    } else if args.favorites {
        ViewKey::Favorites
    } else {
        ViewKey::HomeFeed
    }
}

async fn load_pages(engine: &FeedEngine, key: &ViewKey, pages: u32) -> Result<(), EngineError> {
    for page in FIRST_PAGE..FIRST_PAGE.saturating_add(pages.max(1)) {
        match engine.fetch_page(key, page).await? {
            FetchOutcome::Merged { has_more: true, .. } => {}
            FetchOutcome::Merged { has_more: false, .. } | FetchOutcome::Discarded => break,
        }
    }
    Ok(())
}

fn current(engine: &FeedEngine, key: &ViewKey) -> Result<ViewSnapshot, AppError> {
    let snapshot = engine
        .snapshot(key)
        .ok_or_else(|| AppError::unexpected(format!("view `{key}` is not cached")))?;
    match &snapshot.error {
        Some(error) => Err(error.clone().into()),
        None => Ok(snapshot),
    }
}

fn print_view(snapshot: &ViewSnapshot) -> Result<(), AppError> {
    print_json(&ViewOutput {
        view: snapshot.key.to_string(),
        has_more: snapshot.has_more,
        total: snapshot.total,
        items: &snapshot.content,
    })
}

async fn show(engine: &FeedEngine, key: ViewKey) -> Result<(), AppError> {
    engine.load(&key).await?;
    print_view(&current(engine, &key)?)
}

async fn feed(engine: &FeedEngine, args: FeedArgs) -> Result<(), AppError> {
    let key = feed_key(&args);
    load_pages(engine, &key, args.pages).await?;
    print_view(&current(engine, &key)?)
}

async fn comments(engine: &FeedEngine, args: CommentsArgs) -> Result<(), AppError> {
    let key = ViewKey::Comments(args.id);
    load_pages(engine, &key, args.pages).await?;
    if let Some(comment_id) = args.responses_of {
        engine
            .fetch_responses(args.id, comment_id, FIRST_PAGE)
            .await?;
    }
    print_view(&current(engine, &key)?)
}

async fn mutate(engine: &FeedEngine, mutation: Mutation) -> Result<(), AppError> {
    let outcome = engine.dispatch(mutation).await?;
    match outcome {
        MutationOutcome::Applied => print_json(&serde_json::json!({ "status": "ok" })),
        MutationOutcome::Created(id) => print_json(&serde_json::json!({ "id": id })),
    }
}

async fn create(engine: &FeedEngine, args: CreateArgs) -> Result<(), AppError> {
    let mut post = NewPost::text(args.text);
    post.can_comment = !args.no_comments;
    let post = match (args.comment_on, args.respond_to, args.repost_of) {
        (Some(thread), Some(comment), _) => post.respond_to(thread, comment, None),
        (Some(thread), None, _) => post.comment_on(thread),
        (None, _, Some(original)) => post.repost_of(PostRef::id(original)),
        (None, _, None) => post,
    };
    mutate(engine, Mutation::Create(post)).await
}

async fn react(engine: &FeedEngine, args: ReactArgs) -> Result<(), AppError> {
    let key = ViewKey::Post(args.id);
    engine.load(&key).await?;
    let mut post = PostRef::id(args.id);
    post.comment_to_id = args.comment_to;
    post.response_to_id = args.response_to;
    let vote = if args.dislike { Vote::Dislike } else { Vote::Like };
    engine.dispatch(Mutation::React { post, vote }).await?;
    print_view(&current(engine, &key)?)
}

async fn edit(engine: &FeedEngine, args: EditArgs) -> Result<(), AppError> {
    let key = ViewKey::Post(args.id);
    engine.load(&key).await?;
    let changes = PostChanges {
        text: args.text,
        can_comment: args.can_comment,
        media: None,
    };
    engine
        .dispatch(Mutation::Edit {
            post: PostRef::id(args.id),
            changes,
        })
        .await?;
    print_view(&current(engine, &key)?)
}
