use std::{process, sync::Arc};

use feedsync::{
    application::{engine::FeedEngine, error::AppError},
    cache::{CacheConfig, ViewKey},
    config,
    domain::entities::UserSummary,
    infra::{http::HttpFeedApi, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

mod cli;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let api = Arc::new(HttpFeedApi::new(&settings.api)?);
    let engine = FeedEngine::new(api, CacheConfig::from(&settings.cache));

    if let Some(viewer_id) = settings.api.viewer_id {
        let key = ViewKey::UserProfile(viewer_id);
        engine.load(&key).await?;
        let profile = engine
            .snapshot(&key)
            .and_then(|snapshot| snapshot.profile().cloned())
            .ok_or_else(|| AppError::unexpected(format!("viewer `{viewer_id}` has no profile")))?;
        info!(viewer = %profile.id, username = %profile.username, "Viewer loaded");
        engine.set_viewer(Some(UserSummary {
            id: profile.id,
            username: profile.username,
            name: profile.name,
            avatar_url: profile.avatar_url,
        }));
    }

    cli::run(&engine, cli_args.command).await
}
