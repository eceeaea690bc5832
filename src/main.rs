//! Competitor tracker service entrypoint.
//! Boots the scheduler and the Axum trigger/status API on Shuttle.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use competitor_tracker::{
    api::{create_router, AppState},
    build_tracker,
    config::Settings,
    logging,
    metrics::Metrics,
    scheduler::{self, SchedulerCfg},
};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    logging::init();

    let settings = Settings::from_env();
    let tracker = build_tracker(&settings)?;

    let _scheduler = scheduler::spawn(tracker.clone(), SchedulerCfg::from_settings(&settings));

    let mut router = create_router(AppState {
        tracker,
        run_budget: settings.run_budget(),
    });
    match Metrics::init().context("metrics disabled") {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "metrics endpoint not mounted"),
    }

    Ok(router.into())
}
