mod admin;
mod app;
mod auth;
mod calendar;
mod config;
mod daily;
mod error;
mod exercises;
mod foods;
mod meals;
mod nutrients;
mod photos;
mod points;
mod state;
mod store;
mod streaks;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "duofit=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;
    tracing::info!(
        civil_offset = %app_state.config.civil_offset,
        incremental_meal_saves = app_state.config.scoring.incremental_meal_saves,
        "state ready"
    );

    app::serve(app::build_app(app_state)).await
}
