use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{get, routes, Build, Rocket, State};
use serde::Serialize;

use common::ServerConfig;

use crate::error::BotError;
use crate::pipeline::NewsBot;

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub bot: Arc<NewsBot>,
}

impl AppState {
    pub fn new(bot: Arc<NewsBot>) -> Self {
        Self {
            started_at: Utc::now(),
            bot,
        }
    }
}

/// Response structure for `/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    run_in_progress: bool,
}

/// Trigger one full fetch -> generate -> publish cycle and wait for it.
#[get("/run")]
async fn run_endpoint(state: &State<AppState>) -> Result<String, Custom<String>> {
    match state.bot.run().await {
        Ok(report) => Ok(format!("Bot run completed! Published: {}", report.post.url)),
        Err(BotError::AlreadyRunning) => {
            tracing::warn!("run requested while another run is in progress");
            Err(Custom(Status::Conflict, BotError::AlreadyRunning.to_string()))
        }
        Err(e) => {
            tracing::error!(%e, "bot run failed");
            Err(Custom(Status::InternalServerError, format!("Bot run failed: {}", e)))
        }
    }
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

#[get("/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        run_in_progress: state.bot.is_running(),
    })
}

/// Build the Rocket instance bound to `server.bind:server.port`.
pub fn build_rocket(state: AppState, server: &ServerConfig) -> Rocket<Build> {
    let fig = rocket::Config::figment()
        .merge(("address", server.bind.clone()))
        .merge(("port", server.port));

    rocket::custom(fig)
        .manage(state)
        .mount("/", routes![run_endpoint, health, status])
}

/// Launch the server; blocks until Rocket shuts down.
pub async fn launch_rocket(state: AppState, server: &ServerConfig) -> Result<()> {
    tracing::info!(bind = %server.bind, port = server.port, "Starting Rocket HTTP server");
    build_rocket(state, server)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
