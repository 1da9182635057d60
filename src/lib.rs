//! A small social blogging board: posts (optionally in a group, optionally
//! with an image), comments, and follow edges feeding a personal timeline.
//!
//! Runs as a Spin component backed by the Spin key-value store, or natively
//! on actix-web with an in-memory store (see `src/bin/main.rs`).

pub mod app;
pub mod auth;
pub mod comments;
pub mod common;
pub mod config;
pub mod feed;
pub mod follow;
pub mod forms;
pub mod groups;
pub mod models;
pub mod policy;
pub mod posts;
pub mod router;
#[cfg(not(target_arch = "wasm32"))]
pub mod server;
pub mod users;
pub mod views;

pub use app::{App, RequestContext};
pub use router::handle_request;

#[cfg(target_arch = "wasm32")]
use spin_sdk::{
    http::{IntoResponse, Request},
    http_component,
    key_value::Store,
};

// === Component entrypoint ===
#[cfg(target_arch = "wasm32")]
#[http_component]
fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let settings = config::Settings::from_env();
    let store = Store::open_default()
        .map_err(|e| anyhow::anyhow!("Default key-value store unavailable: {:?}", e))?;

    if settings.seed_demo_data {
        common::db::init_demo_data(&store)?;
    }

    let identity = auth::TokenIdentity::new(settings.token_expiration_hours);
    let app = App::new(&store, &identity, &settings);
    Ok(handle_request(&app, &req))
}
