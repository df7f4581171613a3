//! sbn-admin library - store broadcast network admin service
//!
//! HTTP surface over the shared core: frequency rule editing, the broadcast
//! calendar view and playlist integrity reconciliation against the broadcast
//! server.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use sbn_common::events::EventBus;
use sbn_common::reconciler::{CleanupTracker, Reconciler};

pub mod api;
pub mod audit;
pub mod client;
pub mod config;
pub mod error;

pub use client::BroadcastServerClient;
pub use error::ApiError;

/// Event channel capacity
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Frequency rule database
    pub db: SqlitePool,
    pub events: EventBus,
    /// Reconciler over the broadcast server client
    pub reconciler: Arc<Reconciler<BroadcastServerClient>>,
    /// In-flight guard for cleanup requests
    pub cleanups: CleanupTracker,
}

impl AppState {
    pub fn new(db: SqlitePool, client: BroadcastServerClient, events: EventBus) -> Self {
        Self {
            db,
            reconciler: Arc::new(Reconciler::new(client, events.clone())),
            cleanups: CleanupTracker::with_events(events.clone()),
            events,
        }
    }

    pub fn client(&self) -> &BroadcastServerClient {
        self.reconciler.store()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/api/frequency-rules", get(api::list_rules))
        .route(
            "/api/frequency-rules/:group",
            get(api::get_rule).patch(api::update_rule),
        )
        .route("/api/calendar", get(api::get_calendar))
        .route("/api/playlists/:id/integrity", get(api::check_integrity))
        .route("/api/playlists/:id/clean", post(api::clean_playlist))
        .route("/api/playlists/:id/clean/state", get(api::cleanup_state))
        .route("/api/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
