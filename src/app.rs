// app.rs - Shared application state and the router
//
// Every request passes through the access policy middleware before routing.
// Area routers add `area_guard` so a mis-mounted route still cannot escape
// its area's rule.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, Uri},
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::{AppConfig, StoreBackend};
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::handlers;
use crate::insight::{GeminiInsight, InsightGenerator};
use crate::middleware::{access_policy_middleware, area_guard};
use crate::store::{LearningStore, MemoryStore, PgStore, ProfileStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub profiles: Arc<dyn ProfileStore>,
    pub learning: Arc<dyn LearningStore>,
    pub insight: Arc<dyn InsightGenerator>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        profiles: Arc<dyn ProfileStore>,
        learning: Arc<dyn LearningStore>,
        insight: Arc<dyn InsightGenerator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            profiles,
            learning,
            insight,
        }
    }

    /// Build stores and the insight client for the configured backend.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let insight: Arc<dyn InsightGenerator> = Arc::new(GeminiInsight::new(&config.insight)?);
        if config.insight.api_key.is_none() {
            warn!("GOOGLE_GENERATIVE_AI_API_KEY not set; insights will stream the fallback message");
        }

        let state = match config.database.backend {
            StoreBackend::Postgres => {
                let pool = DatabaseManager::connect(&config.database).await?;
                let store = Arc::new(PgStore::new(pool));
                Self::new(config, store.clone(), store, insight)
            }
            StoreBackend::Memory => {
                let store = Arc::new(MemoryStore::new());
                Self::new(config, store.clone(), store, insight)
            }
        };
        info!("Using {} store", state.profiles.backend_name());
        Ok(state)
    }
}

pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    let mut router = Router::new()
        .merge(handlers::public::routes())
        .merge(handlers::dashboard::routes())
        .merge(handlers::admin::routes().route_layer(from_fn(area_guard)))
        .merge(handlers::instructor::routes().route_layer(from_fn(area_guard)))
        .merge(handlers::student::routes().route_layer(from_fn(area_guard)))
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), access_policy_middleware))
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(&config));

    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()))
}
