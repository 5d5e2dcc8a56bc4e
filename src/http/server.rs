//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the newsletter API and debug routes
//! - Wire up middleware (request id, tracing, metrics, timeout, CORS)
//! - Apply hot-reloaded runtime settings
//! - Serve until shutdown

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{AppConfig, ListenerConfig, RuntimeSettings};
use crate::debug;
use crate::http::articles;
use crate::http::error::ApiError;
use crate::http::request::{make_span, propagate_request_id_layer, set_request_id_layer, track_metrics};
use crate::lifecycle::shutdown::wait as wait_for_shutdown;
use crate::newsletter::{ResolveError, Resolver};
use crate::store::Store;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub settings: Arc<ArcSwap<RuntimeSettings>>,
}

impl AppState {
    pub fn new(store: Store, settings: RuntimeSettings) -> Self {
        Self {
            store: Arc::new(store),
            settings: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    /// Snapshot of the current runtime settings.
    pub fn settings(&self) -> Arc<RuntimeSettings> {
        self.settings.load_full()
    }

    pub fn resolver<'a>(&'a self, settings: &'a RuntimeSettings) -> Resolver<'a, Store> {
        Resolver::new(self.store.as_ref(), &settings.resolver)
    }

    pub fn api_error(&self, error: ResolveError) -> ApiError {
        ApiError::new(error, self.settings.load().debug.expose_errors)
    }
}

/// HTTP server for the newsletter API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server over an opened store.
    pub fn new(config: AppConfig, store: Store) -> Self {
        let state = AppState::new(store, RuntimeSettings::from_config(&config));
        let router = Self::build_router(&config, state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let mut api = Router::new()
            .route(
                "/api/newsletters",
                get(articles::list_newsletters).post(articles::create_newsletter),
            )
            .route(
                "/api/newsletters/{id}",
                get(articles::get_newsletter)
                    .patch(articles::update_newsletter)
                    .delete(articles::delete_newsletter),
            )
            .route("/api/article", get(articles::get_article))
            .route("/health", get(articles::health));

        if config.debug.enabled {
            tracing::info!("Debug routes mounted under /debug");
            api = api.merge(debug::router(state.clone()));
        }

        api.route_layer(middleware::from_fn(track_metrics))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(cors_layer(&config.listener))
    }

    /// The router with state applied, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, applying config reloads.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<AppConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            store = self.state.store.backend_name(),
            "HTTP server starting"
        );

        let settings = self.state.settings.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                let next = RuntimeSettings::from_config(&new_config);
                if **settings.load() != next {
                    settings.store(Arc::new(next));
                    tracing::info!("Applied reloaded resolver and debug settings");
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

fn cors_layer(config: &ListenerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::store::MemoryStore;

    fn server(config: AppConfig) -> HttpServer {
        let store = MemoryStore::new();
        store.insert_text("newsletter:1", r#"{"title":"One"}"#);
        HttpServer::new(config, Store::from(store))
    }

    #[tokio::test]
    async fn test_router_serves_newsletter() {
        let res = server(AppConfig::default())
            .router()
            .oneshot(Request::get("/api/newsletters/1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_debug_routes_follow_config() {
        let res = server(AppConfig::default())
            .router()
            .oneshot(Request::get("/debug/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let mut config = AppConfig::default();
        config.debug.enabled = true;
        config.debug.api_key = "k".into();
        let res = server(config)
            .router()
            .oneshot(
                Request::get("/debug/status")
                    .header("authorization", "Bearer k")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn test_reloaded_settings_are_visible() {
        let server = server(AppConfig::default());
        let mut config = AppConfig::default();
        config.resolver.wildcard_enabled = false;

        server
            .state()
            .settings
            .store(Arc::new(RuntimeSettings::from_config(&config)));
        assert!(!server.state().settings().resolver.wildcard_enabled);
    }
}
