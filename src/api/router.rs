use super::handlers;
use crate::settings::SettingsRepository;
use axum::routing::get;
use axum::Router;
use axum_prometheus::metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Builds the ops router: liveness, settings usage and Prometheus metrics.
pub fn build(settings: Arc<dyn SettingsRepository>, metrics: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .with_state(settings)
        .route("/metrics", get(move || std::future::ready(metrics.render())))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{SettingsStore, UserSettings};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum_prometheus::metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn app() -> Router {
        let store = SettingsStore::in_memory(UserSettings {
            threshold: 0.3,
            exchanges: vec!["Binance".into()],
            blacklist: vec![],
            enabled: true,
            interval: 60,
        });
        let handle = PrometheusBuilder::new().build_recorder().handle();
        build(Arc::new(store), handle)
    }

    async fn get_body(uri: &str) -> (StatusCode, String) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_answers_ok() {
        assert_eq!(get_body("/health").await, (StatusCode::OK, "OK".to_string()));
    }

    #[tokio::test]
    async fn status_is_json() {
        let (status, body) = get_body("/status").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["chats"], 0);
    }

    #[tokio::test]
    async fn metrics_route_is_served() {
        let (status, _) = get_body("/metrics").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let (status, _) = get_body("/scores").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
