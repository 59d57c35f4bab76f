pub mod handlers;
pub mod models;
pub mod router;

use crate::settings::SettingsRepository;
use axum_prometheus::PrometheusMetricLayer;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct ApiServer {
    settings: Arc<dyn SettingsRepository>,
}

impl ApiServer {
    pub fn new(settings: Arc<dyn SettingsRepository>) -> Self {
        Self { settings }
    }

    /// Installs the Prometheus recorder, binds the port and starts serving.
    pub async fn run(self, port: u16) -> anyhow::Result<()> {
        let (prometheus_layer, metrics) = PrometheusMetricLayer::pair();
        let app = router::build(self.settings, metrics).layer(prometheus_layer);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("API server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
