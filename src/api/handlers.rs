use super::models::StatusResponse;
use crate::settings::SettingsRepository;
use axum::{extract::State, response::Json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// GET /health: liveness check
pub async fn health() -> &'static str {
    "OK"
}

/// GET /status: chat and exchange usage from the settings store
pub async fn status(State(settings): State<Arc<dyn SettingsRepository>>) -> Json<StatusResponse> {
    let chats = settings.snapshot();
    let mut exchanges = BTreeMap::new();
    let mut enabled_chats = 0;

    for (_, s) in chats.iter().filter(|(_, s)| s.enabled) {
        enabled_chats += 1;
        for name in &s.exchanges {
            *exchanges.entry(name.clone()).or_insert(0) += 1;
        }
    }

    Json(StatusResponse {
        chats: chats.len(),
        enabled_chats,
        exchanges,
    })
}
