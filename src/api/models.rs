use serde::Serialize;
use std::collections::BTreeMap;

/// Response for GET /status
#[derive(Debug, Serialize, PartialEq)]
pub struct StatusResponse {
    pub chats: usize,
    pub enabled_chats: usize,
    /// Exchange display name → number of enabled chats scanning it.
    pub exchanges: BTreeMap<String, usize>,
}
