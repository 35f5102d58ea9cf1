use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UrlRequest {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    pub latency_secs: f64,
    pub latency_display: String,
    pub model_size: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub device: String,
    pub model_loaded: bool,
    pub model_id: Option<String>,
    pub model_size: String,
    pub image_size: Option<(usize, usize)>,
}
