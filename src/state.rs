use crate::limiters::Limiters;

// app's shared state
pub struct AppState {
    pub client: reqwest::Client,
    pub upstream: String, // base url, no trailing slash
    pub limiters: Limiters,
}
