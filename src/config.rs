use color_eyre::eyre::Context;
use once_cell::sync::Lazy;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-request timeout. A hung fetch should fail, not block forever.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Ceiling on pages fetched per collection, so a source that keeps
    /// returning non-empty pages can't spin the pagination loop forever.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Trakt page length (the `limit` query parameter).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_trakt_api_url")]
    pub trakt_api_url: String,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36".into()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_pages() -> u32 {
    500
}

fn default_page_size() -> u32 {
    100
}

fn default_trakt_api_url() -> String {
    "https://api.trakt.tv".into()
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenvy::dotenv().ok();
    envy::from_env::<Config>()
        .wrap_err("failed to load config")
        .unwrap()
});
