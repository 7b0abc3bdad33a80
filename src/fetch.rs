use crate::errors::AppError;
use log::{debug, info};
use reqwest::{Client, StatusCode};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// HTTP client shared by every station in a run. Stations sit on the lab
/// network, so system proxies are ignored.
pub fn build_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .timeout(timeout)
        .no_proxy()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AppError::Transport(format!("build http client: {}", e)))
}

/// GET the station page body.
///
/// Connection problems and timeouts come back as `Transport`, any status
/// other than 200 as `HttpStatus`.
pub async fn fetch_page(client: &Client, url: &str) -> Result<String, AppError> {
    info!("fetching {}", url);
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Transport(format!("{}: {}", url, e)))?;

    let status = resp.status();
    debug!("{} -> {}", url, status);
    if status != StatusCode::OK {
        return Err(AppError::HttpStatus(status.as_u16(), url.to_string()));
    }

    resp.text()
        .await
        .map_err(|e| AppError::Transport(format!("{}: reading body: {}", url, e)))
}
