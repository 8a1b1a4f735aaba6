mod auth;

pub use auth::{AccessToken, DeviceCode, TOKEN_CACHE_FILE};

use super::{WatchedHistoryProvider, WatchedShow};
use crate::config::{SensitiveString, TraktConfig};
use crate::error::Error;
use reqwest::blocking::{Client, Response};
use reqwest::Method;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, trace, warn};

const API_URL: &str = "https://api.trakt.tv";
const API_VERSION: &str = "2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking Trakt.tv API client.
pub struct TraktClient {
    http: Client,
    client_id: String,
    client_secret: SensitiveString,
    access_token: Option<String>,
}

impl TraktClient {
    pub fn new(config: &TraktConfig) -> Result<Self, Error> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            access_token: None,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    fn send<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&T>,
    ) -> Result<Response, Error> {
        let url = format!("{}{}", API_URL, path);
        trace!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, &url)
            .header("content-type", "application/json")
            .header("trakt-api-version", API_VERSION)
            .header("trakt-api-key", &self.client_id);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        Ok(request.send()?)
    }
}

impl WatchedHistoryProvider for TraktClient {
    fn name(&self) -> &str {
        "trakt"
    }

    fn watched_shows(&self, username: &str) -> Result<Vec<WatchedShow>, Error> {
        if !self.is_authenticated() {
            warn!("Fetching Trakt history without an access token, private profiles will fail");
        }
        let path = format!("/users/{}/watched/shows", username);
        let response = self.send::<()>(Method::GET, &path, None)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Provider(format!(
                "GET {} returned {}",
                path, status
            )));
        }

        let body = response.text()?;
        let shows: Vec<WatchedShow> = serde_json::from_str(&body)?;
        debug!("Trakt reported {} watched shows for {}", shows.len(), username);
        Ok(shows)
    }
}
