use super::TraktClient;
use crate::error::Error;
use crate::progress::ProgressReporter;
use chrono::{DateTime, Utc};
use reqwest::blocking::Response;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const TOKEN_CACHE_FILE: &str = "trakt.json";
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: String,
    #[serde(default)]
    pub scope: String,
    pub created_at: i64,
}

impl AccessToken {
    pub fn read_from(path: &Path) -> Result<Self, Error> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), Error> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.created_at + self.expires_in < now.timestamp()
    }

    /// True once three quarters of the token lifetime have passed.
    pub fn will_expire_soon(&self, now: DateTime<Utc>) -> bool {
        self.created_at + self.expires_in * 3 / 4 < now.timestamp()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    pub expires_in: u64,
    pub interval: u64,
}

#[derive(Serialize)]
struct DeviceCodeRequest<'a> {
    client_id: &'a str,
}

#[derive(Serialize)]
struct DeviceTokenRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Serialize)]
struct RefreshTokenRequest<'a> {
    refresh_token: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'a str,
}

impl TraktClient {
    /// Obtain an access token, reusing and refreshing the cached one in
    /// `cache_dir` when possible and falling back to the device flow.
    pub fn authenticate(
        &mut self,
        cache_dir: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<(), Error> {
        let cache_file = cache_dir.join(TOKEN_CACHE_FILE);
        let now = Utc::now();

        let token = if cache_file.is_file() {
            let cached = AccessToken::read_from(&cache_file)?;
            if cached.has_expired(now) {
                info!("Cached Trakt token has expired, re-authorizing");
                fs::remove_file(&cache_file)?;
                self.authenticate_with_device_code(reporter)?
            } else if cached.will_expire_soon(now) {
                debug!("Refreshing Trakt token");
                self.refresh_token(&cached)?
            } else {
                cached
            }
        } else {
            self.authenticate_with_device_code(reporter)?
        };

        token.write_to(&cache_file)?;
        self.access_token = Some(token.access_token);
        info!("Successfully authenticated with Trakt");
        Ok(())
    }

    fn refresh_token(&self, token: &AccessToken) -> Result<AccessToken, Error> {
        let payload = RefreshTokenRequest {
            refresh_token: &token.refresh_token,
            client_id: &self.client_id,
            client_secret: self.client_secret.expose(),
            redirect_uri: REDIRECT_URI,
            grant_type: "refresh_token",
        };
        let response = self.send(Method::POST, "/oauth/token", Some(&payload))?;
        match response.status() {
            StatusCode::OK => read_token(response),
            status => Err(Error::Auth(format!("token refresh returned {}", status))),
        }
    }

    fn authenticate_with_device_code(
        &self,
        reporter: &dyn ProgressReporter,
    ) -> Result<AccessToken, Error> {
        let payload = DeviceCodeRequest {
            client_id: &self.client_id,
        };
        let response = self.send(Method::POST, "/oauth/device/code", Some(&payload))?;
        if !response.status().is_success() {
            return Err(Error::Auth(format!(
                "device code request returned {}",
                response.status()
            )));
        }
        let code: DeviceCode = serde_json::from_str(&response.text()?)?;

        info!(
            url = %code.verification_url,
            code = %code.user_code,
            "Authorize series-cleanup on your Trakt account"
        );
        reporter.on_authorization_required(&code.verification_url, &code.user_code);

        let interval = code.interval.max(1);
        let mut waited = 0;
        while waited < code.expires_in {
            if let Some(token) = self.poll_device_token(&code)? {
                return Ok(token);
            }
            thread::sleep(Duration::from_secs(interval));
            waited += interval;
        }

        Err(Error::Auth(
            "device code expired before it was authorized".to_string(),
        ))
    }

    fn poll_device_token(&self, code: &DeviceCode) -> Result<Option<AccessToken>, Error> {
        let payload = DeviceTokenRequest {
            code: &code.device_code,
            client_id: &self.client_id,
            client_secret: self.client_secret.expose(),
        };
        let response = self.send(Method::POST, "/oauth/device/token", Some(&payload))?;
        match response.status() {
            StatusCode::OK => read_token(response).map(Some),
            // Pending, or polling too fast.
            StatusCode::BAD_REQUEST | StatusCode::TOO_MANY_REQUESTS => Ok(None),
            status => {
                warn!("Device token request returned {}", status);
                Err(Error::Auth(format!("device authorization failed with {}", status)))
            }
        }
    }
}

fn read_token(response: Response) -> Result<AccessToken, Error> {
    Ok(serde_json::from_str(&response.text()?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn token(created_at: i64, expires_in: i64) -> AccessToken {
        AccessToken {
            access_token: "access".to_string(),
            token_type: "bearer".to_string(),
            expires_in,
            refresh_token: "refresh".to_string(),
            scope: "public".to_string(),
            created_at,
        }
    }

    #[test]
    fn test_expiry_windows() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let token = token(created.timestamp(), 400);

        let fresh = created + chrono::Duration::seconds(100);
        assert!(!token.has_expired(fresh));
        assert!(!token.will_expire_soon(fresh));

        let late = created + chrono::Duration::seconds(350);
        assert!(!token.has_expired(late));
        assert!(token.will_expire_soon(late));

        let gone = created + chrono::Duration::seconds(500);
        assert!(token.has_expired(gone));
    }

    #[test]
    fn test_token_cache_round_trip_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(TOKEN_CACHE_FILE);
        let original = token(1_700_000_000, 7_776_000);

        original.write_to(&path).unwrap();
        assert_eq!(AccessToken::read_from(&path).unwrap(), original);
    }

    #[test]
    fn test_device_code_payload() {
        let raw = r#"{"device_code":"d","user_code":"ABCD1234","verification_url":"https://trakt.tv/activate","expires_in":600,"interval":5}"#;
        let code: DeviceCode = serde_json::from_str(raw).unwrap();
        assert_eq!(code.user_code, "ABCD1234");
        assert_eq!(code.interval, 5);
    }
}
