//! Google Music client (ClientLogin + skyjam endpoints).

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;
use std::time::Duration;
use tracing::debug;

use crate::service::{MusicService, ServiceError};
use crate::track::{non_zero, TrackId, TrackInfo};

// The mplay signing key is the XOR of these two blobs.
const KEY_PART_1: &str =
    "VzeC4H4h+T2f0VI180nVX8x+Mb5HiTtGnKgH52Otj8ZCGDz9jRWyHb6QXK0JskSiOgzQfwTY5xgLLSdUSreaLVMsVVWfxfa8Rw==";
const KEY_PART_2: &str =
    "ZAPnhUkYwQ6y5DdQxWThbvhJHN8msQ1rqJw0ggKdufQjelrKuiGGJI30aswkgCWTDyHkTGK9ynlqTkJ5L4CiGGUabGeo8M6JTQ==";

/// Base URLs of the three endpoints the client talks to.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub login: String,
    pub fetch_track: String,
    pub stream: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            login: "https://www.google.com/accounts/ClientLogin".to_string(),
            fetch_track: "https://mclients.googleapis.com/sj/v2.5/fetchtrack".to_string(),
            stream: "https://android.clients.google.com/music/mplay".to_string(),
        }
    }
}

impl GoogleEndpoints {
    /// All endpoints rooted at `base` (`{base}/login`, `{base}/fetchtrack`,
    /// `{base}/mplay`); used against local mock servers.
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            login: format!("{}/login", base),
            fetch_track: format!("{}/fetchtrack", base),
            stream: format!("{}/mplay", base),
        }
    }
}

/// fetchtrack response (only the consumed fields)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackDto {
    #[serde(default)]
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    album: String,
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    track_number: Option<u32>,
    #[serde(default)]
    nid: Option<String>,
    #[serde(default)]
    store_id: Option<String>,
}

impl TrackDto {
    fn into_track_info(self, requested: &TrackId) -> TrackInfo {
        let nid = self
            .store_id
            .or(self.nid)
            .unwrap_or_else(|| requested.as_str().to_string());
        TrackInfo {
            title: self.title,
            artist: self.artist,
            album: self.album,
            year: non_zero(self.year),
            track_number: non_zero(self.track_number),
            nid,
        }
    }
}

pub struct GoogleMusicClient {
    http: reqwest::Client,
    /// mplay answers with a redirect whose Location is the signed URL.
    no_redirect: reqwest::Client,
    endpoints: GoogleEndpoints,
    signing_key: Vec<u8>,
    auth_token: Option<String>,
}

impl GoogleMusicClient {
    pub fn new(timeout: Option<Duration>) -> Result<Self, ServiceError> {
        Self::with_endpoints(GoogleEndpoints::default(), timeout)
    }

    pub fn with_endpoints(
        endpoints: GoogleEndpoints,
        timeout: Option<Duration>,
    ) -> Result<Self, ServiceError> {
        let mut http = reqwest::Client::builder();
        let mut no_redirect = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = timeout {
            http = http.timeout(timeout);
            no_redirect = no_redirect.timeout(timeout);
        }
        let build_err = |source| ServiceError::Request {
            endpoint: "client",
            source,
        };

        Ok(Self {
            http: http.build().map_err(build_err)?,
            no_redirect: no_redirect.build().map_err(build_err)?,
            endpoints,
            signing_key: signing_key()?,
            auth_token: None,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_token.is_some()
    }

    fn authorization(&self) -> Result<String, ServiceError> {
        self.auth_token
            .as_ref()
            .map(|token| format!("GoogleLogin auth={}", token))
            .ok_or(ServiceError::NotAuthenticated)
    }
}

#[async_trait]
impl MusicService for GoogleMusicClient {
    async fn login(&mut self, email: &str, password: &str) -> Result<(), ServiceError> {
        let form = [
            ("accountType", "HOSTED_OR_GOOGLE"),
            ("Email", email),
            ("Passwd", password),
            ("service", "sj"),
            ("source", "gmusic-clipd"),
        ];
        let response = self
            .http
            .post(&self.endpoints.login)
            .form(&form)
            .send()
            .await
            .map_err(|source| ServiceError::Request {
                endpoint: "login",
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| ServiceError::Request {
            endpoint: "login",
            source,
        })?;

        if !status.is_success() {
            let reason = login_field(&body, "Error")
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            return Err(ServiceError::AuthRejected(reason));
        }

        let token = login_field(&body, "Auth").ok_or_else(|| ServiceError::InvalidResponse {
            endpoint: "login",
            reason: "no Auth token in response".to_string(),
        })?;
        self.auth_token = Some(token.to_string());
        Ok(())
    }

    async fn track_info(&self, id: &TrackId) -> Result<TrackInfo, ServiceError> {
        let response = self
            .http
            .get(&self.endpoints.fetch_track)
            .query(&[("alt", "json"), ("nid", id.as_str())])
            .header("Authorization", self.authorization()?)
            .send()
            .await
            .map_err(|source| ServiceError::Request {
                endpoint: "fetchtrack",
                source,
            })?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => return Err(ServiceError::NotFound(id.clone())),
            status if !status.is_success() => {
                return Err(ServiceError::Status {
                    endpoint: "fetchtrack",
                    status,
                })
            }
            _ => {}
        }

        let dto: TrackDto = response.json().await.map_err(|e| ServiceError::InvalidResponse {
            endpoint: "fetchtrack",
            reason: e.to_string(),
        })?;
        Ok(dto.into_track_info(id))
    }

    async fn mp3_stream_url(&self, nid: &str, device_id: &str) -> Result<String, ServiceError> {
        let salt = chrono::Utc::now().timestamp_millis().to_string();
        let sig = sign(&self.signing_key, nid, &salt)?;
        let id_param = if nid.starts_with('T') { "mjck" } else { "songid" };
        debug!(nid, id_param, "requesting stream URL");

        let response = self
            .no_redirect
            .get(&self.endpoints.stream)
            .query(&[
                ("opt", "hi"),
                ("net", "mob"),
                ("pt", "e"),
                ("slt", salt.as_str()),
                ("sig", sig.as_str()),
                (id_param, nid),
            ])
            .header("Authorization", self.authorization()?)
            .header("X-Device-ID", device_id)
            .send()
            .await
            .map_err(|source| ServiceError::Request {
                endpoint: "mplay",
                source,
            })?;

        let status = response.status();
        if !status.is_redirection() {
            return Err(ServiceError::Status {
                endpoint: "mplay",
                status,
            });
        }

        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::InvalidResponse {
                endpoint: "mplay",
                reason: "redirect without Location header".to_string(),
            })
    }
}

/// Value of a `Key=value` line in a ClientLogin response body.
fn login_field<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    body.lines().find_map(|line| {
        let (k, v) = line.trim().split_once('=')?;
        (k == key && !v.is_empty()).then_some(v)
    })
}

fn signing_key() -> Result<Vec<u8>, ServiceError> {
    let decode = |part: &str| {
        STANDARD
            .decode(part)
            .map_err(|e| ServiceError::Signing(e.to_string()))
    };
    let first = decode(KEY_PART_1)?;
    let second = decode(KEY_PART_2)?;
    Ok(first.iter().zip(&second).map(|(a, b)| a ^ b).collect())
}

/// URL-safe, unpadded base64 of HMAC-SHA1(key, nid + salt).
pub fn sign(key: &[u8], nid: &str, salt: &str) -> Result<String, ServiceError> {
    let mut mac =
        Hmac::<Sha1>::new_from_slice(key).map_err(|e| ServiceError::Signing(e.to_string()))?;
    mac.update(nid.as_bytes());
    mac.update(salt.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}
