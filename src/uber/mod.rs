//! Uber API client: authorization URL, token grants, profile, and trip
//! history.
//!
//! Base URLs are injectable so tests can point the client at a mock
//! server; production uses `auth.uber.com` / `api.uber.com`.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Scopes requested during authorization.
const SCOPES: &str = "profile history";

/// Tokens returned by the provider's token endpoint, for both the
/// authorization-code and refresh-token grants.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenGrant {
    /// Absolute expiry computed from `expires_in` at receipt time.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripCity {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripFare {
    /// Number or numeric string depending on the API version.
    pub value: serde_json::Value,
}

/// One trip from the history endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UberTrip {
    pub uuid: String,
    /// Request time as a unix timestamp in seconds.
    #[serde(default)]
    pub request_time: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub fare: Option<TripFare>,
    #[serde(default)]
    pub start_city: Option<TripCity>,
    #[serde(default)]
    pub end_city: Option<TripCity>,
}

impl UberTrip {
    /// Fare as a number; missing or unparseable fares count as zero.
    pub fn fare_value(&self) -> f64 {
        match &self.fare {
            Some(fare) => match &fare.value {
                serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
                serde_json::Value::String(s) => s.parse().unwrap_or(0.0),
                _ => 0.0,
            },
            None => 0.0,
        }
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.request_time
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now)
    }

    pub fn origin(&self) -> &str {
        self.start_city.as_ref().map(|c| c.display_name.as_str()).unwrap_or("")
    }

    pub fn destination(&self) -> &str {
        self.end_city.as_ref().map(|c| c.display_name.as_str()).unwrap_or("")
    }
}

/// Trip history page.
#[derive(Debug, Clone, Deserialize)]
pub struct TripHistory {
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub history: Vec<UberTrip>,
}

impl TripHistory {
    pub fn total(&self) -> usize {
        self.count.unwrap_or(self.history.len())
    }
}

/// HTTP client for the Uber API.
#[derive(Clone)]
pub struct UberClient {
    http: reqwest::Client,
    auth_base: String,
    api_base: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl UberClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        auth_base: String,
        api_base: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth_base,
            api_base,
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    /// Build the authorization URL. Deterministic, no network call.
    pub fn build_auth_url(&self, state: &str) -> String {
        format!(
            "{}/oauth/v2/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            self.auth_base,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for tokens. Single attempt; a
    /// non-success status is an error carrying status and body.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("client_id", self.client_id.as_str());
        params.insert("client_secret", self.client_secret.as_str());
        params.insert("redirect_uri", self.redirect_uri.as_str());
        params.insert("code", code);

        self.token_request(&params).await
    }

    /// Redeem a refresh token for a fresh access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("client_id", self.client_id.as_str());
        params.insert("client_secret", self.client_secret.as_str());
        params.insert("refresh_token", refresh_token);

        self.token_request(&params).await
    }

    async fn token_request(&self, params: &HashMap<&str, &str>) -> Result<TokenGrant> {
        let response = self
            .http
            .post(format!("{}/oauth/v2/token", self.auth_base))
            .form(params)
            .send()
            .await
            .inspect_err(|err| {
                tracing::error!("error in request to Uber token endpoint: {:#?}", err);
            })
            .context("Failed to send token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Token request failed with status {}: {}", status, body));
        }

        response
            .json::<TokenGrant>()
            .await
            .inspect_err(|err| {
                tracing::error!("error deserialising token response: {:#?}", err);
            })
            .context("Failed to parse token response")
    }

    /// Fetch the rider profile. Callers treat failures as non-fatal.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(format!("{}/v1.2/me", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to send profile request")?;

        if !response.status().is_success() {
            return Err(anyhow!("Profile request failed with status {}", response.status()));
        }

        response
            .json::<serde_json::Value>()
            .await
            .context("Failed to parse profile response")
    }

    /// Fetch trip history. Single attempt, no pagination beyond the
    /// provider's default page.
    pub async fn fetch_history(&self, access_token: &str) -> Result<TripHistory> {
        tracing::info!("fetching Uber trip history");

        let response = self
            .http
            .get(format!("{}/v1.2/history", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await
            .inspect_err(|err| {
                tracing::error!("error in request to Uber history endpoint: {:#?}", err);
            })
            .context("Failed to send history request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("History request failed with status {}: {}", status, body));
        }

        response
            .json::<TripHistory>()
            .await
            .inspect_err(|err| {
                tracing::error!("error deserialising history response: {:#?}", err);
            })
            .context("Failed to parse history response")
    }
}
