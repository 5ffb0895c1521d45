//! Authentication against the service's OAuth2 endpoints.

use crate::error::{CloudError, Result};
use crate::types::TokenResponse;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Scope string the import API expects from device agents.
pub(crate) const OAUTH_SCOPE: &str = "read write delete";

/// Authentication client for the sleep data service.
pub struct AuthClient<'a> {
    http: &'a Client,
    base_url: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

impl<'a> AuthClient<'a> {
    pub(crate) fn new(
        http: &'a Client,
        base_url: &'a str,
        client_id: &'a str,
        client_secret: &'a str,
    ) -> Self {
        Self {
            http,
            base_url,
            client_id,
            client_secret,
        }
    }

    /// Exchange username and password for a bearer token.
    ///
    /// The password grant carries no refresh token; expiry always means a
    /// fresh exchange with re-supplied credentials.
    pub async fn password_grant(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let url = format!("{}/oauth/token", self.base_url);
        debug!(url = %url, username = %username, "Requesting access token");

        let params = [
            ("client_id", self.client_id),
            ("client_secret", self.client_secret),
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("scope", OAUTH_SCOPE),
        ];

        let response = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    CloudError::ServiceUnreachable(e.to_string())
                } else {
                    CloudError::Request(e)
                }
            })?;

        let status = response.status();

        if status.is_success() {
            let token: TokenResponse = response.json().await.map_err(|e| {
                CloudError::ParseError(format!("Failed to parse token response: {}", e))
            })?;

            info!(
                expires_in = token.expires_in,
                "Authenticated with the service"
            );
            Ok(token)
        } else if status.as_u16() == 400 || status.as_u16() == 401 {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Token request rejected");
            Err(CloudError::AuthFailed(
                "Invalid username or password".to_string(),
            ))
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(CloudError::Server {
                status: status.as_u16(),
                message: error_text,
            })
        }
    }

    /// Resolve the account's primary team, the tenant all imports attach to.
    pub async fn primary_team(&self, access_token: &str) -> Result<String> {
        let url = format!("{}/api/v1/teams", self.base_url);
        debug!(url = %url, "Resolving primary team");

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    CloudError::ServiceUnreachable(e.to_string())
                } else {
                    CloudError::Request(e)
                }
            })?;

        let status = response.status();

        if status.as_u16() == 401 {
            return Err(CloudError::AuthExpired);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CloudError::Server {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            CloudError::ParseError(format!("Failed to parse teams response: {}", e))
        })?;

        let team_id = first_team_id(&body).ok_or(CloudError::NoTeam)?;
        debug!(team_id = %team_id, "Resolved primary team");
        Ok(team_id)
    }
}

/// Pull the first team id out of the teams response.
///
/// The API has shipped both a wrapped form (`{"data": [...]}`, occasionally
/// `{"teams": [...]}`) and a bare array; team ids arrive as strings or
/// numbers under `id` or `team_id`.
fn first_team_id(body: &Value) -> Option<String> {
    let teams = match body {
        Value::Object(map) => map
            .get("data")
            .or_else(|| map.get("teams"))
            .and_then(Value::as_array)?,
        Value::Array(list) => list,
        _ => return None,
    };

    let first = teams.first()?;
    let id = first.get("id").or_else(|| first.get("team_id"))?;
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
