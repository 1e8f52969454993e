//! Third-party sign-in profile lookup.

use crate::error::{AppError, Result};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by providers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Profile fields the service needs from an OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    /// Provider-side account ID.
    pub id: String,
    /// Display nickname.
    pub nickname: String,
    /// Profile image URL.
    pub image_url: Option<String>,
    /// Email address.
    pub email: Option<String>,
}

/// Resolves a provider access token to a profile.
///
/// Implementations return [`AppError::InvalidToken`] when the provider
/// rejects the token.
pub trait OAuthProvider: Send + Sync {
    /// Fetch the profile belonging to `access_token`.
    fn fetch_profile<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Result<OAuthProfile>>;
}

#[derive(Debug, Deserialize)]
struct KakaoUser {
    id: i64,
    #[serde(default)]
    kakao_account: KakaoAccount,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoAccount {
    #[serde(default)]
    profile: Option<KakaoProfile>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KakaoProfile {
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    thumbnail_image_url: Option<String>,
}

impl From<KakaoUser> for OAuthProfile {
    fn from(user: KakaoUser) -> Self {
        let (nickname, image_url) = match user.kakao_account.profile {
            Some(profile) => (profile.nickname, profile.thumbnail_image_url),
            None => (None, None),
        };

        Self {
            id: user.id.to_string(),
            nickname: nickname.unwrap_or_else(|| format!("kakao_{}", user.id)),
            image_url,
            email: user.kakao_account.email,
        }
    }
}

/// Kakao user API client.
pub struct KakaoClient {
    http: reqwest::Client,
    profile_url: String,
}

impl KakaoClient {
    /// Create a client against the given profile endpoint.
    pub fn new(profile_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            profile_url: profile_url.into(),
        }
    }

    async fn fetch(&self, access_token: &str) -> Result<OAuthProfile> {
        let response = self
            .http
            .get(&self.profile_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Kakao request failed: {}", e)))?;

        let status = response.status();
        if status.is_client_error() {
            tracing::debug!(status = %status, "Kakao rejected access token");
            return Err(AppError::InvalidToken);
        }
        if !status.is_success() {
            return Err(AppError::Internal(format!(
                "Kakao returned status {}",
                status
            )));
        }

        let user: KakaoUser = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Invalid Kakao response: {}", e)))?;

        Ok(user.into())
    }
}

impl OAuthProvider for KakaoClient {
    fn fetch_profile<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Result<OAuthProfile>> {
        Box::pin(self.fetch(access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kakao_profile_mapping() {
        let body = r#"{
            "id": 12345,
            "kakao_account": {
                "profile": {
                    "nickname": "test_nickname",
                    "thumbnail_image_url": "image_url_info"
                },
                "email": "test@example.com"
            }
        }"#;

        let user: KakaoUser = serde_json::from_str(body).unwrap();
        let profile = OAuthProfile::from(user);

        assert_eq!(profile.id, "12345");
        assert_eq!(profile.nickname, "test_nickname");
        assert_eq!(profile.image_url.as_deref(), Some("image_url_info"));
        assert_eq!(profile.email.as_deref(), Some("test@example.com"));
    }

    #[test]
    fn test_kakao_profile_without_account() {
        let user: KakaoUser = serde_json::from_str(r#"{"id": 9}"#).unwrap();
        let profile = OAuthProfile::from(user);
        assert_eq!(profile.nickname, "kakao_9");
        assert!(profile.email.is_none());
    }
}
