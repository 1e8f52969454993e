//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::Database;
use crate::oauth::{KakaoClient, OAuthProvider};
use crate::sms::{LogSmsSender, SmsSender, SmsVerifier};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Third-party sign-in provider.
    pub oauth: Arc<dyn OAuthProvider>,
    /// SMS code issuer.
    pub sms: Arc<SmsVerifier>,
}

impl AppState {
    /// Create state with the default Kakao client and logging SMS sender.
    pub fn new_with_db(config: &Config, db: Database) -> Self {
        let oauth = Arc::new(KakaoClient::new(config.kakao.profile_url.clone()));
        Self::with_integrations(config, db, oauth, Arc::new(LogSmsSender))
    }

    /// Create state with explicit integration clients.
    pub fn with_integrations(
        config: &Config,
        db: Database,
        oauth: Arc<dyn OAuthProvider>,
        sms_sender: Arc<dyn SmsSender>,
    ) -> Self {
        let auth = AuthService::new(
            db.clone(),
            config.auth.session_days,
            config.auth.registration_enabled(),
        );
        let sms = SmsVerifier::new(db.clone(), sms_sender, config.sms.valid_minutes);

        Self {
            db,
            auth: Arc::new(auth),
            oauth,
            sms: Arc::new(sms),
        }
    }
}
