//! Phone number verification by SMS code.

use crate::db::{Database, now_timestamp};
use crate::error::Result;
use crate::oauth::BoxFuture;
use rand::{Rng, RngExt};
use std::sync::Arc;

/// Lowest code handed out.
pub const CODE_MIN: u32 = 100_000;
/// One past the highest code handed out.
pub const CODE_MAX: u32 = 1_000_000;

/// Delivers verification codes to phones.
pub trait SmsSender: Send + Sync {
    /// Send `code` to `phone_number`.
    fn send<'a>(&'a self, phone_number: &'a str, code: u32) -> BoxFuture<'a, Result<()>>;
}

/// Sender that only logs the code. Used when no gateway is configured.
#[derive(Debug, Default)]
pub struct LogSmsSender;

impl SmsSender for LogSmsSender {
    fn send<'a>(&'a self, phone_number: &'a str, code: u32) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            tracing::info!(phone = %phone_number, "SMS verification code issued");
            tracing::debug!(phone = %phone_number, code, "SMS verification code");
            Ok(())
        })
    }
}

/// Generate a six-digit code.
pub fn generate_code() -> u32 {
    generate_code_with(&mut rand::rng())
}

/// Generate a six-digit code from `rng`.
pub fn generate_code_with<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.random_range(CODE_MIN..CODE_MAX)
}

/// Issues and checks verification codes.
pub struct SmsVerifier {
    db: Database,
    sender: Arc<dyn SmsSender>,
    valid_seconds: i64,
}

impl SmsVerifier {
    /// Create a verifier whose codes stay valid for `valid_minutes`.
    pub fn new(db: Database, sender: Arc<dyn SmsSender>, valid_minutes: u32) -> Self {
        Self {
            db,
            sender,
            valid_seconds: i64::from(valid_minutes) * 60,
        }
    }

    /// Store a fresh code for the phone number and send it.
    pub async fn request(&self, phone_number: &str) -> Result<()> {
        let code = generate_code();
        self.db.save_sms_request(phone_number, code)?;
        self.sender.send(phone_number, code).await
    }

    /// Whether `code` is the latest code for the number and still fresh.
    pub fn check(&self, phone_number: &str, code: u32) -> Result<bool> {
        let since = now_timestamp() - self.valid_seconds;
        self.db.check_sms_request(phone_number, code, since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_generate_code_range() {
        for _ in 0..1000 {
            let code = generate_code();
            assert!((CODE_MIN..CODE_MAX).contains(&code));
        }
    }

    #[test]
    fn test_generate_code_spread() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut buckets = [0u32; 9];
        for _ in 0..90_000 {
            let code = generate_code_with(&mut rng);
            buckets[(code / 100_000 - 1) as usize] += 1;
        }

        // Each leading digit 1-9 should get about 10000 codes.
        for count in buckets {
            assert!((9_500..=10_500).contains(&count), "bucket count {}", count);
        }
    }

    #[tokio::test]
    async fn test_request_then_check() {
        let db = Database::open_memory().unwrap();
        let verifier = SmsVerifier::new(db.clone(), Arc::new(LogSmsSender), 5);

        verifier.request("01012345678").await.unwrap();
        let stored = db.get_sms_request("01012345678").unwrap().unwrap();

        assert!(verifier.check("01012345678", stored.auth_number).unwrap());
        let wrong = if stored.auth_number == CODE_MIN {
            CODE_MIN + 1
        } else {
            CODE_MIN
        };
        assert!(!verifier.check("01012345678", wrong).unwrap());
        assert!(!verifier.check("01099999999", stored.auth_number).unwrap());
    }

    #[test]
    fn test_expired_code_rejected() {
        let db = Database::open_memory().unwrap();
        db.save_sms_request("01012345678", 123_456).unwrap();

        let verifier = SmsVerifier::new(db, Arc::new(LogSmsSender), 0);
        // A zero-minute window only accepts codes issued this very second.
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(!verifier.check("01012345678", 123_456).unwrap());
    }
}
