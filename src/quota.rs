use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use axum::http::HeaderMap;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::QuotaConfig;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuotaError {
    #[error("not_whitelisted")]
    NotWhitelisted,
    #[error("no_credits")]
    NoCredits,
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error("quota store unavailable: {0}")]
    Unavailable(String),
}

/// Beta whitelist and credit accounting, consulted before a generation row exists.
#[async_trait]
pub trait QuotaGate: Send + Sync {
    async fn authorize(&self, owner: Option<Uuid>) -> Result<(), QuotaError>;

    /// Returns the credits left after the decrement.
    async fn consume_credit(&self, owner: Uuid) -> Result<u32, QuotaError>;
}

pub struct MemoryQuota {
    whitelist: HashSet<Uuid>,
    credits: Mutex<HashMap<Uuid, u32>>,
}

impl MemoryQuota {
    pub fn new(whitelist: impl IntoIterator<Item = Uuid>) -> Self {
        Self { whitelist: whitelist.into_iter().collect(), credits: Mutex::new(HashMap::new()) }
    }

    /// Every whitelisted user starts with the configured credit balance.
    pub fn from_config(config: &QuotaConfig) -> Self {
        let quota = Self::new(config.whitelist.iter().copied());
        for user in &config.whitelist {
            quota.set_credits(*user, config.starting_credits);
        }
        info!("🎟️ Quota gate active for {} user(s)", config.whitelist.len());
        quota
    }

    pub fn set_credits(&self, user: Uuid, credits: u32) {
        self.credits.lock().insert(user, credits);
    }

    pub fn credits(&self, user: Uuid) -> Option<u32> {
        self.credits.lock().get(&user).copied()
    }
}

#[async_trait]
impl QuotaGate for MemoryQuota {
    async fn authorize(&self, owner: Option<Uuid>) -> Result<(), QuotaError> {
        let owner = owner.ok_or(QuotaError::NotWhitelisted)?;
        if !self.whitelist.contains(&owner) {
            return Err(QuotaError::NotWhitelisted);
        }
        match self.credits(owner) {
            None => Err(QuotaError::UserNotFound(owner)),
            Some(0) => Err(QuotaError::NoCredits),
            Some(_) => Ok(()),
        }
    }

    async fn consume_credit(&self, owner: Uuid) -> Result<u32, QuotaError> {
        let mut credits = self.credits.lock();
        let balance = credits.get_mut(&owner).ok_or(QuotaError::UserNotFound(owner))?;
        if *balance == 0 {
            return Err(QuotaError::NoCredits);
        }
        *balance -= 1;
        Ok(*balance)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("invalid {header} header")]
pub struct AuthError {
    pub header: &'static str,
}

/// Resolves the caller. Session handling lives upstream; this only reads its result.
pub trait AuthProvider: Send + Sync {
    fn current_user(&self, headers: &HeaderMap) -> Result<Option<Uuid>, AuthError>;
}

/// Trusts a user id forwarded by the gateway in `x-user-id`.
pub struct HeaderAuth;

pub const USER_HEADER: &str = "x-user-id";

impl AuthProvider for HeaderAuth {
    fn current_user(&self, headers: &HeaderMap) -> Result<Option<Uuid>, AuthError> {
        let Some(value) = headers.get(USER_HEADER) else {
            return Ok(None);
        };
        let raw = value.to_str().map_err(|_| AuthError { header: USER_HEADER })?.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some).map_err(|_| AuthError { header: USER_HEADER })
    }
}
