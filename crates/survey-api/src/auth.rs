//! JWT Authentication
//!
//! Phone-number login with one-time passwords. A verified code yields an
//! access/refresh token pair; refresh tokens rotate and can be revoked by
//! their `jti`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use survey_core::domain::services::access;
use survey_core::ports::outbound::{AccountUpdate, OtpDispatch, TokenPair};
use survey_core::{AuthService, InMemoryStore, PhoneNumber, Role, RowId, SurveyError, SurveyResult, User};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::AppState;

/// Wrong guesses tolerated per issued code.
pub const OTP_MAX_ATTEMPTS: u8 = 3;

/// Delivery channel for one-time passwords
pub trait OtpSender: Send + Sync {
    fn deliver(&self, phone: &PhoneNumber, code: &str);
}

/// Writes codes to the log; stands in for an SMS gateway.
pub struct LogOtpSender;

impl OtpSender for LogOtpSender {
    fn deliver(&self, phone: &PhoneNumber, code: &str) {
        info!(%phone, code, "One-time password issued");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: RowId,
    pub jti: Uuid,
    pub kind: TokenKind,
    pub iat: usize,
    pub exp: usize,
}

struct PendingOtp {
    code: String,
    expires_at: DateTime<Utc>,
    attempts: u8,
}

enum OtpCheck {
    Matched,
    Mismatch,
    Spent,
}

pub struct JwtAuthService {
    store: Arc<InMemoryStore>,
    sender: Arc<dyn OtpSender>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    otp_ttl: Duration,
    pending: DashMap<PhoneNumber, PendingOtp>,
    /// Revoked refresh tokens by `jti`, kept until they would expire anyway.
    revoked: DashMap<Uuid, usize>,
}

impl JwtAuthService {
    pub fn new(store: Arc<InMemoryStore>, sender: Arc<dyn OtpSender>, config: &ServerConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            store,
            sender,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: Duration::minutes(config.access_token_minutes),
            refresh_ttl: Duration::days(config.refresh_token_days),
            otp_ttl: Duration::seconds(config.otp_ttl_seconds),
            pending: DashMap::new(),
            revoked: DashMap::new(),
        }
    }

    fn sign(&self, user_id: RowId, kind: TokenKind, ttl: Duration) -> SurveyResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4(),
            kind,
            iat: now.timestamp() as usize,
            exp: (now + ttl).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| SurveyError::Internal(e.to_string()))
    }

    fn verify(&self, token: &str, expected: TokenKind) -> SurveyResult<Claims> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| SurveyError::InvalidToken)?
            .claims;

        if claims.kind != expected || self.revoked.contains_key(&claims.jti) {
            return Err(SurveyError::InvalidToken);
        }
        Ok(claims)
    }

    fn active_user(&self, user_id: RowId) -> SurveyResult<User> {
        let user = self
            .store
            .read(|tables| tables.user(user_id).cloned())
            .ok_or(SurveyError::InvalidToken)?;
        access::ensure_active_account(&user)?;
        Ok(user)
    }

    fn revoke(&self, claims: &Claims) {
        let now = Utc::now().timestamp() as usize;
        self.revoked.retain(|_, exp| *exp > now);
        self.revoked.insert(claims.jti, claims.exp);
    }
}

#[async_trait]
impl AuthService for JwtAuthService {
    async fn send_otp(&self, phone: &PhoneNumber) -> SurveyResult<OtpDispatch> {
        let now = Utc::now();
        let outstanding = self
            .pending
            .get(phone)
            .is_some_and(|pending| pending.expires_at > now);
        if outstanding {
            return Err(SurveyError::OtpAlreadySent);
        }

        let code = rand::thread_rng().gen_range(100_000..1_000_000).to_string();
        let expires_at = now + self.otp_ttl;
        self.pending.insert(
            phone.clone(),
            PendingOtp {
                code: code.clone(),
                expires_at,
                attempts: 0,
            },
        );

        self.sender.deliver(phone, &code);
        Ok(OtpDispatch { expires_at })
    }

    async fn verify_otp(&self, phone: &PhoneNumber, code: &str) -> SurveyResult<User> {
        let now = Utc::now();
        let check = self.pending.get_mut(phone).map(|mut pending| {
            pending.attempts += 1;
            if pending.expires_at <= now || pending.attempts > OTP_MAX_ATTEMPTS {
                OtpCheck::Spent
            } else if pending.code == code {
                OtpCheck::Matched
            } else {
                OtpCheck::Mismatch
            }
        });

        match check {
            Some(OtpCheck::Matched) => {
                self.pending.remove(phone);
            }
            Some(OtpCheck::Spent) => {
                self.pending.remove(phone);
                warn!(%phone, "One-time password expired or exhausted");
                return Err(SurveyError::InvalidOtp);
            }
            Some(OtpCheck::Mismatch) | None => return Err(SurveyError::InvalidOtp),
        }

        let (user, _) = self.store.transaction(|tx, _| {
            if let Some(existing) = tx.user_by_phone(phone) {
                return Ok(existing.clone());
            }
            let id = tx.insert_user(User::new(phone.clone(), Role::Personal, now))?;
            info!(user_id = id, "Account created on first login");
            tx.user(id).cloned().ok_or(SurveyError::UserDoesNotExist)
        })?;

        access::ensure_active_account(&user)?;
        Ok(user)
    }

    async fn issue_tokens(&self, user: &User) -> SurveyResult<TokenPair> {
        Ok(TokenPair {
            access: self.sign(user.id, TokenKind::Access, self.access_ttl)?,
            refresh: self.sign(user.id, TokenKind::Refresh, self.refresh_ttl)?,
        })
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> SurveyResult<TokenPair> {
        let claims = self.verify(refresh_token, TokenKind::Refresh)?;
        let user = self.active_user(claims.sub)?;
        self.revoke(&claims);
        self.issue_tokens(&user).await
    }

    async fn revoke_token(&self, refresh_token: &str) -> SurveyResult<()> {
        let claims = self.verify(refresh_token, TokenKind::Refresh)?;
        self.revoke(&claims);
        info!(user_id = claims.sub, "Refresh token revoked");
        Ok(())
    }

    async fn authenticate(&self, access_token: &str) -> SurveyResult<User> {
        let claims = self.verify(access_token, TokenKind::Access)?;
        self.active_user(claims.sub)
    }

    async fn update_account(&self, actor: &User, user_id: RowId, update: AccountUpdate) -> SurveyResult<User> {
        access::ensure_admin(actor)?;

        let (user, _) = self.store.transaction(|tx, _| {
            let user = tx.user_mut(user_id).ok_or(SurveyError::UserDoesNotExist)?;
            if let Some(role) = update.role {
                user.role = role;
            }
            if let Some(is_active) = update.is_active {
                user.is_active = is_active;
            }
            if let Some(is_staff) = update.is_staff {
                user.is_staff = is_staff;
            }
            Ok(user.clone())
        })?;

        info!(user_id, role = ?user.role, is_active = user.is_active, "Account updated");
        Ok(user)
    }
}

// =============================================================================
// Extractors
// =============================================================================

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Authenticated caller; rejects requests without a valid access token.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or(SurveyError::UserNotAuthenticated)?;
        Ok(Self(state.auth.authenticate(token).await?))
    }
}

/// Caller when a token is present. A present but invalid token is rejected.
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer(parts) {
            Some(token) => Ok(Self(Some(state.auth.authenticate(token).await?))),
            None => Ok(Self(None)),
        }
    }
}
