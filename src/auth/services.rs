use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, info, warn};

use super::dto::{AuthResponse, LoginRequest, RegisterRequest};
use super::password::{check_password, hash_password, verify_password};
use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::repo_types::{Goals, NewUser, User, UserId, MAX_COMPETITORS};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Access tokens authenticate requests; refresh tokens only mint new pairs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes.max(0) as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn sign(&self, user_id: UserId, kind: TokenKind) -> anyhow::Result<String> {
        let issued = OffsetDateTime::now_utc();
        let expires = issued + TimeDuration::seconds(self.ttl(kind).as_secs() as i64);
        let token = encode(
            &Header::default(),
            &Claims {
                sub: user_id,
                iat: issued.unix_timestamp() as usize,
                exp: expires.unix_timestamp() as usize,
                iss: self.issuer.clone(),
                aud: self.audience.clone(),
                kind,
            },
            &self.encoding,
        )?;
        debug!(user_id, ?kind, "token issued");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: UserId) -> anyhow::Result<String> {
        self.sign(user_id, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: UserId) -> anyhow::Result<String> {
        self.sign(user_id, TokenKind::Refresh)
    }

    /// Checks signature, expiry, issuer and audience.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut rules = Validation::default();
        rules.set_issuer(&[self.issuer.as_str()]);
        rules.set_audience(&[self.audience.as_str()]);
        let claims = decode::<Claims>(token, &self.decoding, &rules)?.claims;
        debug!(user_id = claims.sub, kind = ?claims.kind, "token accepted");
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }

    fn issue(&self, user: User) -> AppResult<AuthResponse> {
        Ok(AuthResponse {
            access_token: self.sign_access(user.id)?,
            refresh_token: self.sign_refresh(user.id)?,
            user,
        })
    }
}

/// Provisions one of the two competitors with the default goals.
pub async fn register(state: &AppState, mut req: RegisterRequest) -> AppResult<AuthResponse> {
    req.email = req.email.trim().to_lowercase();
    let name = req.name.trim().to_string();

    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if !is_valid_email(&req.email) {
        warn!(email = %req.email, "invalid email");
        return Err(AppError::validation("invalid email"));
    }
    check_password(&req.password)?;

    let existing = state.store.list_users().await?;
    if existing.len() >= MAX_COMPETITORS {
        warn!("registration refused, both competitors exist");
        return Err(AppError::Conflict("both competitors are already registered".into()));
    }
    if existing.iter().any(|u| u.email == req.email) {
        return Err(AppError::Conflict("email already registered".into()));
    }
    if existing.iter().any(|u| u.color == req.color) {
        return Err(AppError::Conflict(format!(
            "color {} is already taken",
            req.color.as_str()
        )));
    }

    let defaults = state.config.default_goals;
    let user = state
        .store
        .create_user(NewUser {
            name,
            email: req.email,
            password_hash: hash_password(&req.password)?,
            color: req.color,
            avatar: req.avatar.filter(|a| !a.trim().is_empty()),
            goals: Goals {
                calories: defaults.calories,
                protein: defaults.protein,
                carbs: defaults.carbs,
                fat: defaults.fat,
            },
        })
        .await?;

    info!(user_id = user.id, email = %user.email, color = user.color.as_str(), "user registered");
    JwtKeys::from_ref(state).issue(user)
}

pub async fn login(state: &AppState, mut req: LoginRequest) -> AppResult<AuthResponse> {
    req.email = req.email.trim().to_lowercase();
    if !is_valid_email(&req.email) {
        return Err(AppError::validation("invalid email"));
    }

    let Some(user) = state.store.find_user_by_email(&req.email).await? else {
        warn!(email = %req.email, "login unknown email");
        return Err(AppError::Unauthorized("invalid credentials".into()));
    };
    if !verify_password(&req.password, &user.password_hash)? {
        warn!(email = %req.email, user_id = user.id, "login invalid password");
        return Err(AppError::Unauthorized("invalid credentials".into()));
    }

    info!(user_id = user.id, "user logged in");
    JwtKeys::from_ref(state).issue(user)
}

pub async fn refresh(state: &AppState, refresh_token: &str) -> AppResult<AuthResponse> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify_refresh(refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;
    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("user not found".into()))?;
    keys.issue(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::UserColor;

    fn make_keys() -> JwtKeys {
        JwtKeys::from_ref(&AppState::fake())
    }

    fn register_req(email: &str, color: UserColor) -> RegisterRequest {
        RegisterRequest {
            name: "Ana".into(),
            email: email.into(),
            password: "correct-horse".into(),
            color,
            avatar: None,
        }
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys();
        let token = keys.sign_access(42).expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn verify_refresh_rejects_access_token() {
        let keys = make_keys();
        let refresh = keys.sign_refresh(7).expect("sign refresh");
        assert_eq!(keys.verify_refresh(&refresh).unwrap().sub, 7);
        let access = keys.sign_access(7).expect("sign access");
        let err = keys.verify_refresh(&access).unwrap_err();
        assert!(err.to_string().contains("not a refresh token"));
    }

    #[test]
    fn verify_rejects_other_audience() {
        let keys = make_keys();
        let mut other = make_keys();
        other.audience = "someone-else".into();
        let token = other.sign_access(1).expect("sign access");
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ana@duofit.app"));
        assert!(!is_valid_email("ana@duofit"));
        assert!(!is_valid_email("ana duofit.app"));
    }

    #[tokio::test]
    async fn only_two_competitors_with_distinct_colors() {
        let state = AppState::fake();
        let first = register(&state, register_req("Ana@Duofit.app", UserColor::Yellow))
            .await
            .unwrap();
        assert_eq!(first.user.email, "ana@duofit.app");
        assert_eq!(first.user.goals.calories, 2000.0);

        let same_color = register(&state, register_req("bia@duofit.app", UserColor::Yellow))
            .await
            .unwrap_err();
        assert!(matches!(same_color, AppError::Conflict(_)));

        register(&state, register_req("bia@duofit.app", UserColor::Blue))
            .await
            .unwrap();
        let third = register(&state, register_req("caio@duofit.app", UserColor::Green))
            .await
            .unwrap_err();
        assert!(matches!(third, AppError::Conflict(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_registrations_never_seat_a_third_competitor() {
        let state = AppState::fake();
        let attempts: Vec<_> = [
            ("ana@duofit.app", UserColor::Yellow),
            ("bia@duofit.app", UserColor::Blue),
            ("caio@duofit.app", UserColor::Green),
            ("duda@duofit.app", UserColor::Pink),
        ]
        .into_iter()
        .map(|(email, color)| {
            let state = state.clone();
            tokio::spawn(async move { register(&state, register_req(email, color)).await })
        })
        .collect();

        let mut seated = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => seated += 1,
                Err(e) => assert!(matches!(e, AppError::Conflict(_)), "{e:?}"),
            }
        }
        assert_eq!(seated, MAX_COMPETITORS);
        assert_eq!(state.store.list_users().await.unwrap().len(), MAX_COMPETITORS);
    }

    #[tokio::test]
    async fn login_and_refresh() {
        let state = AppState::fake();
        let registered = register(&state, register_req("ana@duofit.app", UserColor::Pink))
            .await
            .unwrap();

        let bad = login(
            &state,
            LoginRequest {
                email: "ana@duofit.app".into(),
                password: "nope-nope".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(bad, AppError::Unauthorized(_)));

        let ok = login(
            &state,
            LoginRequest {
                email: " ANA@duofit.app ".into(),
                password: "correct-horse".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(ok.user.id, registered.user.id);

        let refreshed = refresh(&state, &ok.refresh_token).await.unwrap();
        assert_eq!(refreshed.user.id, registered.user.id);
        assert!(refresh(&state, &ok.access_token).await.is_err());
    }
}
