use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, PublicUser, SignupRequest, TokenResponse},
        jwt::{CurrentUser, JwtKeys},
        password::{hash_password, verify_password},
    },
    db::User,
    entitlement,
    errors::ApiError,
    rate_limit::RateLimiter,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are stored trimmed and lowercased so logins are case-insensitive.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn public_user(user: &User) -> PublicUser {
    PublicUser {
        id: user.id,
        email: user.email.clone(),
        is_pro: entitlement::is_active(user, OffsetDateTime::now_utc()),
    }
}

async fn check_rate_limit(state: &AppState, addr: &SocketAddr) -> Result<(), ApiError> {
    let limiter = RateLimiter::for_auth_endpoints(state.cache.clone());
    let allowed = limiter.admit(&addr.ip().to_string()).await?;
    if !allowed {
        warn!(client = %addr.ip(), "rate limit exceeded");
        return Err(ApiError::RateLimited);
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    check_rate_limit(&state, &addr).await?;

    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.email, &hash)
        .await
        .map_err(|e| {
            error!(error = %e, "create user failed");
            ApiError::Internal(e)
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(public_user(&user))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(payload): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    check_rate_limit(&state, &addr).await?;

    let email = normalize_email(&payload.username);

    // Same 401 for unknown email and wrong password.
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| {
            warn!(email = %email, "login unknown email");
            ApiError::Unauthorized
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized);
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign(&user.email)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn me(CurrentUser(user): CurrentUser) -> Result<Json<PublicUser>, ApiError> {
    Ok(Json(public_user(&user)))
}
