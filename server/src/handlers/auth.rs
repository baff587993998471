use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::session::start_session;
use crate::auth::CurrentUser;
use crate::models::{MemberRole, NewUser, Organization, User, UserRole};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::ApiJson;
use crate::utils::response::{created, empty_success, success};
use crate::utils::validation;

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Serialize)]
pub struct Membership {
    pub organization: Organization,
    pub role: MemberRole,
}

#[derive(Serialize)]
pub struct Profile {
    pub user: User,
    pub memberships: Vec<Membership>,
}

pub async fn signup(
    State(state): State<AppState>,
    ApiJson(mut body): ApiJson<SignupRequest>,
) -> AppResult<Response> {
    let name = validation::required(&body.name, "Name is required")?;
    body.email = validation::normalize_email(&body.email);
    validation::check(&body)?;
    let email = body.email;

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }

    let user = state
        .store
        .create_user(NewUser {
            name,
            email,
            password_hash: hash_password(&body.password)?,
            role: UserRole::User,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok(created(user, "Account created"))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Response> {
    let invalid = || AppError::AuthError("Invalid email or password".to_string());
    let email = validation::normalize_email(&body.email);

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&body.password, &user.password_hash)? {
        return Err(invalid());
    }

    let (session, token) =
        start_session(state.store.as_ref(), user.id, state.config.session_ttl_hours).await?;

    tracing::info!(user_id = %user.id, session_id = %session.id, "User signed in");
    Ok(success(
        LoginResponse {
            token,
            expires_at: session.expires_at,
            user,
        },
        "Signed in",
    ))
}

pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> AppResult<Response> {
    state.store.delete_session(current.session_id).await?;
    Ok(empty_success("Signed out"))
}

pub async fn me(State(state): State<AppState>, current: CurrentUser) -> AppResult<Response> {
    let mut memberships = Vec::new();
    for member in state.store.list_memberships(current.id()).await? {
        if let Some(organization) = state.store.find_organization(member.organization_id).await? {
            memberships.push(Membership {
                organization,
                role: member.role,
            });
        }
    }

    Ok(success(
        Profile {
            user: current.user,
            memberships,
        },
        "Profile retrieved",
    ))
}
