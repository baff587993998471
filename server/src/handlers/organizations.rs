use axum::extract::State;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use validator::Validate;
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::models::{NewOrganization, NewUser, UserRole};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::ApiJson;
use crate::utils::response::created;
use crate::utils::validation;

#[derive(Debug, Deserialize, Validate)]
pub struct OrganizationDetails {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[validate(url(message = "Invalid url"))]
    pub website: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminDetails {
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
pub struct RegisterOrganizationRequest {
    pub organization: OrganizationDetails,
    pub admin: AdminDetails,
}

#[derive(Serialize)]
pub struct OrganizationSummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Serialize)]
pub struct AdminSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct RegisteredOrganization {
    pub organization: OrganizationSummary,
    pub user: AdminSummary,
}

/// Creates an organization together with its first user, who becomes its OWNER.
pub async fn register_organization(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterOrganizationRequest>,
) -> AppResult<Response> {
    let RegisterOrganizationRequest {
        mut organization,
        mut admin,
    } = body;

    let organization_name =
        validation::required(&organization.name, "Organization name is required")?;
    organization.website = validation::optional(organization.website);
    validation::check(&organization)?;
    let admin_name = validation::required(&admin.name, "Admin name is required")?;
    admin.email = validation::normalize_email(&admin.email);
    validation::check(&admin)?;
    let email = admin.email;

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }
    if state
        .store
        .find_organization_by_name(&organization_name)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Organization with this name already exists".to_string(),
        ));
    }

    let (organization, user) = state
        .store
        .register_organization(
            NewOrganization {
                name: organization_name,
                description: validation::optional(organization.description),
                website: organization.website,
            },
            NewUser {
                name: admin_name,
                email,
                password_hash: hash_password(&admin.password)?,
                role: UserRole::Admin,
            },
        )
        .await?;

    tracing::info!(
        organization_id = %organization.id,
        owner_id = %user.id,
        "Organization registered"
    );

    Ok(created(
        RegisteredOrganization {
            organization: OrganizationSummary {
                id: organization.id,
                name: organization.name,
            },
            user: AdminSummary {
                id: user.id,
                name: user.name,
                email: user.email,
            },
        },
        "Organization registered",
    ))
}
