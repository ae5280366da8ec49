use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use keystone_auth::{Role, UserAccount};
use keystone_core::{SubscriptionPlan, Tenant, TenantId, TenantStatus, UserId};
use keystone_projects::{ProjectStatus, TaskStatus};

use crate::app::errors::ApiError;

/// `Json` whose rejections use the API error body (400 `validation_error`).
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Parse a path segment as an identifier.
pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: core::str::FromStr,
{
    raw.parse().map_err(|_| ApiError::validation("invalid id"))
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterTenantRequest {
    pub tenant_name: String,
    pub subdomain: String,
    pub admin_email: String,
    pub admin_full_name: String,
    pub admin_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub tenant_subdomain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTenantRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlanRequest {
    pub subscription_plan: SubscriptionPlan,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TenantStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub assignee_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub assignee_id: Option<Option<UserId>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
    #[serde(default = "default_member_role")]
    pub role: Role,
}

fn default_member_role() -> Role {
    Role::User
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

// -------------------------
// Response DTOs
// -------------------------

/// Public view of a user account; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub tenant_id: Option<TenantId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&UserAccount> for UserResponse {
    fn from(u: &UserAccount) -> Self {
        Self {
            id: u.id,
            email: u.email.as_str().to_string(),
            full_name: u.full_name.clone(),
            role: u.role,
            tenant_id: u.tenant_id,
            is_active: u.is_active,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantSummary {
    pub id: TenantId,
    pub name: String,
    pub subdomain: String,
    pub status: TenantStatus,
    pub subscription_plan: SubscriptionPlan,
}

impl From<&Tenant> for TenantSummary {
    fn from(t: &Tenant) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            subdomain: t.subdomain.as_str().to_string(),
            status: t.status,
            subscription_plan: t.subscription_plan,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterTenantResponse {
    pub tenant_id: TenantId,
    pub subdomain: String,
    pub admin: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
    pub tenant: Option<TenantSummary>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserResponse,
    pub tenant: Option<TenantSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_null_fields_are_distinct() {
        let absent: UpdateTaskRequest = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(absent.assignee_id, None);

        let cleared: UpdateTaskRequest = serde_json::from_str(r#"{"assignee_id":null}"#).unwrap();
        assert_eq!(cleared.assignee_id, Some(None));

        let id = UserId::new();
        let set: UpdateTaskRequest =
            serde_json::from_str(&format!(r#"{{"assignee_id":"{id}"}}"#)).unwrap();
        assert_eq!(set.assignee_id, Some(Some(id)));
    }

    #[test]
    fn user_role_defaults_to_member() {
        let body: CreateUserRequest =
            serde_json::from_str(r#"{"email":"a@b.c","full_name":"A","password":"secret1"}"#).unwrap();
        assert_eq!(body.role, Role::User);
    }

    #[test]
    fn invalid_ids_are_validation_errors() {
        assert!(matches!(parse_id::<UserId>("nope"), Err(ApiError::Validation(_))));
    }
}
