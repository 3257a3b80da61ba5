use std::collections::BTreeSet;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{Capability, Role};
use crate::app::AppState;
use crate::db::row_parsers::parse_uuid;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;

/// The authenticated user acting on a request, with the roles loaded for it.
///
/// Handlers take an `Actor` instead of reading a "current user" from ambient
/// state, and pass it down into every workflow operation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub department_id: Option<Uuid>,
    pub roles: BTreeSet<Role>,
}

impl Actor {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            department_id: None,
            roles: BTreeSet::new(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_department(mut self, department_id: Uuid) -> Self {
        self.department_id = Some(department_id);
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Capability check over the actor's role set.
    pub fn can(&self, capability: Capability) -> bool {
        self.is_admin() || self.roles.iter().any(|role| role.grants(capability))
    }

    pub async fn load(pool: &SqlitePool, user_id: Uuid) -> AppResult<Self> {
        let row = sqlx::query("SELECT department_id FROM users WHERE id = ? AND deleted_at IS NULL")
            .bind(user_id.to_string())
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::unauthorized("user no longer exists"))?;

        let department_id = row
            .try_get::<Option<String>, _>("department_id")?
            .map(|value| parse_uuid(&value))
            .transpose()?;

        let roles = principal_roles(pool, user_id).await?;

        Ok(Self {
            user_id,
            department_id,
            roles,
        })
    }
}

pub async fn principal_roles(pool: &SqlitePool, user_id: Uuid) -> AppResult<BTreeSet<Role>> {
    let names: Vec<String> = sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = ?")
        .bind(user_id.to_string())
        .fetch_all(pool)
        .await?;

    Ok(names.iter().filter_map(|name| Role::parse(name)).collect())
}

/// Whether `user_id` is an active user whose roles allow resolving
/// validations. Missing or deleted users are not.
pub async fn can_resolve_validations(pool: &SqlitePool, user_id: Uuid) -> AppResult<bool> {
    let active: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE id = ? AND deleted_at IS NULL")
        .bind(user_id.to_string())
        .fetch_one(pool)
        .await?;
    if active == 0 {
        return Ok(false);
    }

    let roles = principal_roles(pool, user_id).await?;
    Ok(Actor::new(user_id).with_roles(roles).can(Capability::ResolveValidations))
}

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        Actor::load(&state.pool, auth.user_id).await
    }
}

/// Resource context passed to the policy evaluator for logging and scoping.
#[derive(Debug, Clone, Default)]
pub struct ResourceContext {
    pub resource_type: Option<&'static str>,
    pub resource_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
}

impl ResourceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, resource_type: &'static str, resource_id: Uuid) -> Self {
        self.resource_type = Some(resource_type);
        self.resource_id = Some(resource_id);
        self
    }

    pub fn with_department(mut self, department_id: Uuid) -> Self {
        self.department_id = Some(department_id);
        self
    }
}
