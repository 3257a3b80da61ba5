use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::Loggable;

/// A person access is requested for. Employees do not need a login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Employee {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub department_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Employee {
    fn entity_type() -> &'static str { "employee" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmployeeCreateRequest {
    #[schema(example = "Grace Hopper")]
    pub full_name: String,
    #[schema(example = "grace@example.com")]
    pub email: Option<String>,
    pub department_id: Option<Uuid>,
}
