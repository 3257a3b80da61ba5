use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};
use crate::models::validation::ValidatorKind;

/// An internal system access can be requested to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct System {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Loggable for System {
    fn entity_type() -> &'static str { "system" }
    fn subject_id(&self) -> Uuid { self.id }
}

/// Approver configured for a system. Every request for the system gets one
/// validation record per configured validator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SystemValidator {
    pub id: Uuid,
    pub system_id: Uuid,
    pub kind: ValidatorKind,
    pub approver_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Loggable for SystemValidator {
    fn entity_type() -> &'static str { "system_validator" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemDetail {
    pub system: System,
    pub validators: Vec<SystemValidator>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SystemCreateRequest {
    #[schema(example = "ERP")]
    pub name: String,
    #[schema(example = "Finance ERP, ledger and payroll modules")]
    pub description: Option<String>,
}

/// `individual` needs `approver_id`; `group` needs `department_id`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SystemValidatorCreateRequest {
    pub kind: ValidatorKind,
    pub approver_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
}
