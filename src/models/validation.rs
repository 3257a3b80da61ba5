use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};
use crate::models::access_request::AccessRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pending => "pending",
            ValidationStatus::Approved => "approved",
            ValidationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ValidationStatus::Pending),
            "approved" => Some(ValidationStatus::Approved),
            "rejected" => Some(ValidationStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorKind {
    /// One named approver
    Individual,
    /// Any eligible member of a department
    Group,
}

impl ValidatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidatorKind::Individual => "individual",
            ValidatorKind::Group => "group",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "individual" => Some(ValidatorKind::Individual),
            "group" => Some(ValidatorKind::Group),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn outcome(&self) -> ValidationStatus {
        match self {
            Decision::Approve => ValidationStatus::Approved,
            Decision::Reject => ValidationStatus::Rejected,
        }
    }
}

/// One approval task on one requested system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ValidationRecord {
    pub id: Uuid,
    pub request_id: Uuid,
    pub system_id: Uuid,
    pub kind: ValidatorKind,
    /// Set for `individual` records
    pub approver_id: Option<Uuid>,
    /// Set for `group` records
    pub department_id: Option<Uuid>,
    /// Members of the group allowed to resolve, captured at submission
    pub eligible_approvers: Vec<Uuid>,
    pub status: ValidationStatus,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for ValidationRecord {
    fn entity_type() -> &'static str { "validation" }
    fn subject_id(&self) -> Uuid { self.id }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "approved" | "rejected" => Severity::Critical,
            _ => self.severity(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ResolveValidationRequest {
    pub decision: Decision,
    #[schema(example = "Least-privilege profile only")]
    pub comment: Option<String>,
}

/// Result of resolving a validation: the record and its reconciled request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ValidationResolution {
    pub validation: ValidationRecord,
    pub request: AccessRequest,
}
