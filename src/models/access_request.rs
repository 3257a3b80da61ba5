use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};
use crate::models::validation::ValidationRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Validating,
    Approved,
    Rejected,
    Finalized,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Validating => "validating",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Finalized => "finalized",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "validating" => Some(RequestStatus::Validating),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            "finalized" => Some(RequestStatus::Finalized),
            _ => None,
        }
    }

    /// No validator action can change a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Finalized)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AccessRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub employee_id: Uuid,
    pub justification: Option<String>,
    pub status: RequestStatus,
    pub finalized_by: Option<Uuid>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Loggable for AccessRequest {
    fn entity_type() -> &'static str { "access_request" }
    fn subject_id(&self) -> Uuid { self.id }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "approved" | "rejected" | "finalized" | "deleted" | "withdrawn" => Severity::Critical,
            _ => self.severity(),
        }
    }
}

/// A system requested inside an access request, with its provisioning state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RequestedSystem {
    pub id: Uuid,
    pub request_id: Uuid,
    pub system_id: Uuid,
    pub provisioned_by: Option<Uuid>,
    pub provisioned_at: Option<DateTime<Utc>>,
}

impl RequestedSystem {
    pub fn is_provisioned(&self) -> bool {
        self.provisioned_at.is_some()
    }
}

impl Loggable for RequestedSystem {
    fn entity_type() -> &'static str { "request_system" }
    fn subject_id(&self) -> Uuid { self.id }
}

/// An access request with everything that decides its status.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccessRequestDetail {
    pub request: AccessRequest,
    pub systems: Vec<RequestedSystem>,
    pub validations: Vec<ValidationRecord>,
    /// Whether the calling user could finalize the request right now
    pub can_finalize: bool,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AccessRequestCreateRequest {
    pub employee_id: Uuid,
    #[schema(example = "New hire in accounts payable")]
    pub justification: Option<String>,
    pub system_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccessRequestListQuery {
    pub status: Option<RequestStatus>,
}
