use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of an audit entry. Decides how long it is retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Approval decisions, finalization, role changes: kept indefinitely
    Critical,
    #[default]
    Important,
    /// Logins and other chatter
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Entities that can appear in the activity log.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of event names, e.g. `access_request` in `access_request.submitted`
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" => Severity::Critical,
            _ => self.severity(),
        }
    }
}
