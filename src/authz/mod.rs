//! Authorization: roles, capabilities and the policy evaluator.
//!
//! Every user holds a set of [`Role`]s. Each role grants a fixed set of
//! [`Capability`]s, and handlers check capabilities, never role names:
//! - `admin` bypasses every check
//! - other roles are looked up in [`Role::capabilities`]
//! - anything not granted is denied with `403 forbidden`

mod evaluator;
mod principal;

pub use evaluator::{require, DefaultPolicyEvaluator, PolicyEvaluator};
pub use principal::{can_resolve_validations, principal_roles, Actor, ResourceContext};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role enumeration persisted in `user_roles.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Hr,
    It,
    Manager,
    Validator,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Admin, Role::Hr, Role::It, Role::Manager, Role::Validator];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Hr => "hr",
            Role::It => "it",
            Role::Manager => "manager",
            Role::Validator => "validator",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "hr" => Some(Role::Hr),
            "it" => Some(Role::It),
            "manager" => Some(Role::Manager),
            "validator" => Some(Role::Validator),
            _ => None,
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Admin => &[
                SubmitRequests,
                ViewAllRequests,
                ResolveValidations,
                ProvisionSystems,
                FinalizeRequests,
                ManageEmployees,
                ManageCatalog,
                ManageUsers,
            ],
            Role::Hr => &[SubmitRequests, ViewAllRequests, ManageEmployees],
            Role::It => &[ViewAllRequests, ResolveValidations, ProvisionSystems, FinalizeRequests],
            Role::Manager => &[SubmitRequests, ResolveValidations],
            Role::Validator => &[ResolveValidations],
        }
    }

    pub fn grants(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an actor is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    SubmitRequests,
    ViewAllRequests,
    ResolveValidations,
    ProvisionSystems,
    FinalizeRequests,
    ManageEmployees,
    ManageCatalog,
    ManageUsers,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::SubmitRequests => "request.submit",
            Capability::ViewAllRequests => "request.view_all",
            Capability::ResolveValidations => "validation.resolve",
            Capability::ProvisionSystems => "system.provision",
            Capability::FinalizeRequests => "request.finalize",
            Capability::ManageEmployees => "employee.manage",
            Capability::ManageCatalog => "catalog.manage",
            Capability::ManageUsers => "user.manage",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_parse_back() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse(" IT "), Some(Role::It));
        assert_eq!(Role::parse("super_admin"), None);
    }

    #[test]
    fn validators_only_resolve() {
        assert!(Role::Validator.grants(Capability::ResolveValidations));
        assert!(!Role::Validator.grants(Capability::SubmitRequests));
        assert!(!Role::Validator.grants(Capability::FinalizeRequests));
    }

    #[test]
    fn hr_cannot_finalize_or_provision() {
        assert!(Role::Hr.grants(Capability::SubmitRequests));
        assert!(!Role::Hr.grants(Capability::ProvisionSystems));
        assert!(!Role::Hr.grants(Capability::FinalizeRequests));
    }
}
