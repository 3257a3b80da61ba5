use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::Server;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::register,
		routes::auth::login,
		routes::auth::me,
		routes::auth::logout,
		routes::departments::list_departments,
		routes::departments::create_department,
		routes::systems::list_systems,
		routes::systems::create_system,
		routes::systems::get_system,
		routes::systems::delete_system,
		routes::systems::list_validators,
		routes::systems::add_validator,
		routes::systems::remove_validator,
		routes::employees::list_employees,
		routes::employees::create_employee,
		routes::employees::get_employee,
		routes::users::list_users,
		routes::users::grant_role,
		routes::users::revoke_role,
		routes::users::set_department,
		routes::access_requests::list_requests,
		routes::access_requests::create_request,
		routes::access_requests::get_request,
		routes::access_requests::withdraw_request,
		routes::access_requests::provision_system,
		routes::access_requests::finalize_request,
		routes::validations::list_pending,
		routes::validations::resolve_validation,
		routes::notifications::list_notifications,
		routes::notifications::mark_read
	),
	components(
		schemas(
			routes::health::HealthResponse,
			routes::auth::MessageResponse,
			crate::authz::Role,
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::user::AssignRoleRequest,
			models::user::SetDepartmentRequest,
			models::department::Department,
			models::department::DepartmentCreateRequest,
			models::employee::Employee,
			models::employee::EmployeeCreateRequest,
			models::system::System,
			models::system::SystemDetail,
			models::system::SystemValidator,
			models::system::SystemCreateRequest,
			models::system::SystemValidatorCreateRequest,
			models::access_request::RequestStatus,
			models::access_request::AccessRequest,
			models::access_request::RequestedSystem,
			models::access_request::AccessRequestDetail,
			models::access_request::AccessRequestCreateRequest,
			models::validation::ValidationStatus,
			models::validation::ValidatorKind,
			models::validation::Decision,
			models::validation::ValidationRecord,
			models::validation::ResolveValidationRequest,
			models::validation::ValidationResolution,
			models::notification::Notification
		)
	),
	modifiers(&BearerAuth),
	tags(
		(name = "Health", description = "Liveness and dependency checks"),
		(name = "Auth", description = "Authentication endpoints"),
		(name = "Departments", description = "Departments and group validator scopes"),
		(name = "Systems", description = "System catalog and configured validators"),
		(name = "Employees", description = "People access is requested for"),
		(name = "Users", description = "Roles and department membership"),
		(name = "Access Requests", description = "Submission, provisioning and finalization"),
		(name = "Validations", description = "Multi-validator approvals"),
		(name = "Notifications", description = "In-app notifications")
	)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		if let Some(components) = openapi.components.as_mut() {
			components.add_security_scheme(
				"bearerAuth",
				SecurityScheme::Http(
					HttpBuilder::new()
						.scheme(HttpAuthScheme::Bearer)
						.bearer_format("JWT")
						.build(),
				),
			);
		}
	}
}

/// The document served at `/api-docs/openapi.json`, pointed at the local port.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = ApiDoc::openapi();
	if doc.paths.paths.is_empty() {
		anyhow::bail!("OpenAPI document has no paths");
	}

	doc.servers = Some(vec![Server::new(format!("http://localhost:{port}"))]);
	Ok(doc)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	Router::new()
		.route(
			"/api-docs/openapi.json",
			get(move || {
				let doc = doc.clone();
				async move { Json(doc) }
			}),
		)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn document_lists_workflow_paths_and_bearer_scheme() {
		let doc = build_openapi(8000).expect("openapi");

		assert!(doc.paths.paths.contains_key("/validations/{id}/resolve"));
		assert!(doc.paths.paths.contains_key("/access-requests/{id}/finalize"));
		let schemes = &doc.components.as_ref().expect("components").security_schemes;
		assert!(schemes.contains_key("bearerAuth"));
		assert_eq!(doc.servers.as_ref().map(Vec::len), Some(1));
	}
}
