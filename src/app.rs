use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{DefaultPolicyEvaluator, PolicyEvaluator};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{
    access_requests, auth, departments, employees, health, notifications, systems, users, validations,
};
use crate::workflow::WorkflowService;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
    pub policy: Arc<dyn PolicyEvaluator>,
    pub workflow: WorkflowService,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        let policy: Arc<dyn PolicyEvaluator> = Arc::new(DefaultPolicyEvaluator::new());
        let workflow = WorkflowService::new(pool.clone(), event_bus.clone(), Arc::clone(&policy));

        Self {
            pool,
            jwt: Arc::new(jwt),
            event_bus,
            policy,
            workflow,
        }
    }
}

/// Builds the router and starts the activity listener on the current runtime.
pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let (event_bus, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let department_routes = Router::new()
        .route("/", get(departments::list_departments).post(departments::create_department));

    let system_routes = Router::new()
        .route("/", get(systems::list_systems).post(systems::create_system))
        .route("/:id", get(systems::get_system).delete(systems::delete_system))
        .route("/:id/validators", get(systems::list_validators).post(systems::add_validator))
        .route("/:id/validators/:validator_id", delete(systems::remove_validator));

    let employee_routes = Router::new()
        .route("/", get(employees::list_employees).post(employees::create_employee))
        .route("/:id", get(employees::get_employee));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/:id/roles", post(users::grant_role))
        .route("/:id/roles/:role", delete(users::revoke_role))
        .route("/:id/department", put(users::set_department));

    let request_routes = Router::new()
        .route("/", get(access_requests::list_requests).post(access_requests::create_request))
        .route("/:id", get(access_requests::get_request).delete(access_requests::withdraw_request))
        .route("/:id/systems/:system_id/provision", post(access_requests::provision_system))
        .route("/:id/finalize", post(access_requests::finalize_request));

    let validation_routes = Router::new()
        .route("/pending", get(validations::list_pending))
        .route("/:id/resolve", post(validations::resolve_validation));

    let notification_routes = Router::new()
        .route("/", get(notifications::list_notifications))
        .route("/:id/read", post(notifications::mark_read));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/departments", department_routes)
        .nest("/systems", system_routes)
        .nest("/employees", employee_routes)
        .nest("/users", user_routes)
        .nest("/access-requests", request_routes)
        .nest("/validations", validation_routes)
        .nest("/notifications", notification_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
