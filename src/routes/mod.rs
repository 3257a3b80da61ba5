pub mod access_requests;
pub mod auth;
pub mod departments;
pub mod employees;
pub mod health;
pub mod notifications;
pub mod systems;
pub mod users;
pub mod validations;
