pub mod access_request;
pub mod department;
pub mod employee;
pub mod notification;
pub mod system;
pub mod user;
pub mod validation;
