// Requests
pub mod bulk_update_request;
pub mod change_password_request;
pub mod create_task_request;
pub mod login_request;
pub mod logout_request;
pub mod profile_update;
pub mod signup_request;
pub mod update_task_request;

// Responses
pub mod auth_response;
pub mod bulk_update_response;
