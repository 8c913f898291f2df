//---------------------------------------
pub mod shared {
    pub mod models;
    pub mod dto;
}

pub use shared::models::*;
pub use shared::dto::*;
//---------------------------------------

//---------------------------------------
pub mod session {
    pub mod state;
    pub mod manager;
}

pub use session::manager::SessionManager;
pub use session::state::{Session, SharedSession};
//---------------------------------------

//---------------------------------------
pub mod cache {
    pub mod query_cache;
    pub mod task_cache;
}

pub use cache::task_cache::TaskCache;
//---------------------------------------

pub mod api;
pub mod context;
pub mod error;
pub mod persist;
pub mod shell;

pub use api::ApiClient;
pub use context::ClientContext;
pub use error::ClientError;

#[cfg(test)]
mod fake_backend;
