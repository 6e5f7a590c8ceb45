pub mod action;
pub mod admin;
pub mod auth;
pub mod binding;
pub mod config;
pub mod context;
pub mod health;
pub mod model;
pub mod notifier;
pub mod store;

pub use action::AsyncAction;
pub use config::Config;
pub use context::AppContext;
pub use store::{ArcStore, DocumentStore, DocumentStoreExt};
