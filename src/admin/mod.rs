// Re-export all public items from the admin modules
pub use client_action::*;
pub use directory::*;
pub use dispatcher::*;
pub use inventory_action::*;
pub use upload::*;

pub mod client_action;
pub mod directory;
pub mod dispatcher;
pub mod inventory_action;
pub mod upload;
