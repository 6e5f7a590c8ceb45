// Re-export all public items from the model modules
pub use alert_window::*;
pub use client::*;
pub use health_signal::*;

pub mod alert_window;
pub mod client;
pub mod health_signal;
