// Re-export all public items from the binding modules
pub use bound_field::*;
pub use field_binding::*;

pub mod bound_field;
pub mod field_binding;
pub mod validators;
