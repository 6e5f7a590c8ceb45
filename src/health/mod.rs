// Re-export all public items from the health modules
pub use evaluator::*;
pub use monitor::*;
pub use restart::*;

pub mod evaluator;
pub mod monitor;
pub mod restart;
