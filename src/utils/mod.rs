pub mod error_handling;
pub mod formatting;

pub use error_handling::{create_runtime, safe_lock};
