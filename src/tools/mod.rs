//! Tool system for the Ralph loop
//!
//! The toolkit executes the fixed catalog of tools the LLM may call. Every
//! path is confined to the task's working directory and every shell command
//! runs under a timeout. Tools never fail the iteration - errors are
//! flattened into `{error}` payloads fed back to the model.

mod context;
mod error;
mod executor;
pub mod shell;
mod traits;

pub mod builtin;

pub use context::ToolContext;
pub use error::ToolError;
pub use executor::Toolkit;
pub use traits::Tool;
