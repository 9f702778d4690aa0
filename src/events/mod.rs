//! Task event stream
//!
//! Loop progress is published on a broadcast bus instead of callbacks, so a
//! slow or panicking subscriber can never stall or poison the loop.

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus};
pub use types::TaskEvent;
