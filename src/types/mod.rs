pub mod envelope;
pub mod events;
pub mod message;
pub mod records;

pub use envelope::{CallResult, RetError, retcode};
pub use events::{EventData, EventKind};
pub use message::{MessageContent, Segment};
pub use records::*;
