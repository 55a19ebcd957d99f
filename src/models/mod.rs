pub mod chat;
pub mod event;
pub mod pipeline;
pub mod triage;

pub use chat::*;
pub use event::*;
pub use pipeline::*;
pub use triage::*;
