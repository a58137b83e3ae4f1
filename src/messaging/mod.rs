//! Messages between the gateway and entity runtimes
//!
//! - `Envelope`: a command plus the entity key and reply handle
//! - `PendingAsks` / `ReplyTo`: correlation of replies to waiting asks

mod correlation;
mod envelope;

pub use correlation::{AskId, PendingAsks, ReplyResult, ReplyTo};
pub use envelope::Envelope;
