//! An abstraction layer for completion providers.
//!
//! The agent talks to a hosted model through the types in this crate: it
//! sends the full conversation as a [`ModelRequest`] and reads back a stream
//! of text deltas that together form one structured step. Switching between
//! providers doesn't require touching the agent.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
