//! An out-of-the-box step-by-step agent with a set of built-in tools.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring the agent into your own host apps, through
//! [`SessionBuilder`].

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod session;
pub mod tools;

pub use session::{
    HOST_OS_PLACEHOLDER, Profile, Session, SessionBuilder, UnknownProfile,
    host_os,
};

/// Re-exports of [`stepwise_core`] crate.
pub mod core {
    pub use stepwise_core::*;
}
