//! An out-of-the-box agent that answers chat messages by writing and
//! running Python code in a containerized Jupyter notebook sandbox.
//!
//! The crate includes a CLI chat loop and a Telegram bot surface. You
//! can also use it as a library to bring the python-execution tool into
//! your own host apps. Output files the sandbox writes under its
//! `/mnt/data` mount are routed either to a local output directory or,
//! when blob storage is configured, uploaded and returned as signed
//! URLs.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

pub mod artifacts;
pub mod bot;
pub mod config;
mod session;
pub mod tools;

pub use session::{Session, SessionBuilder};

/// Re-exports of [`pybox_core`] crate.
pub mod core {
    pub use pybox_core::*;
}
