//! Jupyter notebook documents, as this system reads and writes them.
//!
//! The agent side of a notebook execution is intentionally minimal: it
//! builds a single-cell document for the code the model wants to run,
//! and parses the executed document the container prints back. The
//! [`extract_outputs`] function then pulls the three output categories
//! (plain-text results, stream text and inline PNG images) out of the
//! parsed cells.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod document;
mod outputs;

pub use document::*;
pub use outputs::*;
