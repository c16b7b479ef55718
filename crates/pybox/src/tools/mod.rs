//! Tools that the agent can use.

mod python;

pub use python::PythonTool;
