use std::error::Error as StdError;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The notebook format version this system builds.
pub const NBFORMAT: u32 = 4;
/// The notebook format minor version this system builds.
pub const NBFORMAT_MINOR: u32 = 4;

/// Error produced when a notebook document cannot be parsed or
/// serialized.
#[derive(Debug)]
pub struct FormatError {
    reason: String,
}

impl FormatError {
    #[inline]
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl StdError for FormatError {}

/// The type of a notebook cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    /// An executable code cell.
    Code,
    /// A markdown cell.
    Markdown,
    /// A raw cell.
    Raw,
    /// Any cell type this system doesn't know about.
    #[serde(other)]
    Other,
}

/// Text that notebooks store either as one string or as a list of
/// line fragments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextValue {
    /// A single string.
    Single(String),
    /// Line fragments, to be concatenated in order.
    Lines(Vec<String>),
}

impl TextValue {
    /// Returns the text with all fragments concatenated.
    pub fn joined(&self) -> String {
        match self {
            TextValue::Single(text) => text.clone(),
            TextValue::Lines(lines) => lines.concat(),
        }
    }

    /// Returns whether the text is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            TextValue::Single(text) => text.is_empty(),
            TextValue::Lines(lines) => lines.iter().all(String::is_empty),
        }
    }
}

impl Default for TextValue {
    #[inline]
    fn default() -> Self {
        TextValue::Single(String::new())
    }
}

/// One output captured for a cell, tagged by its `output_type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum CellOutput {
    /// The result value of the cell, as a MIME bundle.
    ExecuteResult {
        /// MIME type to payload mapping.
        #[serde(default)]
        data: Map<String, Value>,
        /// The execution counter when this result was produced.
        #[serde(default)]
        execution_count: Option<i64>,
        /// Output metadata.
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    /// Rich display data, as a MIME bundle.
    DisplayData {
        /// MIME type to payload mapping.
        #[serde(default)]
        data: Map<String, Value>,
        /// Output metadata.
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    /// Text printed to stdout or stderr.
    Stream {
        /// The stream name (`stdout` or `stderr`).
        #[serde(default)]
        name: String,
        /// The captured text.
        #[serde(default)]
        text: TextValue,
    },
    /// An execution error raised by the cell.
    Error {
        /// The exception name.
        ename: String,
        /// The exception value.
        evalue: String,
        /// The formatted traceback lines.
        #[serde(default)]
        traceback: Vec<String>,
    },
}

/// One unit of source plus the outputs produced when it was executed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// The type of this cell.
    pub cell_type: CellType,
    /// The execution counter, `null` until the cell has run.
    #[serde(default)]
    pub execution_count: Option<i64>,
    /// Cell metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Captured outputs, in execution order.
    #[serde(default)]
    pub outputs: Vec<CellOutput>,
    /// The source lines of this cell.
    #[serde(default)]
    pub source: Vec<String>,
}

/// A structured notebook document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    /// The ordered cells.
    pub cells: Vec<Cell>,
    /// Document metadata, opaque to this system.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// The major format version.
    pub nbformat: u32,
    /// The minor format version.
    pub nbformat_minor: u32,
}

impl Notebook {
    /// Builds a minimal document with a single code cell holding
    /// `source`. The source is not validated in any way.
    pub fn from_source(source: &str) -> Self {
        Notebook {
            cells: vec![Cell {
                cell_type: CellType::Code,
                execution_count: None,
                metadata: Map::new(),
                outputs: vec![],
                source: vec![source.to_owned()],
            }],
            metadata: Map::new(),
            nbformat: NBFORMAT,
            nbformat_minor: NBFORMAT_MINOR,
        }
    }

    /// Parses a document from its JSON text.
    pub fn parse(raw: &str) -> Result<Self, FormatError> {
        serde_json::from_str(raw).map_err(|err| {
            FormatError::new(format!(
                "not a well-formed notebook document: {err}"
            ))
        })
    }

    /// Serializes the document to JSON text.
    pub fn to_json(&self) -> Result<String, FormatError> {
        serde_json::to_string(self).map_err(|err| {
            FormatError::new(format!("failed to serialize notebook: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_single_code_cell() {
        let nb = Notebook::from_source("print('hi')");
        assert_eq!(nb.cells.len(), 1);
        assert_eq!(nb.cells[0].cell_type, CellType::Code);
        assert_eq!(nb.cells[0].source, vec!["print('hi')".to_owned()]);
        assert!(nb.cells[0].outputs.is_empty());
        assert_eq!(nb.nbformat, 4);
        assert_eq!(nb.nbformat_minor, 4);
    }

    #[test]
    fn test_round_trip() {
        let code = "import pandas as pd\npd.DataFrame()";
        let nb = Notebook::from_source(code);
        let parsed = Notebook::parse(&nb.to_json().unwrap()).unwrap();
        assert_eq!(parsed.cells[0].source, vec![code.to_owned()]);
        assert_eq!(parsed, nb);
    }

    #[test]
    fn test_parse_executed_document() {
        let raw = r#"{
            "cells": [{
                "cell_type": "code",
                "execution_count": 1,
                "metadata": {},
                "outputs": [
                    {
                        "output_type": "stream",
                        "name": "stdout",
                        "text": ["hello\n"]
                    },
                    {
                        "output_type": "execute_result",
                        "execution_count": 1,
                        "metadata": {},
                        "data": { "text/plain": "'/mnt/data/out.csv'" }
                    }
                ],
                "source": ["print('hello')"]
            }],
            "metadata": { "language_info": { "name": "python" } },
            "nbformat": 4,
            "nbformat_minor": 4
        }"#;
        let nb = Notebook::parse(raw).unwrap();
        assert_eq!(nb.cells[0].outputs.len(), 2);
        assert!(matches!(
            nb.cells[0].outputs[0],
            CellOutput::Stream { .. }
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(Notebook::parse("not json at all").is_err());

        // Valid JSON, but not a notebook document.
        let err = Notebook::parse(r#"{ "metadata": {} }"#).unwrap_err();
        assert!(err.reason().contains("not a well-formed"));
    }

    #[test]
    fn test_text_value_joined() {
        let single = TextValue::Single("a\nb".to_owned());
        assert_eq!(single.joined(), "a\nb");
        let lines =
            TextValue::Lines(vec!["a\n".to_owned(), "b".to_owned()]);
        assert_eq!(lines.joined(), "a\nb");
        assert!(TextValue::default().is_empty());
        assert!(TextValue::Lines(vec![]).is_empty());
    }
}
