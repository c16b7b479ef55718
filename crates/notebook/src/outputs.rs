use serde_json::Value;

use crate::document::{CellOutput, Notebook};

/// The three output categories pulled out of an executed notebook.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractedOutputs {
    /// Per cell, the `text/plain` payload of its first `execute_result`
    /// output. Always has one entry per cell, empty string when the
    /// cell produced no result, so positions stay aligned with cells.
    ///
    /// Payloads are kept as raw JSON values: they are usually a string
    /// or a list of strings, but anything else must survive unchanged
    /// for the caller to pass through.
    pub plain_text: Vec<Value>,
    /// Per cell, the text of its first `stream` output. Empty entries
    /// are dropped, order is otherwise preserved.
    pub stream_text: Vec<String>,
    /// Base64 PNG payloads from `display_data` outputs, one per cell
    /// that has one. Cells without an image are skipped entirely.
    pub images: Vec<String>,
}

/// Extracts the three output categories from an executed document.
pub fn extract_outputs(notebook: &Notebook) -> ExtractedOutputs {
    let plain_text = notebook
        .cells
        .iter()
        .map(|cell| {
            cell.outputs
                .iter()
                .find_map(|output| match output {
                    CellOutput::ExecuteResult { data, .. } => Some(
                        data.get("text/plain")
                            .cloned()
                            .unwrap_or_else(|| Value::String(String::new())),
                    ),
                    _ => None,
                })
                .unwrap_or_else(|| Value::String(String::new()))
        })
        .collect();

    let stream_text = notebook
        .cells
        .iter()
        .filter_map(|cell| {
            cell.outputs.iter().find_map(|output| match output {
                CellOutput::Stream { text, .. } => Some(text.joined()),
                _ => None,
            })
        })
        .filter(|text| !text.is_empty())
        .collect();

    let images = notebook
        .cells
        .iter()
        .filter_map(|cell| {
            let data = cell.outputs.iter().find_map(|output| match output {
                CellOutput::DisplayData { data, .. } => {
                    data.get("image/png")
                }
                _ => None,
            })?;
            let Some(payload) = base64_payload(data) else {
                warn!("unexpected image/png payload: {data:?}");
                return None;
            };
            Some(payload)
        })
        .collect();

    ExtractedOutputs {
        plain_text,
        stream_text,
        images,
    }
}

/// PNG payloads are base64 text, stored either as one string or split
/// into line fragments.
fn base64_payload(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => {
            let mut joined = String::new();
            for item in items {
                joined.push_str(item.as_str()?);
            }
            Some(joined)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::document::{Cell, CellType, Notebook, TextValue};

    fn cell_with_outputs(outputs: Vec<CellOutput>) -> Cell {
        Cell {
            cell_type: CellType::Code,
            execution_count: None,
            metadata: Default::default(),
            outputs,
            source: vec![],
        }
    }

    fn notebook_with_cells(cells: Vec<Cell>) -> Notebook {
        Notebook {
            cells,
            metadata: Default::default(),
            nbformat: 4,
            nbformat_minor: 4,
        }
    }

    fn execute_result(data: Value) -> CellOutput {
        let Value::Object(data) = data else {
            panic!("not an object");
        };
        CellOutput::ExecuteResult {
            data,
            execution_count: None,
            metadata: Default::default(),
        }
    }

    fn stream(text: &str) -> CellOutput {
        CellOutput::Stream {
            name: "stdout".to_owned(),
            text: TextValue::Single(text.to_owned()),
        }
    }

    #[test]
    fn test_plain_text_is_positionally_aligned() {
        let notebook = notebook_with_cells(vec![
            cell_with_outputs(vec![execute_result(
                json!({ "text/plain": "42" }),
            )]),
            cell_with_outputs(vec![]),
            cell_with_outputs(vec![execute_result(
                json!({ "text/plain": "'/mnt/data/out.csv'" }),
            )]),
        ]);

        let outputs = extract_outputs(&notebook);
        assert_eq!(
            outputs.plain_text,
            vec![
                json!("42"),
                json!(""),
                json!("'/mnt/data/out.csv'"),
            ]
        );
    }

    #[test]
    fn test_first_execute_result_wins() {
        let notebook = notebook_with_cells(vec![cell_with_outputs(vec![
            stream("noise"),
            execute_result(json!({ "text/plain": "first" })),
            execute_result(json!({ "text/plain": "second" })),
        ])]);

        let outputs = extract_outputs(&notebook);
        assert_eq!(outputs.plain_text, vec![json!("first")]);
    }

    #[test]
    fn test_missing_mime_entry_becomes_empty_string() {
        let notebook = notebook_with_cells(vec![cell_with_outputs(vec![
            execute_result(json!({ "text/html": "<b>42</b>" })),
        ])]);

        let outputs = extract_outputs(&notebook);
        assert_eq!(outputs.plain_text, vec![json!("")]);
    }

    #[test]
    fn test_empty_stream_entries_are_dropped() {
        let notebook = notebook_with_cells(vec![
            cell_with_outputs(vec![stream("")]),
            cell_with_outputs(vec![stream("hello")]),
            cell_with_outputs(vec![stream("")]),
        ]);

        let outputs = extract_outputs(&notebook);
        assert_eq!(outputs.stream_text, vec!["hello".to_owned()]);
    }

    #[test]
    fn test_stream_line_fragments_are_joined() {
        let notebook =
            notebook_with_cells(vec![cell_with_outputs(vec![
                CellOutput::Stream {
                    name: "stdout".to_owned(),
                    text: TextValue::Lines(vec![
                        "line 1\n".to_owned(),
                        "line 2\n".to_owned(),
                    ]),
                },
            ])]);

        let outputs = extract_outputs(&notebook);
        assert_eq!(outputs.stream_text, vec!["line 1\nline 2\n".to_owned()]);
    }

    #[test]
    fn test_images_skip_cells_without_png() {
        let png_cell = |payload: Value| {
            cell_with_outputs(vec![CellOutput::DisplayData {
                data: match json!({ "image/png": payload }) {
                    Value::Object(map) => map,
                    _ => unreachable!(),
                },
                metadata: Default::default(),
            }])
        };

        let notebook = notebook_with_cells(vec![
            png_cell(json!("aGVsbG8=")),
            cell_with_outputs(vec![]),
            png_cell(json!(["aGVs", "bG8="])),
        ]);

        let outputs = extract_outputs(&notebook);
        assert_eq!(
            outputs.images,
            vec!["aGVsbG8=".to_owned(), "aGVsbG8=".to_owned()]
        );
    }

    #[test]
    fn test_non_text_png_payload_is_skipped() {
        let notebook =
            notebook_with_cells(vec![cell_with_outputs(vec![
                CellOutput::DisplayData {
                    data: match json!({ "image/png": 42 }) {
                        Value::Object(map) => map,
                        _ => unreachable!(),
                    },
                    metadata: Default::default(),
                },
            ])]);

        let outputs = extract_outputs(&notebook);
        assert!(outputs.images.is_empty());
    }
}
