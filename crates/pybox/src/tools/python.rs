use std::env;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use pybox_core::tool::{Error as ToolError, Tool, ToolResult};
use pybox_notebook::{Notebook, extract_outputs};
use pybox_storage::BlobClient;
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use crate::artifacts::{ArtifactRouter, SANDBOX_MOUNT};

const CONTAINER_IMAGE: &str = "jupyter-runtime";

#[derive(Deserialize, JsonSchema)]
pub struct PythonToolParameters {
    #[schemars(
        description = "The code content to execute in the runtime \
                       execution environment."
    )]
    input: String,
}

/// A tool that executes Python code in a containerized, non-stateful
/// Jupyter notebook.
///
/// Each call builds a single-cell notebook, executes it with
/// `nbconvert` inside the container and reports the notebook outputs
/// back as JSON. Files the code saves under the sandbox's `/mnt/data`
/// mount are routed through [`ArtifactRouter`].
pub struct PythonTool {
    parameter_schema: Value,
    output_dir: PathBuf,
    router: ArtifactRouter,
}

impl PythonTool {
    /// Creates a new python tool.
    ///
    /// `output_dir` is the host directory mounted into the container;
    /// when `blob` is set, artifacts are uploaded there instead of
    /// being referenced by their host path.
    #[inline]
    pub fn new(output_dir: PathBuf, blob: Option<BlobClient>) -> Self {
        PythonTool {
            parameter_schema: schema_for!(PythonToolParameters).to_value(),
            router: ArtifactRouter::new(output_dir.clone(), blob),
            output_dir,
        }
    }
}

impl Tool for PythonTool {
    type Input = PythonToolParameters;

    fn name(&self) -> &str {
        "execute_python"
    }

    fn description(&self) -> &str {
        "Execute python in a jupyter notebook environment"
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: PythonToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let output_dir = self.output_dir.clone();
        let router = self.router.clone();
        async move {
            run_in_notebook(&input.input, &output_dir, &router)
                .await
                .map_err(|err| {
                    error!("notebook execution failed: {err}");
                    ToolError::execution_error().with_reason(format!(
                        "executing python in notebook failed, fix and try \
                         again: {err}"
                    ))
                })
        }
    }
}

async fn run_in_notebook(
    code: &str,
    output_dir: &Path,
    router: &ArtifactRouter,
) -> Result<String, String> {
    let tmp_dir = env::temp_dir();
    let notebook_name = format!("py-{}", unique_suffix());
    let notebook_path = tmp_dir.join(format!("{notebook_name}.ipynb"));

    let notebook = Notebook::from_source(code);
    let raw = notebook
        .to_json()
        .map_err(|err| format!("failed to build notebook: {err}"))?;
    // The output dir comes first: once the notebook file exists, every
    // remaining exit path runs the removal below.
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|err| format!("failed to create output dir: {err}"))?;
    tokio::fs::write(&notebook_path, raw).await.map_err(|err| {
        format!("failed to write {}: {err}", notebook_path.display())
    })?;

    debug!("executing notebook {}", notebook_path.display());
    let result =
        execute_in_container(&tmp_dir, &notebook_name, output_dir).await;

    // The temp notebook goes away whether the run succeeded or not.
    if let Err(err) = tokio::fs::remove_file(&notebook_path).await {
        warn!("failed to remove {}: {err}", notebook_path.display());
    }

    let stdout = result?;
    build_tool_response(&stdout, router).await
}

/// Runs the notebook with `nbconvert` inside the container and returns
/// the executed document that `cat` prints to stdout.
async fn execute_in_container(
    tmp_dir: &Path,
    notebook_name: &str,
    output_dir: &Path,
) -> Result<String, String> {
    let execution_path = format!("/app/{notebook_name}.ipynb");
    let output_path = format!("/app/{notebook_name}_output.ipynb");
    let script = format!(
        "xvfb-run -a jupyter nbconvert --to notebook --execute \
         {execution_path} --output {output_path} && cat {output_path}"
    );

    let output = Command::new("docker")
        .arg("run")
        .arg("--rm")
        .arg("-v")
        .arg(format!("{}:/app", tmp_dir.display()))
        .arg("-v")
        .arg(format!("{}:{SANDBOX_MOUNT}", output_dir.display()))
        .arg(CONTAINER_IMAGE)
        .arg("/bin/bash")
        .arg("-c")
        .arg(script)
        .output()
        .await
        .map_err(|err| format!("failed to run docker: {err}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    interpret_container_output(stdout, &stderr)
}

/// Decides whether a finished container run produced a usable document.
///
/// `nbconvert` logs progress to stderr even on success, so stderr alone
/// means nothing; the run only failed when it produced no stdout at
/// all.
fn interpret_container_output(
    stdout: String,
    stderr: &str,
) -> Result<String, String> {
    if stdout.is_empty() && !stderr.is_empty() {
        return Err(stderr.to_owned());
    }
    Ok(stdout)
}

/// Parses the executed document, routes its artifacts and serializes
/// the response handed back to the model.
async fn build_tool_response(
    raw: &str,
    router: &ArtifactRouter,
) -> Result<String, String> {
    let notebook =
        Notebook::parse(raw).map_err(|err| format!("{err}"))?;
    let outputs = extract_outputs(&notebook);

    let mut plain_text = Vec::with_capacity(outputs.plain_text.len());
    for value in outputs.plain_text {
        let routed = router
            .route_value(value)
            .await
            .map_err(|err| format!("{err}"))?;
        plain_text.push(routed);
    }
    let image_urls = router
        .route_images(outputs.images)
        .await
        .map_err(|err| format!("{err}"))?;

    let mut response = serde_json::Map::new();
    if !image_urls.is_empty() {
        response.insert("imageUrls".to_owned(), image_urls.into());
    }
    response
        .insert("textOutputs".to_owned(), outputs.stream_text.into());
    response.insert("plainTextOutputs".to_owned(), plain_text.into());

    serde_json::to_string(&Value::Object(response))
        .map_err(|err| format!("failed to serialize response: {err}"))
}

fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parameter_schema_requires_input() {
        let tool = PythonTool::new(PathBuf::from("/tmp/out"), None);
        let schema = tool.parameter_schema();
        assert_eq!(schema["type"], "object");
        assert!(
            schema["required"]
                .as_array()
                .unwrap()
                .contains(&json!("input"))
        );
    }

    #[test]
    fn test_container_output_policy() {
        // stderr noise from nbconvert does not fail a run with output.
        assert_eq!(
            interpret_container_output(
                "{\"cells\": []}".to_owned(),
                "[NbConvertApp] Converting notebook",
            ),
            Ok("{\"cells\": []}".to_owned())
        );
        // No stdout and a populated stderr is a failure carrying the
        // stderr text.
        let err =
            interpret_container_output(String::new(), "boom").unwrap_err();
        assert!(err.contains("boom"));
        // Both empty: not a failure here, the parse step reports it.
        assert_eq!(
            interpret_container_output(String::new(), ""),
            Ok(String::new())
        );
    }

    #[tokio::test]
    async fn test_tool_response_shape() {
        let raw = json!({
            "cells": [{
                "cell_type": "code",
                "execution_count": 1,
                "metadata": {},
                "outputs": [
                    {
                        "output_type": "stream",
                        "name": "stdout",
                        "text": ["saved\n"]
                    },
                    {
                        "output_type": "execute_result",
                        "execution_count": 1,
                        "data": { "text/plain": "'/mnt/data/out.csv'" },
                        "metadata": {}
                    }
                ],
                "source": ["write_csv()"]
            }],
            "metadata": {},
            "nbformat": 4,
            "nbformat_minor": 4
        })
        .to_string();

        let router = ArtifactRouter::new(PathBuf::from("/tmp/out"), None);
        let response = build_tool_response(&raw, &router).await.unwrap();
        let response: Value = serde_json::from_str(&response).unwrap();

        assert_eq!(response["textOutputs"], json!(["saved\n"]));
        assert_eq!(response["plainTextOutputs"], json!(["/tmp/out/out.csv"]));
        // No images, so the key is omitted entirely.
        assert!(response.get("imageUrls").is_none());
    }

    #[tokio::test]
    async fn test_failed_output_dir_leaves_no_temp_notebook() {
        let base = std::env::temp_dir()
            .join(format!("pybox-python-test-{}", unique_suffix()));
        tokio::fs::create_dir_all(&base).await.unwrap();
        // A regular file where a directory is needed makes
        // `create_dir_all` fail.
        let blocker = base.join("blocker");
        tokio::fs::write(&blocker, b"").await.unwrap();
        let output_dir = blocker.join("output");

        let before = temp_notebook_names();
        let router = ArtifactRouter::new(output_dir.clone(), None);
        let result = run_in_notebook("print(1)", &output_dir, &router).await;
        assert!(result.is_err());
        assert_eq!(temp_notebook_names(), before);

        tokio::fs::remove_dir_all(&base).await.unwrap();
    }

    fn temp_notebook_names() -> Vec<String> {
        let mut names = std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(|entry| {
                let name = entry.ok()?.file_name().into_string().ok()?;
                (name.starts_with("py-") && name.ends_with(".ipynb"))
                    .then_some(name)
            })
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_tool_response_rejects_garbage() {
        let router = ArtifactRouter::new(PathBuf::from("/tmp/out"), None);
        assert!(build_tool_response("not json", &router).await.is_err());
    }
}
