use std::collections::HashMap;
use std::future::ready;
use std::pin::Pin;

use pybox_model::{ModelTool, ToolCallRequest};

use crate::tool::{Error, ToolObject, ToolResult};

/// A registry that holds the toolset and serves tool call requests from
/// the model.
pub struct Registry {
    tools: HashMap<String, Box<dyn ToolObject>>,
}

impl Registry {
    pub fn with_tools(tools: Vec<Box<dyn ToolObject>>) -> Self {
        let mut tool_map = HashMap::with_capacity(tools.len());
        for tool in tools {
            let name = tool.name();
            tool_map.insert(name.to_owned(), tool);
        }
        let tools = tool_map;
        Self { tools }
    }

    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .values()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    /// Dispatches one tool call request. An unregistered tool name is
    /// answered with an error result, never a panic, so the model can
    /// see what went wrong.
    pub fn call(
        &self,
        req: &ToolCallRequest,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        let Some(tool) = self.tools.get(&req.name) else {
            warn!("tool not found: {}", req.name);
            let reason = format!("no tool named `{}`", req.name);
            return Box::pin(ready(Err(
                Error::unknown_tool().with_reason(reason)
            )));
        };
        trace!("calling tool ({}) with args: {:?}", req.id, req.arguments);
        tool.execute(req.arguments.clone())
    }
}
