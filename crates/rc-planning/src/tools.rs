use parking_lot::RwLock;
use rc_types::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const BUILTIN_TOOLS: &[&str] = &["web_search", "file_search", "code_interpreter", "computer", "mcp"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

#[derive(Debug, Clone, Default)]
pub struct BuildToolPayloadInput {
    pub builtin: Vec<String>,
    pub include: Vec<String>,
}

/// `RegisterFunctionTool` / `BuildToolPayload`, per spec.md §4.10.
pub struct ToolRegistry {
    functions: RwLock<Vec<FunctionToolDefinition>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(Vec::new()),
        }
    }

    pub fn register_function_tool(&self, definition: FunctionToolDefinition) -> Result<()> {
        if definition.name.trim().is_empty() {
            return Err(Error::InvalidRequest("function tool name must not be empty".to_string()));
        }
        let mut functions = self.functions.write();
        if functions.iter().any(|f| f.name == definition.name) {
            return Err(Error::AlreadyRegistered(definition.name));
        }
        functions.push(definition);
        Ok(())
    }

    pub fn build_tool_payload(&self, input: BuildToolPayloadInput) -> Result<Vec<Value>> {
        let mut payload = Vec::new();

        for builtin in &input.builtin {
            if !BUILTIN_TOOLS.contains(&builtin.as_str()) {
                return Err(Error::UnknownBuiltin(builtin.clone()));
            }
            payload.push(serde_json::json!({ "type": builtin }));
        }

        let functions = self.functions.read();
        for name in &input.include {
            let function = functions
                .iter()
                .find(|f| &f.name == name)
                .ok_or_else(|| Error::UnknownTool(name.clone()))?;
            payload.push(serde_json::json!({
                "type": "function",
                "name": function.name,
                "description": function.description,
                "parameters": function.parameters,
            }));
        }

        Ok(payload)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_empty_name_is_invalid() {
        let registry = ToolRegistry::new();
        let err = registry
            .register_function_tool(FunctionToolDefinition {
                name: String::new(),
                description: None,
                parameters: serde_json::json!({}),
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn registering_duplicate_name_fails() {
        let registry = ToolRegistry::new();
        registry
            .register_function_tool(FunctionToolDefinition {
                name: "search".to_string(),
                description: None,
                parameters: serde_json::json!({}),
            })
            .unwrap();
        let err = registry
            .register_function_tool(FunctionToolDefinition {
                name: "search".to_string(),
                description: None,
                parameters: serde_json::json!({}),
            })
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered(_)));
    }

    #[test]
    fn build_tool_payload_orders_builtins_before_functions() {
        let registry = ToolRegistry::new();
        registry
            .register_function_tool(FunctionToolDefinition {
                name: "search".to_string(),
                description: None,
                parameters: serde_json::json!({}),
            })
            .unwrap();
        let payload = registry
            .build_tool_payload(BuildToolPayloadInput {
                builtin: vec!["web_search".to_string()],
                include: vec!["search".to_string()],
            })
            .unwrap();
        assert_eq!(payload[0]["type"], "web_search");
        assert_eq!(payload[1]["name"], "search");
    }

    #[test]
    fn unknown_builtin_is_rejected() {
        let registry = ToolRegistry::new();
        let err = registry
            .build_tool_payload(BuildToolPayloadInput {
                builtin: vec!["shell".to_string()],
                include: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, Error::UnknownBuiltin(_)));
    }

    #[test]
    fn missing_function_tool_is_rejected() {
        let registry = ToolRegistry::new();
        let err = registry
            .build_tool_payload(BuildToolPayloadInput {
                builtin: vec![],
                include: vec!["search".to_string()],
            })
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTool(_)));
    }
}
