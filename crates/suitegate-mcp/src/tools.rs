//! Tool registry for MCP tools.
//!
//! Tool definitions themselves live in [`crate::catalog`]. Each tool's input
//! schema is compiled once, at registration.

use crate::protocol::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Number of schema violations reported for one call.
const MAX_REPORTED_ERRORS: usize = 5;

#[derive(Clone)]
struct RegisteredTool {
    definition: ToolDefinition,
    // None when the schema failed to compile; calls to the tool are refused.
    validator: Option<Arc<jsonschema::Validator>>,
}

/// Registry of available MCP tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: ToolDefinition) {
        let validator = match jsonschema::validator_for(&tool.input_schema) {
            Ok(validator) => Some(Arc::new(validator)),
            Err(e) => {
                tracing::error!(tool = %tool.name, error = %e, "Invalid tool input schema");
                None
            }
        };
        self.tools.insert(
            tool.name.clone(),
            RegisteredTool {
                definition: tool,
                validator,
            },
        );
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|t| &t.definition)
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tools, sorted by name.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        let mut tools: Vec<&ToolDefinition> = self.tools.values().map(|t| &t.definition).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.list().into_iter().map(|t| t.name.as_str()).collect()
    }

    /// Validate call arguments against the tool's input schema.
    ///
    /// Missing arguments count as an empty object, and top-level `null`
    /// members count as absent.
    pub fn validate(&self, name: &str, arguments: &Value) -> Result<(), String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| format!("Unknown tool: {}", name))?;
        let validator = tool
            .validator
            .as_ref()
            .ok_or_else(|| format!("Tool {} has an invalid input schema", name))?;

        let instance = match arguments {
            Value::Null => Value::Object(Default::default()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            _ => return Err("Arguments must be a JSON object".to_string()),
        };

        let errors: Vec<String> = validator
            .iter_errors(&instance)
            .take(MAX_REPORTED_ERRORS)
            .map(|error| {
                let path = error.instance_path().to_string();
                if path.is_empty() {
                    error.to_string()
                } else {
                    format!("{}: {}", path, error)
                }
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(format!("Invalid arguments for {}: {}", name, errors.join("; ")))
        }
    }
}

impl FromIterator<ToolDefinition> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = ToolDefinition>>(iter: I) -> Self {
        let mut registry = Self::new();
        for tool in iter {
            registry.register(tool);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: Some(format!("Test tool: {}", name)),
            input_schema: json!({"type": "object"}),
            annotations: None,
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(create_test_tool("test"));

        assert!(registry.get("test").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_list_is_sorted() {
        let registry: ToolRegistry = ["zeta", "alpha", "mid"]
            .into_iter()
            .map(create_test_tool)
            .collect();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.names(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(create_test_tool("test"));
        let mut replacement = create_test_tool("test");
        replacement.description = None;
        registry.register(replacement);

        assert_eq!(registry.len(), 1);
        assert!(registry.get("test").unwrap().description.is_none());
    }

    #[test]
    fn test_validate_nested_schema() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDefinition {
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "sort": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {"direction": {"enum": ["asc", "desc"]}}
                        }
                    }
                },
                "required": ["name"]
            }),
            ..create_test_tool("sorter")
        });

        assert!(registry.validate("sorter", &json!({"name": "a", "sort": [{"direction": "asc"}]})).is_ok());
        assert!(registry.validate("sorter", &json!({"name": "a", "sort": null})).is_ok());

        let err = registry
            .validate("sorter", &json!({"name": "a", "sort": [{"direction": "sideways"}]}))
            .unwrap_err();
        assert!(err.contains("/sort/0/direction"), "{}", err);

        let err = registry.validate("sorter", &Value::Null).unwrap_err();
        assert!(err.contains("name"), "{}", err);

        assert!(registry.validate("sorter", &json!([1])).is_err());
        assert!(registry.validate("missing", &json!({})).is_err());
    }

    #[test]
    fn test_invalid_schema_refuses_calls() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDefinition {
            input_schema: json!({"type": "object", "properties": {"x": {"type": 12}}}),
            ..create_test_tool("broken")
        });

        assert!(registry.contains("broken"));
        assert!(registry.validate("broken", &json!({})).unwrap_err().contains("invalid input schema"));
    }
}
