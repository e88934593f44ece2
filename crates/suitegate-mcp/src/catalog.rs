//! Static tool catalog.
//!
//! | Tool | Purpose |
//! |------|---------|
//! | `smartsuite_query` | List, get, search or count records |
//! | `smartsuite_record` | Create, update or delete records (dry run by default) |
//! | `smartsuite_schema` | Read an application's field structure |
//! | `smartsuite_discover` | Find tables and field names |
//! | `smartsuite_intelligent` | Knowledge-guided raw API operation |

use crate::protocol::{ToolAnnotations, ToolDefinition};
use crate::tools::ToolRegistry;
use serde_json::json;

pub const QUERY_TOOL: &str = "smartsuite_query";
pub const RECORD_TOOL: &str = "smartsuite_record";
pub const SCHEMA_TOOL: &str = "smartsuite_schema";
pub const DISCOVER_TOOL: &str = "smartsuite_discover";
pub const INTELLIGENT_TOOL: &str = "smartsuite_intelligent";

/// Every tool the server exposes.
pub fn builtin_tools() -> Vec<ToolDefinition> {
    vec![
        query_tool(),
        record_tool(),
        schema_tool(),
        discover_tool(),
        intelligent_tool(),
    ]
}

/// Registry pre-populated with [`builtin_tools`].
pub fn default_registry() -> ToolRegistry {
    builtin_tools().into_iter().collect()
}

fn query_tool() -> ToolDefinition {
    ToolDefinition {
        name: QUERY_TOOL.to_string(),
        description: Some(
            "Query SmartSuite records. Field names from configured mappings are translated to API field codes."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["list", "get", "search", "count"]
                },
                "tableId": {
                    "type": "string",
                    "description": "Application id or mapped table name"
                },
                "recordId": {
                    "type": "string",
                    "description": "Record id (required for get)"
                },
                "filters": {
                    "type": "object",
                    "description": "SmartSuite filter object: {operator, fields: [{field, comparison, value}]}"
                },
                "sort": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "field": {"type": "string"},
                            "direction": {"type": "string", "enum": ["asc", "desc"]}
                        }
                    }
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 1000,
                    "default": 200
                },
                "offset": {"type": "integer", "minimum": 0, "default": 0}
            },
            "required": ["operation", "tableId"]
        }),
        annotations: Some(ToolAnnotations {
            read_only: Some(true),
            ..Default::default()
        }),
    }
}

fn record_tool() -> ToolDefinition {
    ToolDefinition {
        name: RECORD_TOOL.to_string(),
        description: Some(
            "Create, update or delete SmartSuite records. Runs as a dry run unless dry_run is false; RED operations also need confirmed=true."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["create", "update", "delete", "bulk_update", "bulk_delete"]
                },
                "tableId": {
                    "type": "string",
                    "description": "Application id or mapped table name"
                },
                "recordId": {
                    "type": "string",
                    "description": "Record id (required for update and delete)"
                },
                "data": {
                    "description": "Record fields (object), records to update (array) or record ids to delete (array)"
                },
                "dry_run": {"type": "boolean", "default": true},
                "confirmed": {"type": "boolean", "default": false}
            },
            "required": ["operation", "tableId"]
        }),
        annotations: Some(ToolAnnotations {
            read_only: Some(false),
            destructive: Some(true),
            dry_run_supported: Some(true),
        }),
    }
}

fn schema_tool() -> ToolDefinition {
    ToolDefinition {
        name: SCHEMA_TOOL.to_string(),
        description: Some("Read the field structure of a SmartSuite application.".to_string()),
        input_schema: json!({
            "type": "object",
            "properties": {
                "tableId": {"type": "string"},
                "output_mode": {
                    "type": "string",
                    "enum": ["summary", "fields", "full"],
                    "default": "summary"
                }
            },
            "required": ["tableId"]
        }),
        annotations: Some(ToolAnnotations {
            read_only: Some(true),
            ..Default::default()
        }),
    }
}

fn discover_tool() -> ToolDefinition {
    ToolDefinition {
        name: DISCOVER_TOOL.to_string(),
        description: Some(
            "Discover available tables, or the human-readable field names of one table.".to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "scope": {
                    "type": "string",
                    "enum": ["tables", "fields"],
                    "default": "tables"
                },
                "tableId": {
                    "type": "string",
                    "description": "Required when scope is fields"
                }
            }
        }),
        annotations: Some(ToolAnnotations {
            read_only: Some(true),
            ..Default::default()
        }),
    }
}

fn intelligent_tool() -> ToolDefinition {
    ToolDefinition {
        name: INTELLIGENT_TOOL.to_string(),
        description: Some(
            "Analyze, dry-run or execute a raw SmartSuite API operation against the knowledge base of known failure modes. \
             learn never touches the network; dry_run makes one read-only probe; execute applies corrections and refuses RED operations without confirmed=true."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "mode": {
                    "type": "string",
                    "enum": ["learn", "dry_run", "execute"]
                },
                "endpoint": {
                    "type": "string",
                    "description": "API path, may contain {id} for the table id"
                },
                "method": {
                    "type": "string",
                    "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"]
                },
                "payload": {"type": "object"},
                "tableId": {"type": "string"},
                "operation_description": {"type": "string"},
                "confirmed": {"type": "boolean", "default": false}
            },
            "required": ["mode", "endpoint", "method", "operation_description"]
        }),
        annotations: Some(ToolAnnotations {
            read_only: Some(false),
            destructive: Some(true),
            dry_run_supported: Some(true),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tools_have_object_schemas() {
        let tools = builtin_tools();
        assert_eq!(tools.len(), 5);
        for tool in &tools {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            assert!(tool.description.is_some());
        }
    }

    #[test]
    fn test_default_registry() {
        let registry = default_registry();
        assert!(registry.contains(INTELLIGENT_TOOL));
        assert_eq!(registry.names()[0], DISCOVER_TOOL);
    }

    #[test]
    fn test_builtin_schemas_enforced() {
        let registry = default_registry();
        for tool in builtin_tools() {
            assert!(jsonschema::validator_for(&tool.input_schema).is_ok(), "{}", tool.name);
        }

        assert!(registry
            .validate(QUERY_TOOL, &json!({"operation": "list", "tableId": "t", "sort": [{"field": "x", "direction": "desc"}]}))
            .is_ok());
        assert!(registry
            .validate(QUERY_TOOL, &json!({"operation": "list", "tableId": "t", "sort": [{"field": "x", "direction": "sideways"}]}))
            .is_err());
        assert!(registry
            .validate(INTELLIGENT_TOOL, &json!({"mode": "learn", "endpoint": "/x", "method": "get", "operation_description": "d"}))
            .is_err());
        assert!(registry.validate(DISCOVER_TOOL, &json!({})).is_ok());
    }

    #[test]
    fn test_intelligent_tool_requires_description() {
        let tool = intelligent_tool();
        let required = tool.input_schema["required"].as_array().unwrap();
        assert!(required.iter().any(|r| r == "operation_description"));
    }
}
