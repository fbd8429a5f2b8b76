//! Function-calling declarations for an agent's configured tools.

use serde_json::{Map, Value, json};
use tracing::debug;

use agent_forge_core::types::{
    FILE_SEARCH_TOOL, ParamSpec, ToolDeclaration, ToolSpec, WEB_SEARCH_TOOL,
};

/// Function name the model calls for the built-in web search tool.
pub const WEB_SEARCH_FUNCTION: &str = "web_search";
/// Function name the model calls for the built-in file search tool.
pub const FILE_SEARCH_FUNCTION: &str = "file_search";

/// Parameter keys that hold built-in tool settings rather than model-facing
/// parameters. They are dropped from every generated schema, not only from
/// the built-in tools'.
pub const RESERVED_PARAMS: [&str; 2] = ["max_num_results", "vector_store_ids"];

/// Convert an agent's tools into declarations, one per tool, in order.
pub fn build_declarations(tools: &[ToolSpec]) -> Vec<ToolDeclaration> {
    let declarations: Vec<ToolDeclaration> = tools.iter().map(declare).collect();
    debug!(
        count = declarations.len(),
        names = ?declarations.iter().map(|d| d.name()).collect::<Vec<_>>(),
        "Built tool declarations"
    );
    declarations
}

fn declare(tool: &ToolSpec) -> ToolDeclaration {
    match tool.name.as_str() {
        WEB_SEARCH_TOOL => web_search_declaration(),
        FILE_SEARCH_TOOL => file_search_declaration(),
        _ => ToolDeclaration::function(
            &tool.name,
            tool.description.clone().unwrap_or_default(),
            parameters_schema(&tool.parameters),
        ),
    }
}

fn web_search_declaration() -> ToolDeclaration {
    ToolDeclaration::function(
        WEB_SEARCH_FUNCTION,
        "Search the web for information",
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query" }
            },
            "required": ["query"]
        }),
    )
}

fn file_search_declaration() -> ToolDeclaration {
    ToolDeclaration::function(
        FILE_SEARCH_FUNCTION,
        "Search through vector stores of documents",
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search query" },
                "max_results": {
                    "type": "number",
                    "description": "Maximum number of results to return"
                }
            },
            "required": ["query"]
        }),
    )
}

/// Project a tool's parameter map into `{type, properties, required?}`.
fn parameters_schema(parameters: &Map<String, Value>) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for (name, raw) in parameters {
        if RESERVED_PARAMS.contains(&name.as_str()) {
            continue;
        }
        let spec = ParamSpec::decode_lenient(raw);
        properties.insert(
            name.clone(),
            json!({ "type": spec.param_type, "description": spec.description }),
        );
        if spec.required {
            required.push(Value::String(name.clone()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }
    Value::Object(schema)
}

#[cfg(test)]
mod tests {
    use agent_forge_core::types::ToolCategory;

    use super::*;

    fn function_tool(name: &str, parameters: Value) -> ToolSpec {
        ToolSpec {
            id: name.to_lowercase(),
            name: name.into(),
            category: ToolCategory::Function,
            description: Some(format!("{name} tool")),
            parameters: parameters.as_object().cloned().unwrap_or_default(),
            code: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn test_empty_tools_yield_nothing() {
        assert!(build_declarations(&[]).is_empty());
    }

    #[test]
    fn test_builtin_tools_get_fixed_schemas() {
        let decls = build_declarations(&[ToolSpec::web_search(), ToolSpec::file_search()]);
        assert_eq!(decls.len(), 2);

        assert_eq!(decls[0].decl_type, "function");
        assert_eq!(decls[0].name(), "web_search");
        assert_eq!(decls[0].function.parameters["required"], json!(["query"]));
        assert_eq!(decls[0].function.parameters["properties"]["query"]["type"], "string");

        assert_eq!(decls[1].name(), "file_search");
        let props = &decls[1].function.parameters["properties"];
        assert_eq!(props["max_results"]["type"], "number");
        assert!(props.get("max_num_results").is_none());
        assert_eq!(decls[1].function.parameters["required"], json!(["query"]));
    }

    #[test]
    fn test_function_tool_schema() {
        let tool = function_tool(
            "lookup_order",
            json!({
                "order_id": { "type": "string", "description": "Order number", "required": true },
                "verbose": { "type": "boolean" }
            }),
        );
        let decl = &build_declarations(&[tool])[0];
        assert_eq!(decl.name(), "lookup_order");
        assert_eq!(decl.function.description, "lookup_order tool");

        let schema = &decl.function.parameters;
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["order_id"]["description"], "Order number");
        assert_eq!(schema["properties"]["verbose"]["type"], "boolean");
        assert_eq!(schema["properties"]["verbose"]["description"], "");
        assert_eq!(schema["required"], json!(["order_id"]));
    }

    #[test]
    fn test_required_omitted_when_nothing_required() {
        let tool = function_tool("ping", json!({ "host": { "type": "string" } }));
        let schema = &build_declarations(&[tool])[0].function.parameters;
        assert!(schema.get("required").is_none());
    }

    #[test]
    fn test_reserved_params_dropped_from_function_tools() {
        let tool = function_tool(
            "custom",
            json!({
                "max_num_results": { "type": "number", "required": true },
                "vector_store_ids": { "type": "array" },
                "topic": { "required": true }
            }),
        );
        let schema = &build_declarations(&[tool])[0].function.parameters;
        let props = schema["properties"].as_object().unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props["topic"]["type"], "string");
        assert_eq!(schema["required"], json!(["topic"]));
    }

    #[test]
    fn test_malformed_descriptors_are_defaulted() {
        let mut tool = function_tool("odd", json!({ "x": 42, "y": null }));
        tool.description = None;
        let decl = &build_declarations(&[tool])[0];
        assert_eq!(decl.function.description, "");
        let props = &decl.function.parameters["properties"];
        assert_eq!(props["x"]["type"], "string");
        assert_eq!(props["y"]["type"], "string");
        assert!(decl.function.parameters.get("required").is_none());
    }

    #[test]
    fn test_tool_without_parameters() {
        let tool = function_tool("noop", json!({}));
        let schema = &build_declarations(&[tool])[0].function.parameters;
        assert_eq!(schema, &json!({ "type": "object", "properties": {} }));
    }
}
