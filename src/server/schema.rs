use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    CheckDirectory,
    CheckFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Array,
    Boolean,
    Object,
}

/// JSON-schema fragment advertised in `tools/list`. Only presence and basic
/// shape are checked at call time; the rest is informational.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaNode {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<&'static str, SchemaNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<&'static str>,
}

impl SchemaNode {
    fn leaf(kind: SchemaType, description: &'static str) -> Self {
        Self {
            kind,
            description: Some(description),
            default: None,
            items: None,
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    fn string(description: &'static str) -> Self {
        Self::leaf(SchemaType::String, description)
    }

    fn boolean(description: &'static str, default: bool) -> Self {
        Self {
            default: Some(serde_json::Value::Bool(default)),
            ..Self::leaf(SchemaType::Boolean, description)
        }
    }

    fn string_array(description: &'static str) -> Self {
        Self {
            items: Some(Box::new(Self {
                description: None,
                ..Self::leaf(SchemaType::String, "")
            })),
            ..Self::leaf(SchemaType::Array, description)
        }
    }

    fn object(fields: Vec<(&'static str, SchemaNode, bool)>) -> Self {
        let required = fields
            .iter()
            .filter(|(_, _, req)| *req)
            .map(|(name, _, _)| *name)
            .collect();
        Self {
            kind: SchemaType::Object,
            description: None,
            default: None,
            items: None,
            properties: fields.into_iter().map(|(n, s, _)| (n, s)).collect(),
            required,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: SchemaNode,
    #[serde(skip)]
    pub kind: ToolKind,
}

/// The advertised tools. Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

const CSS_PATH_DESCRIPTION: &str = "Path to CSS file containing Tailwind imports";

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: vec![check_directory(), check_file()],
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn check_directory() -> ToolDescriptor {
    ToolDescriptor {
        name: "check_directory",
        description: "Scan files for invalid TailwindCSS classes. \
                      Supports glob patterns and returns detailed results per file.",
        input_schema: SchemaNode::object(vec![
            ("css_path", SchemaNode::string(CSS_PATH_DESCRIPTION), true),
            (
                "files",
                SchemaNode::string_array(
                    "Files or glob patterns to scan (e.g., 'src/**/*.tsx')",
                ),
                true,
            ),
            (
                "no_filter",
                SchemaNode::boolean("Disable context-aware filtering", false),
                false,
            ),
        ]),
        kind: ToolKind::CheckDirectory,
    }
}

fn check_file() -> ToolDescriptor {
    ToolDescriptor {
        name: "check_file",
        description: "Quick check of a single file for invalid Tailwind classes",
        input_schema: SchemaNode::object(vec![
            ("css_path", SchemaNode::string(CSS_PATH_DESCRIPTION), true),
            ("file", SchemaNode::string("Single file to scan"), true),
        ]),
        kind: ToolKind::CheckFile,
    }
}

pub(super) fn on_tools_list(msg: &serde_json::Value, registry: &ToolRegistry) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": msg["id"],
        "result": { "tools": registry.tools() },
    })
}
