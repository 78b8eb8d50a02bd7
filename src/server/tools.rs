//! Reflect tool catalog and argument parsing

use serde_json::{Value, json};
use url::Url;

use crate::error::rpc_codes::INVALID_PARAMS;
use crate::protocol::{Tool, ToolAnnotations};
use crate::reflect::{DailyNoteAppend, NewLink, NewNote};
use crate::{Error, Result};

const GRAPH_ID_DESCRIPTION: &str = "Reflect graph id (optional).";

/// Tools exposed over MCP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectTool {
    /// Current user
    GetMe,
    /// All graphs
    ListGraphs,
    /// Books in a graph
    ListBooks,
    /// Links in a graph
    ListLinks,
    /// Save a link
    CreateLink,
    /// Append to a daily note
    AppendDailyNote,
    /// Create a note
    CreateNote,
}

impl ReflectTool {
    /// Every tool, in `tools/list` order
    pub const ALL: [Self; 7] = [
        Self::GetMe,
        Self::ListGraphs,
        Self::ListBooks,
        Self::ListLinks,
        Self::CreateLink,
        Self::AppendDailyNote,
        Self::CreateNote,
    ];

    /// Wire name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::GetMe => "reflect_get_me",
            Self::ListGraphs => "reflect_list_graphs",
            Self::ListBooks => "reflect_list_books",
            Self::ListLinks => "reflect_list_links",
            Self::CreateLink => "reflect_create_link",
            Self::AppendDailyNote => "reflect_append_daily_note",
            Self::CreateNote => "reflect_create_note",
        }
    }

    /// Look a tool up by wire name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Whether the tool only reads
    #[must_use]
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::GetMe | Self::ListGraphs | Self::ListBooks | Self::ListLinks
        )
    }

    /// MCP tool definition
    #[must_use]
    pub fn definition(self) -> Tool {
        let (description, properties, required): (&str, Value, Vec<&str>) = match self {
            Self::GetMe => ("Get the current Reflect user.", json!({}), vec![]),
            Self::ListGraphs => ("List the user's Reflect graphs.", json!({}), vec![]),
            Self::ListBooks => (
                "List books and their highlights in a graph.",
                json!({ "graphId": graph_id_schema() }),
                vec![],
            ),
            Self::ListLinks => (
                "List saved links in a graph.",
                json!({ "graphId": graph_id_schema() }),
                vec![],
            ),
            Self::CreateLink => (
                "Save a link to Reflect.",
                json!({
                    "graphId": graph_id_schema(),
                    "url": {
                        "type": "string",
                        "format": "uri",
                        "description": "URL to save to Reflect."
                    },
                    "title": non_empty_string("Optional title override."),
                    "description": non_empty_string("Optional description."),
                    "highlights": {
                        "type": "array",
                        "items": { "type": "string", "minLength": 1 },
                        "description": "Optional list of highlights."
                    }
                }),
                vec!["url"],
            ),
            Self::AppendDailyNote => (
                "Append text to a daily note list.",
                json!({
                    "graphId": graph_id_schema(),
                    "text": non_empty_string("Text to append."),
                    "date": non_empty_string("ISO 8601 date (YYYY-MM-DD). Defaults to today."),
                    "listName": non_empty_string(
                        "List name. For backlinks use the format \"[[List Name]]\"."
                    )
                }),
                vec!["text"],
            ),
            Self::CreateNote => (
                "Create a new note.",
                json!({
                    "graphId": graph_id_schema(),
                    "subject": non_empty_string("Note subject/title."),
                    "contentMarkdown": non_empty_string("Note content in Markdown."),
                    "pinned": {
                        "type": "boolean",
                        "description": "Whether the note should be pinned."
                    }
                }),
                vec!["subject", "contentMarkdown"],
            ),
        };

        Tool {
            name: self.name().to_string(),
            title: None,
            description: Some(description.to_string()),
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required
            }),
            annotations: Some(ToolAnnotations {
                read_only_hint: Some(self.is_read_only()),
                destructive_hint: Some(false),
                open_world_hint: Some(true),
            }),
        }
    }
}

fn graph_id_schema() -> Value {
    non_empty_string(GRAPH_ID_DESCRIPTION)
}

fn non_empty_string(description: &str) -> Value {
    json!({ "type": "string", "minLength": 1, "description": description })
}

/// Definitions for every tool
#[must_use]
pub fn tool_definitions() -> Vec<Tool> {
    ReflectTool::ALL.into_iter().map(ReflectTool::definition).collect()
}

// ============================================================================
// Argument extraction
// ============================================================================

fn invalid(message: impl Into<String>) -> Error {
    Error::json_rpc(INVALID_PARAMS, message)
}

/// Normalize `tools/call` arguments: absent or `null` becomes `{}`.
pub(crate) fn arguments_object(arguments: Option<&Value>) -> Result<Value> {
    match arguments {
        None | Some(Value::Null) => Ok(json!({})),
        Some(value @ Value::Object(_)) => Ok(value.clone()),
        Some(_) => Err(invalid("Invalid 'arguments': expected object")),
    }
}

/// Optional non-empty string; `null` counts as absent.
pub(crate) fn optional_str<'a>(args: &'a Value, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => {
            Err(invalid(format!("'{key}' must not be empty")))
        }
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(invalid(format!("Invalid '{key}' parameter: expected string"))),
    }
}

/// Required non-empty string
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    optional_str(args, key)?.ok_or_else(|| invalid(format!("Missing '{key}' parameter")))
}

pub(crate) fn optional_bool(args: &Value, key: &str) -> Result<Option<bool>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(invalid(format!("Invalid '{key}' parameter: expected boolean"))),
    }
}

pub(crate) fn optional_str_list(args: &Value, key: &str) -> Result<Option<Vec<String>>> {
    let items = match args.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(invalid(format!(
                "Invalid '{key}' parameter: expected array of strings"
            )));
        }
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(s) if !s.is_empty() => Ok(s.clone()),
            _ => Err(invalid(format!(
                "Invalid '{key}' parameter: items must be non-empty strings"
            ))),
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Arguments for `reflect_create_link`
pub(crate) fn new_link(args: &Value) -> Result<NewLink> {
    let url = required_str(args, "url")?;
    Url::parse(url).map_err(|e| invalid(format!("Invalid 'url' parameter: {e}")))?;

    Ok(NewLink {
        url: url.to_string(),
        title: optional_str(args, "title")?.map(str::to_string),
        description: optional_str(args, "description")?.map(str::to_string),
        highlights: optional_str_list(args, "highlights")?,
    })
}

/// Arguments for `reflect_append_daily_note`
pub(crate) fn daily_note_append(args: &Value) -> Result<DailyNoteAppend> {
    Ok(DailyNoteAppend {
        text: required_str(args, "text")?.to_string(),
        date: optional_str(args, "date")?.map(str::to_string),
        list_name: optional_str(args, "listName")?.map(str::to_string),
    })
}

/// Arguments for `reflect_create_note`
pub(crate) fn new_note(args: &Value) -> Result<NewNote> {
    Ok(NewNote {
        subject: required_str(args, "subject")?.to_string(),
        content_markdown: required_str(args, "contentMarkdown")?.to_string(),
        pinned: optional_bool(args, "pinned")?,
    })
}
