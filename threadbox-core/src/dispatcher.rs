//! Tool dispatcher: maps named JSON-in/JSON-out tool calls onto storage
//! operations (spec §4.F).

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde_json::{json, Value};
use thiserror::Error;

use crate::engine::{normalize_session, Engine};
use crate::error::StorageError;

/// Result of one tool invocation: a single text payload plus an error flag,
/// matching the `{is_error, payload}` shape the transport wraps (spec §6).
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub is_error: bool,
    pub payload: String,
}

impl ToolResult {
    fn ok(payload: Value) -> Self {
        Self { is_error: false, payload: payload.to_string() }
    }

    fn err(message: impl Into<String>) -> Self {
        Self { is_error: true, payload: message.into() }
    }
}

#[derive(Debug, Error)]
enum DispatchError {
    #[error("missing required argument: {0}")]
    MissingField(String),
    #[error("argument {0} must be a {1}")]
    WrongType(String, &'static str),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// One entry in the fixed tool registry, including its argument schema.
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
}

pub struct Dispatcher {
    engine: Engine,
}

impl Dispatcher {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn into_engine(self) -> Engine {
        self.engine
    }

    /// The fixed set of tool names this dispatcher recognises.
    pub fn tool_names() -> &'static [&'static str] {
        &[
            "write_file",
            "read_file",
            "list_directory",
            "rename_node",
            "move_node",
            "export_session_zip",
        ]
    }

    /// Argument schemas for every registered tool, for introspection by a
    /// transport's `list_tools`-style handshake.
    pub fn tool_definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "write_file",
                description: "Write (or overwrite) a file in the session sandbox.",
                schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "content": {"type": "string"},
                        "base64": {"type": "boolean", "default": false},
                        "sessionId": {"type": "string"},
                    },
                    "required": ["path", "content"],
                }),
            },
            ToolDefinition {
                name: "read_file",
                description: "Read the latest version of a file in the session sandbox.",
                schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "sessionId": {"type": "string"},
                    },
                    "required": ["path"],
                }),
            },
            ToolDefinition {
                name: "list_directory",
                description: "List the immediate children of a directory.",
                schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "sessionId": {"type": "string"},
                    },
                    "required": ["path"],
                }),
            },
            ToolDefinition {
                name: "rename_node",
                description: "Rename a file in place, keeping its parent directory.",
                schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "newName": {"type": "string"},
                        "sessionId": {"type": "string"},
                    },
                    "required": ["path", "newName"],
                }),
            },
            ToolDefinition {
                name: "move_node",
                description: "Move a file into a different directory.",
                schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "newDirectory": {"type": "string"},
                        "sessionId": {"type": "string"},
                    },
                    "required": ["path", "newDirectory"],
                }),
            },
            ToolDefinition {
                name: "export_session_zip",
                description: "Export every file in a session to a ZIP archive on disk.",
                schema: json!({
                    "type": "object",
                    "properties": {
                        "sessionId": {"type": "string"},
                        "destination": {"type": "string"},
                    },
                    "required": [],
                }),
            },
        ]
    }

    /// Dispatch one `{name, arguments}` tool call. Never panics: any
    /// `StorageError` or argument problem is projected into an error result.
    pub fn dispatch(&mut self, name: &str, arguments: &Value) -> ToolResult {
        let result = match name {
            "write_file" => self.tool_write_file(arguments),
            "read_file" => self.tool_read_file(arguments),
            "list_directory" => self.tool_list_directory(arguments),
            "rename_node" => self.tool_rename_node(arguments),
            "move_node" => self.tool_move_node(arguments),
            "export_session_zip" => self.tool_export_session_zip(arguments),
            other => Err(DispatchError::UnknownTool(other.to_string())),
        };
        match result {
            Ok(tool_result) => tool_result,
            Err(e) => ToolResult::err(e.to_string()),
        }
    }

    fn tool_write_file(&mut self, args: &Value) -> DispatchResult<ToolResult> {
        let path = get_str(args, "path")?;
        let content = get_str(args, "content")?;
        let use_base64 = get_bool(args, "base64", false)?;
        let session_id = get_optional_str(args, "sessionId")?;

        let bytes = if use_base64 {
            B64.decode(content)
                .map_err(|e| DispatchError::Storage(StorageError::DecodeError(e.to_string())))?
        } else {
            content.as_bytes().to_vec()
        };

        let entry = self.engine.write_file(path, &bytes, session_id)?;
        Ok(ToolResult::ok(json!({
            "inodeId": entry.id,
            "path": entry.path,
            "version": entry.version,
            "sessionId": entry.session,
        })))
    }

    fn tool_read_file(&mut self, args: &Value) -> DispatchResult<ToolResult> {
        let path = get_str(args, "path")?;
        let session_id = get_optional_str(args, "sessionId")?;

        match self.engine.read_file(path, session_id)? {
            None => Ok(ToolResult::err(format!("File not found: {path}"))),
            Some(entry) => {
                let bytes = entry.content.unwrap_or_default();
                let (content, is_base64) = match String::from_utf8(bytes.clone()) {
                    Ok(text) => (text, false),
                    Err(_) => (B64.encode(&bytes), true),
                };
                Ok(ToolResult::ok(json!({
                    "inodeId": entry.id,
                    "path": entry.path,
                    "version": entry.version,
                    "content": content,
                    "base64": is_base64,
                    "sessionId": entry.session,
                })))
            }
        }
    }

    fn tool_list_directory(&mut self, args: &Value) -> DispatchResult<ToolResult> {
        let path = get_str(args, "path")?;
        let session_id = get_optional_str(args, "sessionId")?;

        let listing = self.engine.list_directory(path, session_id)?;
        let session = normalize_session(session_id);
        let directories: Vec<Value> = listing
            .directories
            .iter()
            .map(|e| {
                json!({
                    "name": e.name,
                    "path": e.path,
                    "inodeId": e.id,
                    "updatedAt": e.updated_at.to_rfc3339(),
                })
            })
            .collect();
        let files: Vec<Value> = listing
            .files
            .iter()
            .map(|e| {
                json!({
                    "name": e.name,
                    "path": e.path,
                    "inodeId": e.id,
                    "version": e.version,
                    "updatedAt": e.updated_at.to_rfc3339(),
                })
            })
            .collect();

        Ok(ToolResult::ok(json!({
            "path": listing.path,
            "sessionId": session,
            "directories": directories,
            "files": files,
        })))
    }

    fn tool_rename_node(&mut self, args: &Value) -> DispatchResult<ToolResult> {
        let path = get_str(args, "path")?;
        let new_name = get_str(args, "newName")?;
        let session_id = get_optional_str(args, "sessionId")?;

        let entry = self.engine.rename_node(path, new_name, session_id)?;
        Ok(ToolResult::ok(json!({
            "inodeId": entry.id,
            "path": entry.path,
            "version": entry.version,
            "sessionId": entry.session,
        })))
    }

    fn tool_move_node(&mut self, args: &Value) -> DispatchResult<ToolResult> {
        let path = get_str(args, "path")?;
        let new_directory = get_str(args, "newDirectory")?;
        let session_id = get_optional_str(args, "sessionId")?;

        let entry = self.engine.move_node(path, new_directory, session_id)?;
        Ok(ToolResult::ok(json!({
            "inodeId": entry.id,
            "path": entry.path,
            "version": entry.version,
            "sessionId": entry.session,
        })))
    }

    fn tool_export_session_zip(&mut self, args: &Value) -> DispatchResult<ToolResult> {
        let session_id = get_optional_str(args, "sessionId")?;
        let destination = get_optional_str(args, "destination")?.map(PathBuf::from);

        let zip_path = self
            .engine
            .export_session_zip(session_id, destination.as_deref())?;
        Ok(ToolResult::ok(json!({
            "sessionId": normalize_session(session_id),
            "downloadPath": zip_path.display().to_string(),
        })))
    }
}

fn get_str<'a>(args: &'a Value, field: &str) -> DispatchResult<&'a str> {
    args.get(field)
        .ok_or_else(|| DispatchError::MissingField(field.to_string()))?
        .as_str()
        .ok_or_else(|| DispatchError::WrongType(field.to_string(), "string"))
}

fn get_optional_str<'a>(args: &'a Value, field: &str) -> DispatchResult<Option<&'a str>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or_else(|| DispatchError::WrongType(field.to_string(), "string")),
    }
}

fn get_bool(args: &Value, field: &str, default: bool) -> DispatchResult<bool> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(DispatchError::WrongType(field.to_string(), "bool")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Engine::open_in_memory().expect("open engine"))
    }

    #[test]
    fn write_then_read_round_trips_text_content() {
        let mut d = dispatcher();
        let write = d.dispatch("write_file", &json!({"path": "/notes.txt", "content": "hello"}));
        assert!(!write.is_error);
        let v: Value = serde_json::from_str(&write.payload).unwrap();
        assert_eq!(v["version"], 1);

        let read = d.dispatch("read_file", &json!({"path": "/notes.txt"}));
        assert!(!read.is_error);
        let v: Value = serde_json::from_str(&read.payload).unwrap();
        assert_eq!(v["content"], "hello");
        assert_eq!(v["base64"], false);
    }

    #[test]
    fn read_missing_file_is_an_error_result_not_a_crash() {
        let mut d = dispatcher();
        let read = d.dispatch("read_file", &json!({"path": "/nope.txt"}));
        assert!(read.is_error);
        assert_eq!(read.payload, "File not found: /nope.txt");
    }

    #[test]
    fn write_file_with_base64_content() {
        let mut d = dispatcher();
        let encoded = B64.encode(b"binary\x00data");
        let write = d.dispatch(
            "write_file",
            &json!({"path": "/blob.bin", "content": encoded, "base64": true}),
        );
        assert!(!write.is_error);

        let read = d.dispatch("read_file", &json!({"path": "/blob.bin"}));
        let v: Value = serde_json::from_str(&read.payload).unwrap();
        assert_eq!(v["base64"], true);
    }

    #[test]
    fn bad_base64_surfaces_as_error_result() {
        let mut d = dispatcher();
        let write = d.dispatch(
            "write_file",
            &json!({"path": "/blob.bin", "content": "not-base64!!", "base64": true}),
        );
        assert!(write.is_error);
    }

    #[test]
    fn missing_argument_identifies_the_field() {
        let mut d = dispatcher();
        let result = d.dispatch("write_file", &json!({"path": "/a.txt"}));
        assert!(result.is_error);
        assert!(result.payload.contains("content"));
    }

    #[test]
    fn unknown_tool_is_an_error_result() {
        let mut d = dispatcher();
        let result = d.dispatch("delete_everything", &json!({}));
        assert!(result.is_error);
        assert!(result.payload.contains("delete_everything"));
    }

    #[test]
    fn storage_error_is_projected_without_crashing() {
        let mut d = dispatcher();
        d.dispatch("write_file", &json!({"path": "/a.txt", "content": "A"}));
        d.dispatch("write_file", &json!({"path": "/b.txt", "content": "B"}));
        let rename = d.dispatch("rename_node", &json!({"path": "/a.txt", "newName": "b.txt"}));
        assert!(rename.is_error);
        assert!(rename.payload.contains("/b.txt"));
    }
}
