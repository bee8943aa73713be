use std::io;
use std::path::{Path, PathBuf};

use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Value};

use super::tools;
use crate::models::ToolDescriptor;
use crate::registry::ToolArgs;

pub const DEFAULT_READ_LIMIT_BYTES: usize = 4000;

#[derive(Debug, Clone)]
pub struct LocalSettings {
    /// Absolute sandbox root for `read_file`.
    pub base_dir: PathBuf,
    pub read_limit_bytes: usize,
}

impl LocalSettings {
    pub fn new(base_dir: impl AsRef<Path>) -> io::Result<Self> {
        let base_dir = base_dir.as_ref();
        let base_dir = if base_dir.is_absolute() {
            base_dir.to_path_buf()
        } else {
            std::env::current_dir()?.join(base_dir)
        };
        Ok(Self {
            base_dir: super::paths::absolutize(".", &base_dir),
            read_limit_bytes: DEFAULT_READ_LIMIT_BYTES,
        })
    }

    /// Sandbox rooted at the process working directory.
    pub fn from_current_dir() -> io::Result<Self> {
        Self::new(std::env::current_dir()?)
    }
}

/// The fixed set of in-process tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalTool {
    ListFiles,
    ReadFile,
    GetTime,
}

impl LocalTool {
    pub const ALL: [LocalTool; 3] = [LocalTool::ListFiles, LocalTool::ReadFile, LocalTool::GetTime];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            LocalTool::ListFiles => "list_files",
            LocalTool::ReadFile => "read_file",
            LocalTool::GetTime => "get_time",
        }
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        let (description, parameters) = match self {
            LocalTool::ListFiles => (
                "List files and directories at a given path",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Directory path to list (e.g. '.' for current directory)"
                        }
                    },
                    "required": ["path"]
                }),
            ),
            LocalTool::ReadFile => (
                "Read the contents of a file",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path to the file to read"
                        }
                    },
                    "required": ["path"]
                }),
            ),
            LocalTool::GetTime => (
                "Get the current date and time",
                json!({
                    "type": "object",
                    "properties": {}
                }),
            ),
        };

        ToolDescriptor {
            name: self.name().to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    pub fn execute(&self, args: &ToolArgs, settings: &LocalSettings) -> String {
        if let Err(e) = validate_arguments(&self.descriptor().parameters, &args.to_json()) {
            return format!("error: invalid arguments for {}: {}", self.name(), e);
        }

        match self {
            LocalTool::ListFiles => tools::handle_list_files(args, settings),
            LocalTool::ReadFile => tools::handle_read_file(args, settings),
            LocalTool::GetTime => tools::handle_get_time(args, settings),
        }
    }
}

fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), String> {
    let schema = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .map_err(|e| format!("Invalid tool schema: {}", e))?;

    if let Err(errors) = schema.validate(arguments) {
        let error_messages: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(error_messages.join("; "));
    }

    Ok(())
}
