use std::fs;

use super::paths::resolve_within;
use super::registry::LocalSettings;
use crate::registry::ToolArgs;

pub const TRUNCATION_MARKER: &str = "\n... (truncated)";

// Tool handlers. Every failure is rendered as text for the model to read.

pub fn handle_list_files(args: &ToolArgs, settings: &LocalSettings) -> String {
    let path_str = args.get_str("path").unwrap_or(".");
    let dir = super::paths::absolutize(path_str, &settings.base_dir);

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => return format!("error: {}", e),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => return format!("error: {}", e),
        };
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            name.push('/');
        }
        names.push(name);
    }

    names.sort();
    names.join("\n")
}

pub fn handle_read_file(args: &ToolArgs, settings: &LocalSettings) -> String {
    let Some(path_str) = args.get_str("path") else {
        return "error: missing required argument: path".to_string();
    };

    let resolved_path = match resolve_within(path_str, &settings.base_dir) {
        Ok(path) => path,
        Err(e) => return format!("error: {}", e),
    };

    let data = match fs::read(&resolved_path) {
        Ok(data) => data,
        Err(e) => return format!("error: {}", e),
    };

    if data.len() > settings.read_limit_bytes {
        let end = char_boundary_at_or_below(&data, settings.read_limit_bytes);
        let mut content = String::from_utf8_lossy(&data[..end]).into_owned();
        content.push_str(TRUNCATION_MARKER);
        content
    } else {
        String::from_utf8_lossy(&data).into_owned()
    }
}

/// Largest cut at or below `limit` that does not split a UTF-8 sequence.
/// Requires `limit < data.len()`.
fn char_boundary_at_or_below(data: &[u8], limit: usize) -> usize {
    let is_continuation = |b: u8| b & 0xC0 == 0x80;
    // A UTF-8 sequence has at most three continuation bytes.
    let mut end = limit;
    while end > 0 && limit - end < 3 && is_continuation(data[end]) {
        end -= 1;
    }
    if is_continuation(data[end]) {
        // Not UTF-8 text; cut at the byte limit.
        limit
    } else {
        end
    }
}

pub fn handle_get_time(_args: &ToolArgs, _settings: &LocalSettings) -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S %Z").to_string()
}
