// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage tools offered to the model.
//!
//! Tool failures are returned to the model as text, never raised, so the
//! model can explain them to the sender.

use std::fmt::Write as _;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::drive::{DriveClient, DriveFile, MIME_DOC, MIME_FOLDER, MIME_PDF, MIME_SHEET, MIME_SLIDES};

/// A set of callable tools described in the chat-completions format.
#[async_trait]
pub trait Toolset: Send + Sync {
    /// `tools` array entries for the chat-completions request.
    fn definitions(&self) -> Vec<Value>;

    /// Run one tool call. Unknown tools and failures come back as text.
    async fn call(&self, name: &str, arguments: &str) -> String;
}

/// Toolset with no tools.
pub struct NoTools;

#[async_trait]
impl Toolset for NoTools {
    fn definitions(&self) -> Vec<Value> {
        Vec::new()
    }

    async fn call(&self, name: &str, _arguments: &str) -> String {
        format!("Unknown tool: {name}")
    }
}

pub const SEARCH_QUERY_REQUIRED: &str = "A search query is required.";

const DEFAULT_PAGE_SIZE: u32 = 10;
/// Longest file content handed back to the model.
const MAX_CONTENT_CHARS: usize = 20_000;

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Deserialize)]
struct PageArgs {
    #[serde(default = "default_page_size")]
    page_size: u32,
}

#[derive(Deserialize)]
struct FolderArgs {
    folder_id: String,
    #[serde(default = "default_page_size")]
    page_size: u32,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_page_size")]
    page_size: u32,
}

#[derive(Deserialize)]
struct FileArgs {
    file_id: String,
}

pub struct DriveTools {
    drive: DriveClient,
}

impl DriveTools {
    pub fn new(drive: DriveClient) -> Self {
        Self { drive }
    }

    async fn list_all_files(&self, args: PageArgs) -> anyhow::Result<String> {
        let files = self.drive.list_files(None, args.page_size).await?;
        if files.is_empty() {
            return Ok("No files found in Google Drive.".to_owned());
        }
        Ok(format_listing("Files in Google Drive:", &files))
    }

    async fn list_folder_files(&self, args: FolderArgs) -> anyhow::Result<String> {
        let query = format!("'{}' in parents", escape_query(&args.folder_id));
        let files = self.drive.list_files(Some(&query), args.page_size).await?;
        let folder_name = match self.drive.get_file(&args.folder_id).await {
            Ok(folder) => folder.name,
            Err(_) if files.is_empty() => {
                return Ok(format!(
                    "Folder with ID '{}' not found or inaccessible.",
                    args.folder_id
                ));
            }
            Err(_) => "Folder".to_owned(),
        };
        if files.is_empty() {
            return Ok(format!("No files found in folder '{folder_name}'."));
        }
        let header = format!("Files in '{folder_name}' (ID: {}):", args.folder_id);
        Ok(format_listing(&header, &files))
    }

    async fn search_files(&self, args: SearchArgs) -> anyhow::Result<String> {
        if args.query.trim().is_empty() {
            return Ok(SEARCH_QUERY_REQUIRED.to_owned());
        }
        let files = self.drive.list_files(Some(&search_query(&args.query)), args.page_size).await?;
        if files.is_empty() {
            return Ok(format!("No files found matching '{}'.", args.query));
        }
        Ok(format_listing(&format!("Search results for '{}':", args.query), &files))
    }

    async fn get_file_metadata(&self, args: FileArgs) -> anyhow::Result<String> {
        let file = self.drive.get_file(&args.file_id).await?;
        let mut out = format!("File: {}\n", file.name);
        let _ = writeln!(out, "ID: {}", file.id);
        let _ = writeln!(out, "Type: {} ({})", readable_type(&file.mime_type), file.mime_type);
        if let Some(ref d) = file.description {
            let _ = writeln!(out, "Description: {d}");
        }
        let _ = writeln!(out, "Created: {}", readable_time(file.created_time.as_deref()));
        let _ = writeln!(out, "Modified: {}", readable_time(file.modified_time.as_deref()));
        let _ = writeln!(out, "Size: {}", readable_size(&file));
        let _ = writeln!(out, "Owner: {}", owner_name(&file));
        if let Some(ref link) = file.web_view_link {
            let _ = writeln!(out, "Link: {link}");
        }
        for (label, flag) in [("Shared", file.shared), ("Starred", file.starred), ("Trashed", file.trashed)] {
            if let Some(v) = flag {
                let _ = writeln!(out, "{label}: {}", if v { "yes" } else { "no" });
            }
        }
        Ok(out)
    }

    async fn read_file(&self, args: FileArgs) -> anyhow::Result<String> {
        let text = self.drive.read_text(&args.file_id).await?;
        let mut content = text.content;
        if let Some((cut, _)) = content.char_indices().nth(MAX_CONTENT_CHARS) {
            content.truncate(cut);
            content.push_str("\n[truncated]");
        }
        Ok(format!("Content of '{}' ({}):\n\n{content}", text.file.name, text.file.mime_type))
    }
}

#[async_trait]
impl Toolset for DriveTools {
    fn definitions(&self) -> Vec<Value> {
        let page_size = json!({
            "type": "integer",
            "description": "Maximum number of files to return",
            "default": DEFAULT_PAGE_SIZE,
        });
        vec![
            function(
                "list_all_files",
                "Lists all files in Google Drive. Use when you need an overview of all files.",
                json!({ "page_size": page_size }),
                &[],
            ),
            function(
                "list_folder_files",
                "Lists files in a specific Google Drive folder.",
                json!({
                    "folder_id": { "type": "string", "description": "ID of the folder" },
                    "page_size": page_size,
                }),
                &["folder_id"],
            ),
            function(
                "search_files",
                "Searches Google Drive by file name, file type (document, sheet, slides, pdf, \
                 folder), or content keywords.",
                json!({
                    "query": { "type": "string", "description": "Name, type, or keywords" },
                    "page_size": page_size,
                }),
                &["query"],
            ),
            function(
                "get_file_metadata",
                "Gets detailed metadata for one Google Drive file.",
                json!({ "file_id": { "type": "string", "description": "ID of the file" } }),
                &["file_id"],
            ),
            function(
                "read_file",
                "Reads the text content of a Google Drive file (Docs, Sheets, Slides, text).",
                json!({ "file_id": { "type": "string", "description": "ID of the file" } }),
                &["file_id"],
            ),
        ]
    }

    async fn call(&self, name: &str, arguments: &str) -> String {
        let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };
        match self.dispatch(name, arguments).await {
            Ok(Some(output)) => output,
            Ok(None) => format!("Unknown tool: {name}"),
            Err(e) => {
                tracing::warn!(tool = name, err = %e, "tool call failed");
                format!("Error running {name}: {e}")
            }
        }
    }
}

impl DriveTools {
    async fn dispatch(&self, name: &str, arguments: &str) -> anyhow::Result<Option<String>> {
        let output = match name {
            "list_all_files" => self.list_all_files(parse(arguments)?).await?,
            "list_folder_files" => self.list_folder_files(parse(arguments)?).await?,
            "search_files" => self.search_files(parse(arguments)?).await?,
            "get_file_metadata" => self.get_file_metadata(parse(arguments)?).await?,
            "read_file" => self.read_file(parse(arguments)?).await?,
            _ => return Ok(None),
        };
        Ok(Some(output))
    }
}

fn parse<T: for<'de> Deserialize<'de>>(arguments: &str) -> anyhow::Result<T> {
    serde_json::from_str(arguments).map_err(|e| anyhow::anyhow!("invalid arguments: {e}"))
}

fn function(name: &str, description: &str, properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            },
        },
    })
}

/// Translate a free-form search into a Drive query.
///
/// Bare type words select by MIME type; anything else must match every
/// word's name or full text.
pub fn search_query(query: &str) -> String {
    let lowered = query.trim().to_lowercase();
    let kind = lowered.strip_prefix("type:").unwrap_or(&lowered);
    let mime = match kind {
        "document" | "doc" | "docs" => Some(MIME_DOC),
        "spreadsheet" | "sheet" | "sheets" => Some(MIME_SHEET),
        "presentation" | "slides" => Some(MIME_SLIDES),
        "pdf" => Some(MIME_PDF),
        "folder" | "directory" => Some(MIME_FOLDER),
        _ => None,
    };
    if let Some(mime) = mime {
        return format!("mimeType = '{mime}'");
    }

    let words: Vec<String> = query.split_whitespace().map(escape_query).collect();
    let names: Vec<String> = words.iter().map(|w| format!("name contains '{w}'")).collect();
    let texts: Vec<String> = words.iter().map(|w| format!("fullText contains '{w}'")).collect();
    format!("({}) and ({})", names.join(" or "), texts.join(" or "))
}

/// Escape a value for use inside a single-quoted Drive query string.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn readable_type(mime: &str) -> &str {
    match mime {
        MIME_DOC => "Google Doc",
        MIME_SHEET => "Google Sheet",
        MIME_SLIDES => "Google Slides",
        MIME_FOLDER => "Folder",
        MIME_PDF => "PDF",
        m if m.starts_with("image/") => "Image",
        m if m.starts_with("video/") => "Video",
        m if m.starts_with("audio/") => "Audio",
        m if m.starts_with("text/") => "Text",
        m => m,
    }
}

fn readable_time(rfc3339: Option<&str>) -> String {
    rfc3339
        .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
        .map_or_else(|| "Unknown".to_owned(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn readable_size(file: &DriveFile) -> String {
    match file.size.as_deref().and_then(|s| s.parse::<u64>().ok()) {
        Some(bytes) if bytes < 1024 * 1024 => format!("{:.2} KB", bytes as f64 / 1024.0),
        Some(bytes) => format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0)),
        None if file.mime_type == MIME_FOLDER => "N/A".to_owned(),
        None => "Unknown".to_owned(),
    }
}

fn owner_name(file: &DriveFile) -> &str {
    file.owners.first().and_then(|o| o.display_name.as_deref()).unwrap_or("Unknown")
}

fn format_listing(header: &str, files: &[DriveFile]) -> String {
    let mut out = format!("{header}\n\n");
    for (idx, file) in files.iter().enumerate() {
        let _ = writeln!(out, "{}. {} ({})", idx + 1, file.name, readable_type(&file.mime_type));
        let _ = writeln!(out, "   ID: {}", file.id);
        let _ = writeln!(out, "   Modified: {}", readable_time(file.modified_time.as_deref()));
        let _ = writeln!(out, "   Owner: {}", owner_name(file));
        let _ = writeln!(out, "   Size: {}\n", readable_size(file));
    }
    out
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
