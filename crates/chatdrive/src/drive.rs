// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal Google Drive v3 REST client used by the agent tools.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::credential::source::CredentialChain;

pub const MIME_DOC: &str = "application/vnd.google-apps.document";
pub const MIME_SHEET: &str = "application/vnd.google-apps.spreadsheet";
pub const MIME_SLIDES: &str = "application/vnd.google-apps.presentation";
pub const MIME_FOLDER: &str = "application/vnd.google-apps.folder";
pub const MIME_PDF: &str = "application/pdf";

const LIST_FIELDS: &str =
    "nextPageToken, files(id, name, mimeType, createdTime, modifiedTime, size, owners, parents)";
const METADATA_FIELDS: &str = "id, name, mimeType, description, createdTime, modifiedTime, \
     size, webViewLink, owners, shared, starred, trashed, parents";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
    /// Bytes, as a decimal string. Absent for Google-native files.
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub owners: Vec<DriveUser>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub shared: Option<bool>,
    #[serde(default)]
    pub starred: Option<bool>,
    #[serde(default)]
    pub trashed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveUser {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Text content of a file, with the metadata used to obtain it.
#[derive(Debug, Clone)]
pub struct FileText {
    pub file: DriveFile,
    pub content: String,
}

pub struct DriveClient {
    base: String,
    http: reqwest::Client,
    creds: Arc<CredentialChain>,
}

impl DriveClient {
    pub fn new(base: impl Into<String>, creds: Arc<CredentialChain>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self { base: base.into().trim_end_matches('/').to_owned(), http, creds })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<reqwest::Response> {
        let cred = self.creds.resolve().await?;
        let resp = self
            .http
            .get(format!("{}{path}", self.base))
            .bearer_auth(&cred.token)
            .query(query)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("drive API error {status}: {text}");
        }
        Ok(resp)
    }

    /// List files, optionally filtered by a Drive query expression.
    pub async fn list_files(
        &self,
        query: Option<&str>,
        page_size: u32,
    ) -> anyhow::Result<Vec<DriveFile>> {
        let mut params = vec![("pageSize", page_size.to_string()), ("fields", LIST_FIELDS.to_owned())];
        if let Some(q) = query {
            params.push(("q", q.to_owned()));
        }
        let list: FileList = self.get("/files", &params).await?.json().await?;
        Ok(list.files)
    }

    pub async fn get_file(&self, file_id: &str) -> anyhow::Result<DriveFile> {
        let path = format!("/files/{}", urlencoding::encode(file_id));
        Ok(self.get(&path, &[("fields", METADATA_FIELDS.to_owned())]).await?.json().await?)
    }

    async fn export(&self, file_id: &str, mime: &str) -> anyhow::Result<String> {
        let path = format!("/files/{}/export", urlencoding::encode(file_id));
        Ok(self.get(&path, &[("mimeType", mime.to_owned())]).await?.text().await?)
    }

    async fn download(&self, file_id: &str) -> anyhow::Result<String> {
        let path = format!("/files/{}", urlencoding::encode(file_id));
        Ok(self.get(&path, &[("alt", "media".to_owned())]).await?.text().await?)
    }

    /// Read a file as text. Google-native files are exported (documents
    /// and slides as plain text, spreadsheets as CSV); text-like files are
    /// downloaded as-is. Other formats are rejected.
    pub async fn read_text(&self, file_id: &str) -> anyhow::Result<FileText> {
        let file = self.get_file(file_id).await?;
        let content = match file.mime_type.as_str() {
            MIME_DOC | MIME_SLIDES => self.export(file_id, "text/plain").await?,
            MIME_SHEET => self.export(file_id, "text/csv").await?,
            m if is_text_like(m) => self.download(file_id).await?,
            other => anyhow::bail!("unsupported file type: {other}"),
        };
        Ok(FileText { file, content })
    }
}

fn is_text_like(mime: &str) -> bool {
    mime.starts_with("text/")
        || matches!(mime, "application/json" | "application/xml" | "application/javascript")
}
