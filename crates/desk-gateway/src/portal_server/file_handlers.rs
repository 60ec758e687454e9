//! Upload storage and the in-memory file directory.
use super::*;
use desk_core::{current_unix_timestamp, write_bytes_atomic};

const UPLOAD_FIELD_NAME: &str = "file";

#[derive(Debug, Clone, Serialize)]
pub(super) struct FileRecord {
    pub(super) id: u64,
    pub(super) name: String,
    pub(super) size: u64,
    pub(super) path: String,
    pub(super) owner_id: u64,
    pub(super) uploaded_at: DateTime<Utc>,
}

#[derive(Debug)]
struct FileDirectoryInner {
    files: Vec<FileRecord>,
    next_id: u64,
}

impl Default for FileDirectoryInner {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            next_id: 1,
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct FileDirectory {
    inner: RwLock<FileDirectoryInner>,
}

impl FileDirectory {
    async fn record(&self, name: String, size: u64, path: &Path, owner_id: u64) -> FileRecord {
        let mut inner = self.inner.write().await;
        let record = FileRecord {
            id: inner.next_id,
            name,
            size,
            path: path.display().to_string(),
            owner_id,
            uploaded_at: Utc::now(),
        };
        inner.next_id = inner.next_id.saturating_add(1);
        inner.files.push(record.clone());
        record
    }

    /// Own files, or every file for admins.
    pub(super) async fn visible_to(&self, user: &PortalUser) -> Vec<FileRecord> {
        self.inner
            .read()
            .await
            .files
            .iter()
            .filter(|file| user.is_admin() || file.owner_id == user.id)
            .cloned()
            .collect()
    }

    pub(super) async fn count(&self) -> usize {
        self.inner.read().await.files.len()
    }

    pub(super) async fn count_owned_by(&self, owner_id: u64) -> usize {
        self.inner
            .read()
            .await
            .files
            .iter()
            .filter(|file| file.owner_id == owner_id)
            .count()
    }
}

/// Strips client-supplied directories from an upload name.
pub(super) fn sanitize_upload_name(raw: &str) -> Option<String> {
    let normalized = raw.replace('\\', "/");
    let name = Path::new(&normalized).file_name()?.to_str()?.trim();
    if name.is_empty() || name == ".." || name == "." {
        return None;
    }
    Some(name.to_string())
}

pub(super) async fn handle_files_list(
    State(state): State<Arc<PortalServerState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, PortalApiError> {
    let user = authenticate_portal_request(&state, &headers).await?;
    let files = state.files.visible_to(&user).await;
    Ok(Json(json!({
        "title": "File Manager",
        "user": user,
        "files": files,
    })))
}

pub(super) async fn handle_file_upload(
    State(state): State<Arc<PortalServerState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, PortalApiError> {
    let user = authenticate_portal_request(&state, &headers).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| PortalApiError::bad_request("invalid_multipart", error.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }
        let original_name = field
            .file_name()
            .and_then(sanitize_upload_name)
            .ok_or_else(|| {
                PortalApiError::bad_request("invalid_file_name", "upload has no usable file name")
            })?;
        let bytes = field
            .bytes()
            .await
            .map_err(|error| PortalApiError::bad_request("upload_failed", error.to_string()))?;
        if bytes.len() > state.config.max_upload_bytes {
            return Err(PortalApiError::payload_too_large(format!(
                "upload exceeds {} bytes",
                state.config.max_upload_bytes
            )));
        }

        let stored_name = format!("{}_{original_name}", current_unix_timestamp());
        let path = state.config.upload_dir.join(stored_name);
        write_bytes_atomic(&path, &bytes)
            .map_err(|error| PortalApiError::internal(format!("failed to store upload: {error:#}")))?;

        let record = state
            .files
            .record(original_name, bytes.len() as u64, &path, user.id)
            .await;
        tracing::info!(file_id = record.id, owner_id = user.id, size = record.size, "file uploaded");
        return Ok(Json(json!({
            "message": "file uploaded",
            "file": record,
        })));
    }

    Err(PortalApiError::bad_request(
        "missing_file",
        format!("multipart field '{UPLOAD_FIELD_NAME}' is required"),
    ))
}
