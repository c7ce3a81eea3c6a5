//! Content image uploads.
//!
//! Images live flat in the upload directory as `<contentId><ext>` and are
//! served back under [`UPLOAD_URL_PREFIX`].

use std::path::{Path, PathBuf};

use axum::body::Bytes;
use axum::extract::Multipart;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// URL prefix the upload directory is served under.
pub const UPLOAD_URL_PREFIX: &str = "/shared/upload";

/// Extension used when the uploaded file name has none.
const DEFAULT_EXTENSION: &str = ".jpg";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Only image uploads are allowed, got '{0}'")]
    NotAnImage(String),

    #[error("Invalid multipart body: {0}")]
    Multipart(String),

    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An uploaded file as received.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Text fields and optional image of a content form.
#[derive(Debug, Clone, Default)]
pub struct ContentForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<ImageUpload>,
}

impl ContentForm {
    pub fn require_name(&self) -> Result<&str, UploadError> {
        self.name.as_deref().ok_or(UploadError::MissingField("name"))
    }

    pub fn require_description(&self) -> Result<&str, UploadError> {
        self.description
            .as_deref()
            .ok_or(UploadError::MissingField("description"))
    }
}

/// Read `name`, `description` and `image` parts. Unknown parts are skipped.
pub async fn read_content_form(mut multipart: Multipart) -> Result<ContentForm, UploadError> {
    let mut form = ContentForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "name" | "description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| UploadError::Multipart(e.to_string()))?;
                if name == "name" {
                    form.name = Some(text);
                } else {
                    form.description = Some(text);
                }
            }
            "image" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| UploadError::Multipart(e.to_string()))?;
                // Browsers send an empty part when no file was picked.
                if !bytes.is_empty() {
                    form.image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            other => debug!(field = other, "ignoring multipart field"),
        }
    }
    Ok(form)
}

/// Extension (with dot) taken from the original file name.
fn extension_for(file_name: Option<&str>) -> String {
    file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// An uploaded image written to a temporary file, not yet visible under its
/// public URL.
#[derive(Debug)]
pub struct StagedImage {
    content_id: Uuid,
    file_name: String,
    temp: PathBuf,
    url: String,
}

impl StagedImage {
    /// URL the image will have once committed.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Writes and removes content images in the upload directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store the image for `content_id`, replacing any earlier one, and
    /// return its public URL.
    pub async fn save(&self, content_id: Uuid, upload: &ImageUpload) -> Result<String, UploadError> {
        let staged = self.stage(content_id, upload).await?;
        self.commit(staged).await
    }

    /// Write the upload next to its final name without touching the current
    /// image. Follow with [`ImageStore::commit`] or [`ImageStore::discard`].
    pub async fn stage(&self, content_id: Uuid, upload: &ImageUpload) -> Result<StagedImage, UploadError> {
        let content_type = upload.content_type.as_deref().unwrap_or_default();
        if !content_type.starts_with("image/") {
            return Err(UploadError::NotAnImage(content_type.to_string()));
        }
        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = format!("{content_id}{}", extension_for(upload.file_name.as_deref()));
        let temp = self.dir.join(format!(".{file_name}.part"));
        tokio::fs::write(&temp, &upload.bytes).await?;
        Ok(StagedImage {
            content_id,
            url: format!("{UPLOAD_URL_PREFIX}/{file_name}"),
            file_name,
            temp,
        })
    }

    /// Replace any earlier image of the content with the staged file.
    pub async fn commit(&self, staged: StagedImage) -> Result<String, UploadError> {
        self.remove_existing(staged.content_id).await?;
        tokio::fs::rename(&staged.temp, self.dir.join(&staged.file_name)).await?;
        debug!(content_id = %staged.content_id, file = %staged.file_name, "image stored");
        Ok(staged.url)
    }

    /// Drop a staged file; the current image stays in place.
    pub async fn discard(&self, staged: StagedImage) {
        if let Err(e) = tokio::fs::remove_file(&staged.temp).await {
            warn!(file = %staged.temp.display(), error = %e, "failed to discard staged image");
        }
    }

    async fn remove_existing(&self, content_id: Uuid) -> Result<(), UploadError> {
        let stem = content_id.to_string();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.file_stem().and_then(|s| s.to_str()) == Some(stem.as_str()) {
                tokio::fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }

    /// Best-effort removal of the file behind a public image URL.
    pub async fn remove_url(&self, url: &str) {
        let Some(file_name) = url
            .strip_prefix(UPLOAD_URL_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return;
        };
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            warn!(url, "refusing to remove image outside the upload directory");
            return;
        }
        match tokio::fs::remove_file(self.dir.join(file_name)).await {
            Ok(()) => debug!(file = file_name, "image removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(file = file_name, error = %e, "failed to remove image"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> ImageUpload {
        ImageUpload {
            file_name: Some(name.into()),
            content_type: Some("image/png".into()),
            bytes: Bytes::from_static(b"\x89PNG"),
        }
    }

    #[test]
    fn extension_defaults_to_jpg() {
        assert_eq!(extension_for(Some("cat.PNG")), ".png");
        assert_eq!(extension_for(Some("noext")), ".jpg");
        assert_eq!(extension_for(None), ".jpg");
        assert_eq!(extension_for(Some("weird.p-g")), ".jpg");
    }

    #[tokio::test]
    async fn save_names_file_after_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("upload"));
        let id = Uuid::new_v4();

        let url = store.save(id, &png("photo.png")).await.unwrap();
        assert_eq!(url, format!("/shared/upload/{id}.png"));
        assert!(dir.path().join("upload").join(format!("{id}.png")).exists());
    }

    #[tokio::test]
    async fn save_replaces_previous_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let id = Uuid::new_v4();

        store.save(id, &png("a.png")).await.unwrap();
        let url = store.save(id, &png("b.gif")).await.unwrap();
        assert!(url.ends_with(".gif"));
        assert!(!dir.path().join(format!("{id}.png")).exists());
        assert!(dir.path().join(format!("{id}.gif")).exists());
    }

    #[tokio::test]
    async fn discarded_stage_keeps_current_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let id = Uuid::new_v4();
        store.save(id, &png("a.png")).await.unwrap();

        let staged = store.stage(id, &png("b.gif")).await.unwrap();
        assert_eq!(staged.url(), format!("/shared/upload/{id}.gif"));
        assert!(dir.path().join(format!("{id}.png")).exists());
        store.discard(staged).await;

        assert!(dir.path().join(format!("{id}.png")).exists());
        assert!(!dir.path().join(format!("{id}.gif")).exists());
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn non_image_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let upload = ImageUpload {
            file_name: Some("notes.txt".into()),
            content_type: Some("text/plain".into()),
            bytes: Bytes::from_static(b"hi"),
        };
        let err = store.save(Uuid::new_v4(), &upload).await.unwrap_err();
        assert!(matches!(err, UploadError::NotAnImage(t) if t == "text/plain"));
    }

    #[tokio::test]
    async fn remove_url_deletes_only_inside_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("upload"));
        let id = Uuid::new_v4();
        let url = store.save(id, &png("x.png")).await.unwrap();

        let outside = dir.path().join("keep.txt");
        std::fs::write(&outside, "keep").unwrap();
        store.remove_url("/shared/upload/../keep.txt").await;
        assert!(outside.exists());

        store.remove_url(&url).await;
        assert!(!dir.path().join("upload").join(format!("{id}.png")).exists());
        // Removing twice is fine.
        store.remove_url(&url).await;
    }
}
