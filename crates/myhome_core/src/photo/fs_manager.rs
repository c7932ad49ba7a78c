//! Filesystem-backed photo manager.
//!
//! Layout: `<root>/<incidence_id>/<photo_uuid>[.<ext>]`. The storage key is
//! the path relative to `<root>`.

use super::{PhotoError, PhotoManager, PhotoResult};
use crate::model::incidence::Incidence;
use crate::model::photo::{Photo, PhotoUpload};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const MAX_FILE_NAME_CHARS: usize = 120;

static UNSAFE_FILE_NAME_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid file name regex"));

/// Stores photo binaries under one root directory.
#[derive(Debug, Clone)]
pub struct FsPhotoManager {
    root: PathBuf,
}

impl FsPhotoManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a photo's storage key to an absolute location under root.
    pub fn path_of(&self, photo: &Photo) -> PhotoResult<PathBuf> {
        let key = Path::new(&photo.storage_key);
        let is_plain_relative = key
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if photo.storage_key.is_empty() || !is_plain_relative {
            return Err(PhotoError::InvalidStorageKey(photo.storage_key.clone()));
        }
        Ok(self.root.join(key))
    }

    /// Reads the stored bytes back.
    pub fn read(&self, photo: &Photo) -> PhotoResult<Vec<u8>> {
        let path = self.path_of(photo)?;
        std::fs::read(&path).map_err(|source| PhotoError::Io { path, source })
    }
}

impl PhotoManager for FsPhotoManager {
    fn attach(&self, incidence: &Incidence, upload: &PhotoUpload) -> PhotoResult<Photo> {
        let incidence_id = incidence.id.ok_or(PhotoError::IncidenceNotPersisted)?;
        if upload.bytes.is_empty() {
            return Err(PhotoError::EmptyUpload {
                file_name: upload.file_name.clone(),
            });
        }

        let file_name = sanitize_file_name(&upload.file_name)
            .ok_or_else(|| PhotoError::InvalidFileName(upload.file_name.clone()))?;
        let photo_id = Uuid::new_v4();
        let storage_key = match Path::new(&file_name).extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{incidence_id}/{photo_id}.{}", ext.to_ascii_lowercase()),
            None => format!("{incidence_id}/{photo_id}"),
        };

        let dir = self.root.join(incidence_id.to_string());
        std::fs::create_dir_all(&dir).map_err(|source| PhotoError::Io {
            path: dir.clone(),
            source,
        })?;
        let path = self.root.join(&storage_key);
        std::fs::write(&path, &upload.bytes).map_err(|source| PhotoError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(
            "event=photo_store module=photo status=ok incidence_id={} photo_id={} size_bytes={}",
            incidence_id,
            photo_id,
            upload.bytes.len()
        );

        Ok(Photo {
            id: photo_id,
            incidence_id,
            file_name,
            content_type: upload.content_type.clone(),
            storage_key,
            size_bytes: upload.bytes.len() as u64,
            created_at: now_epoch_ms(),
        })
    }

    fn discard(&self, photo: &Photo) -> PhotoResult<()> {
        let path = self.path_of(photo)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(PhotoError::Io { path, source }),
        }

        // Leftover incidence directory; fails harmlessly while other photos remain.
        if let Some(parent) = path.parent() {
            if parent != self.root.as_path() && std::fs::remove_dir(parent).is_err() {
                debug!(
                    "event=photo_discard module=photo status=dir_kept incidence_id={}",
                    photo.incidence_id
                );
            }
        }

        debug!(
            "event=photo_discard module=photo status=ok incidence_id={} photo_id={}",
            photo.incidence_id, photo.id
        );
        Ok(())
    }
}

/// Reduces an uploaded name to a safe single path segment.
///
/// Client-side directories are dropped and unsafe runs become `_`.
fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    let replaced = UNSAFE_FILE_NAME_CHARS_RE.replace_all(base, "_");
    let cleaned = replaced.trim_start_matches('.');
    if cleaned.is_empty() || cleaned.chars().all(|ch| ch == '_') {
        return None;
    }
    Some(cleaned.chars().take(MAX_FILE_NAME_CHARS).collect())
}

fn now_epoch_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
        Err(err) => {
            warn!("event=clock_read module=photo status=error error={err}");
            0
        }
    }
}
