//! Binary photo storage for incidence evidence.
//!
//! # Responsibility
//! - Persist uploaded photo bytes against an already-stored incidence.
//! - Hand back `Photo` records whose `storage_key` resolves to the bytes.
//!
//! # Invariants
//! - `attach` requires `incidence.id` to be set.
//! - `discard` is idempotent; a missing binary is not an error.

use crate::model::incidence::Incidence;
use crate::model::photo::{Photo, PhotoUpload};
use std::path::PathBuf;
use thiserror::Error;

mod fs_manager;

pub use fs_manager::FsPhotoManager;

pub type PhotoResult<T> = Result<T, PhotoError>;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("photos can only be attached to a persisted incidence")]
    IncidenceNotPersisted,
    #[error("uploaded photo `{file_name}` is empty")]
    EmptyUpload { file_name: String },
    #[error("uploaded photo name `{0}` has no usable characters")]
    InvalidFileName(String),
    #[error("photo storage key `{0}` is not managed by this store")]
    InvalidStorageKey(String),
    #[error("photo storage io failed at `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stores and removes photo binaries.
pub trait PhotoManager {
    /// Stores `upload` for `incidence` and returns the resulting record.
    ///
    /// The returned photo is not yet linked in the incidence store; the
    /// caller appends it to the aggregate and saves.
    fn attach(&self, incidence: &Incidence, upload: &PhotoUpload) -> PhotoResult<Photo>;
    /// Removes the binary behind `photo`.
    fn discard(&self, photo: &Photo) -> PhotoResult<()>;
}

impl<P: PhotoManager + ?Sized> PhotoManager for &P {
    fn attach(&self, incidence: &Incidence, upload: &PhotoUpload) -> PhotoResult<Photo> {
        (**self).attach(incidence, upload)
    }

    fn discard(&self, photo: &Photo) -> PhotoResult<()> {
        (**self).discard(photo)
    }
}
