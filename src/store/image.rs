use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Error, Result};

/// Largest image accepted by an upload, in bytes.
pub const MAX_IMAGE_SIZE: usize = 1 << 20;

/// Index entry of a persisted image. Written once, never updated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    /// Laptop the image belongs to.
    pub laptop_id: String,
    /// Declared content type, used as the file extension (e.g. `.png`).
    pub image_type: String,
    /// Location of the image bytes on disk.
    pub path: PathBuf,
}

/// Writes images to a folder and indexes them by generated id.
///
/// Each image gets a freshly generated file name, so writes need no lock;
/// only the index is guarded.
#[derive(Clone)]
pub struct DiskImageStore {
    folder: PathBuf,
    images: Arc<RwLock<HashMap<String, ImageInfo>>>,
}

impl DiskImageStore {
    /// Creates a store writing into `folder`, which must already exist.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            images: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Folder images are written to.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Persists `data` and returns the generated image id.
    ///
    /// A failed write leaves no file behind.
    pub async fn save(&self, laptop_id: &str, image_type: &str, data: &[u8]) -> Result<String> {
        let image_id = Uuid::new_v4().to_string();
        let path = self.folder.join(format!("{image_id}{image_type}"));

        if let Err(e) = tokio::fs::write(&path, data).await {
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), "cannot remove partial image: {cleanup}");
                }
            }
            return Err(Error::Internal(format!("cannot write image file: {e}")));
        }

        info!(%image_id, path = %path.display(), size = data.len(), "image written");

        let mut images = self.images.write().await;
        images.insert(
            image_id.clone(),
            ImageInfo {
                laptop_id: laptop_id.to_string(),
                image_type: image_type.to_string(),
                path,
            },
        );

        Ok(image_id)
    }

    /// Returns a copy of the index entry for `image_id`.
    pub async fn find(&self, image_id: &str) -> Option<ImageInfo> {
        self.images.read().await.get(image_id).cloned()
    }
}

/// Reassembles an uploaded image from its chunks.
///
/// The size ceiling is enforced on every chunk, so an oversized upload is
/// rejected as soon as it crosses the limit. Nothing touches the disk until
/// [`ImageAssembler::finish`].
#[derive(Debug)]
pub struct ImageAssembler {
    laptop_id: String,
    image_type: String,
    data: Vec<u8>,
    max_size: usize,
}

impl ImageAssembler {
    /// Starts assembling an image for `laptop_id` with the default ceiling.
    pub fn new(laptop_id: &str, image_type: &str) -> Result<Self> {
        Self::with_max_size(laptop_id, image_type, MAX_IMAGE_SIZE)
    }

    /// Starts assembling an image with a custom size ceiling.
    pub fn with_max_size(laptop_id: &str, image_type: &str, max_size: usize) -> Result<Self> {
        validate_image_type(image_type)?;

        Ok(Self {
            laptop_id: laptop_id.to_string(),
            image_type: image_type.to_string(),
            data: Vec::new(),
            max_size,
        })
    }

    /// Appends a chunk, failing with `InvalidArgument` once the cumulative
    /// size exceeds the ceiling.
    pub fn append(&mut self, chunk: &[u8]) -> Result<()> {
        let size = self.data.len().saturating_add(chunk.len());

        if size > self.max_size {
            return Err(Error::InvalidArgument(format!(
                "image is too large: {size} > {}",
                self.max_size
            )));
        }

        self.data.extend_from_slice(chunk);
        Ok(())
    }

    /// Bytes received so far.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Persists the assembled image and returns its id and size.
    pub async fn finish(self, store: &DiskImageStore) -> Result<(String, u32)> {
        let size = u32::try_from(self.data.len())
            .map_err(|_| Error::InvalidArgument("image size overflows u32".to_string()))?;

        let image_id = store
            .save(&self.laptop_id, &self.image_type, &self.data)
            .await?;

        Ok((image_id, size))
    }
}

/// Image types end up in a file name: allow only a short dotted extension.
fn validate_image_type(image_type: &str) -> Result<()> {
    let valid = image_type.len() <= 16
        && (image_type.is_empty()
            || (image_type.starts_with('.')
                && image_type.len() > 1
                && image_type[1..].chars().all(|c| c.is_ascii_alphanumeric())));

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "image type '{image_type}' is not a valid file extension"
        )))
    }
}
