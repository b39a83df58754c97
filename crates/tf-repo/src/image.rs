//! Image metadata storage.
//!
//! The repository boundary here is intentionally minimal: registration
//! and mutation belong to the image-registry provider ([`tf_provider`]),
//! and this repository only serves the read paths the orchestrator and
//! trace aggregator need directly.

use crate::entities::ImageInfo;
use async_trait::async_trait;
use std::collections::HashMap;
use tf_error::Result;
use tokio::sync::RwLock;

/// Durable read access to registered image metadata.
#[async_trait]
pub trait ImageRepo: Send + Sync {
    /// List every registered image.
    async fn list_images(&self) -> Result<Vec<ImageInfo>>;

    /// Every image stamped with the given request id.
    async fn get_images_by_request_id(&self, request_id: &str) -> Result<Vec<ImageInfo>>;
}

/// In-memory [`ImageRepo`] reference implementation, populated by the
/// image registry provider as images are registered.
#[derive(Default)]
pub struct InMemoryImageRepo {
    images: RwLock<HashMap<String, ImageInfo>>,
}

impl InMemoryImageRepo {
    /// Construct an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an image record. Exposed so an image-registry
    /// provider can keep this read-side index in sync.
    pub async fn put(&self, image: ImageInfo) {
        self.images.write().await.insert(image.image_id.clone(), image);
    }

    /// Remove an image record by id.
    pub async fn remove(&self, image_id: &str) {
        self.images.write().await.remove(image_id);
    }
}

#[async_trait]
impl ImageRepo for InMemoryImageRepo {
    async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        Ok(self.images.read().await.values().cloned().collect())
    }

    async fn get_images_by_request_id(&self, _request_id: &str) -> Result<Vec<ImageInfo>> {
        // Image registration is not currently request-id stamped at the
        // provider boundary (see tf-provider::ImageRegistry); this always
        // returns an empty slice until that changes.
        Ok(Vec::new())
    }
}
