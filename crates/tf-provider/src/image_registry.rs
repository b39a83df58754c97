//! Image registration: the provider of record for container image
//! metadata. [`tf_repo::ImageRepo`] is a read-side index kept in sync by
//! this provider; this trait is the only place images are created or
//! removed.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tf_error::{OrchestratorError, Result};
use tf_repo::ImageInfo;
use tokio::sync::RwLock;

use crate::context::RequestContext;

/// Registers, looks up, and removes container images.
#[async_trait]
pub trait ImageRegistry: Send + Sync {
    /// Register a new image, returning its provider-issued id.
    #[allow(clippy::too_many_arguments)]
    async fn register_image(
        &self,
        ctx: &RequestContext,
        image: &str,
        is_default: bool,
        task_role: Option<String>,
        exec_role: Option<String>,
        cpu: Option<String>,
        memory: Option<String>,
        platform: Option<String>,
        created_by: &str,
    ) -> Result<String>;

    /// List every registered image.
    async fn list_images(&self, ctx: &RequestContext) -> Result<Vec<ImageInfo>>;

    /// Look up an image by id. `NotFound` if absent.
    async fn get_image(&self, ctx: &RequestContext, image_id: &str) -> Result<ImageInfo>;

    /// Remove an image by id. `NotFound` if absent.
    async fn remove_image(&self, ctx: &RequestContext, image_id: &str) -> Result<()>;

    /// The registry's configured default image, if one has been marked
    /// default via `register_image(is_default = true, ..)`.
    async fn default_image(&self, ctx: &RequestContext) -> Result<Option<ImageInfo>>;
}

struct RegistryState {
    images: HashMap<String, ImageInfo>,
    default_image_id: Option<String>,
}

/// In-memory [`ImageRegistry`] reference implementation.
pub struct InMemoryImageRegistry {
    state: RwLock<RegistryState>,
    sequence: AtomicU64,
}

impl Default for InMemoryImageRegistry {
    fn default() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                images: HashMap::new(),
                default_image_id: None,
            }),
            sequence: AtomicU64::new(0),
        }
    }
}

impl InMemoryImageRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> String {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        format!("img-{n:08x}")
    }
}

#[async_trait]
impl ImageRegistry for InMemoryImageRegistry {
    async fn register_image(
        &self,
        ctx: &RequestContext,
        image: &str,
        is_default: bool,
        _task_role: Option<String>,
        _exec_role: Option<String>,
        cpu: Option<String>,
        memory: Option<String>,
        platform: Option<String>,
        created_by: &str,
    ) -> Result<String> {
        ctx.check_cancelled()?;
        let image_id = self.next_id();
        let record = ImageInfo {
            image_id: image_id.clone(),
            image: image.to_string(),
            cpu,
            memory,
            platform,
            created_by: created_by.to_string(),
            owned_by: BTreeSet::from([created_by.to_string()]),
            created_at: Utc::now(),
        };
        let mut state = self.state.write().await;
        state.images.insert(image_id.clone(), record);
        if is_default {
            state.default_image_id = Some(image_id.clone());
        }
        Ok(image_id)
    }

    async fn list_images(&self, ctx: &RequestContext) -> Result<Vec<ImageInfo>> {
        ctx.check_cancelled()?;
        Ok(self.state.read().await.images.values().cloned().collect())
    }

    async fn get_image(&self, ctx: &RequestContext, image_id: &str) -> Result<ImageInfo> {
        ctx.check_cancelled()?;
        self.state
            .read()
            .await
            .images
            .get(image_id)
            .cloned()
            .ok_or_else(|| {
                OrchestratorError::not_found(format!("image not found: {image_id}"))
                    .with_context("image_id", image_id.to_string())
            })
    }

    async fn remove_image(&self, ctx: &RequestContext, image_id: &str) -> Result<()> {
        ctx.check_cancelled()?;
        let mut state = self.state.write().await;
        state.images.remove(image_id).ok_or_else(|| {
            OrchestratorError::not_found(format!("image not found: {image_id}"))
        })?;
        if state.default_image_id.as_deref() == Some(image_id) {
            state.default_image_id = None;
        }
        Ok(())
    }

    async fn default_image(&self, ctx: &RequestContext) -> Result<Option<ImageInfo>> {
        ctx.check_cancelled()?;
        let state = self.state.read().await;
        Ok(state
            .default_image_id
            .as_ref()
            .and_then(|id| state.images.get(id).cloned()))
    }
}
