//! Image lifecycle: registration, listing, lookup, removal, and the
//! name-or-default resolution `RunCommand` needs before dispatch.

use crate::execution::ResolvedImage;
use crate::Orchestrator;
use serde::{Deserialize, Serialize};
use tf_error::{OrchestratorError, Result};
use tf_provider::RequestContext;
use tf_repo::ImageInfo;
use tracing::warn;

/// Input to [`Orchestrator::register_image`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterImageRequest {
    /// The human image name (e.g. an OCI reference).
    pub image: String,
    /// Whether this image becomes the registry's default.
    pub is_default: bool,
    /// Provider-specific task role, if applicable.
    pub task_role: Option<String>,
    /// Provider-specific execution role, if applicable.
    pub exec_role: Option<String>,
    /// CPU units requested.
    pub cpu: Option<String>,
    /// Memory requested.
    pub memory: Option<String>,
    /// Target platform (e.g. `linux/amd64`).
    pub platform: Option<String>,
}

impl Orchestrator {
    /// Register a new image and grant its creator ownership.
    ///
    /// Ownership sync into the enforcer is best-effort: the registry is
    /// the source of truth for an image's `owned_by` set, so a sync
    /// failure here is logged rather than rolled back.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an empty image name, plus whatever the
    /// registry surfaces.
    pub async fn register_image(
        &self,
        ctx: &RequestContext,
        user_email: &str,
        req: RegisterImageRequest,
    ) -> Result<ImageInfo> {
        if req.image.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("image must not be empty"));
        }

        let image_id = self
            .image_registry
            .register_image(
                ctx,
                &req.image,
                req.is_default,
                req.task_role,
                req.exec_role,
                req.cpu,
                req.memory,
                req.platform,
                user_email,
            )
            .await?;

        let image = self.image_registry.get_image(ctx, &image_id).await?;

        if let Err(err) = self
            .enforcer
            .add_ownership_for_resource(&format!("image:{image_id}"), user_email)
            .await
        {
            warn!(image_id, error = %err, "failed to synchronize image ownership");
        }

        Ok(image)
    }

    /// List every registered image.
    ///
    /// # Errors
    ///
    /// Whatever the registry surfaces.
    pub async fn list_images(&self, ctx: &RequestContext) -> Result<Vec<ImageInfo>> {
        self.image_registry.list_images(ctx).await
    }

    /// Look up an image by id.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an empty id, `NotFound` if absent.
    pub async fn get_image(&self, ctx: &RequestContext, image_id: &str) -> Result<ImageInfo> {
        if image_id.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("image_id must not be empty"));
        }
        self.image_registry.get_image(ctx, image_id).await
    }

    /// Remove an image and every ownership edge referencing it.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an empty id, `NotFound` if absent.
    pub async fn remove_image(&self, ctx: &RequestContext, image_id: &str) -> Result<()> {
        if image_id.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("image_id must not be empty"));
        }
        self.image_registry.remove_image(ctx, image_id).await?;
        if let Err(err) = self
            .enforcer
            .remove_all_ownerships_for_resource(&format!("image:{image_id}"))
            .await
        {
            warn!(image_id, error = %err, "failed to clear image ownership after removal");
        }
        Ok(())
    }

    /// Resolve a `RunCommand` image field to a concrete image id: the
    /// registry default if `name` is empty, the image itself if `name` is
    /// already a provider-issued id, or the first registered image whose
    /// human name matches.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if `name` is empty and no default image is
    /// configured, or if a non-empty name matches nothing.
    pub async fn resolve_image(&self, ctx: &RequestContext, name: &str) -> Result<ResolvedImage> {
        if name.trim().is_empty() {
            let default = self.image_registry.default_image(ctx).await?;
            return default
                .map(|img| ResolvedImage { image_id: img.image_id })
                .ok_or_else(|| OrchestratorError::invalid_request("no default image configured"));
        }

        if let Ok(image) = self.image_registry.get_image(ctx, name).await {
            return Ok(ResolvedImage { image_id: image.image_id });
        }

        let images = self.image_registry.list_images(ctx).await?;
        images
            .into_iter()
            .find(|img| img.image == name)
            .map(|img| ResolvedImage { image_id: img.image_id })
            .ok_or_else(|| {
                OrchestratorError::invalid_request(format!("unknown image: {name}"))
                    .with_context("image", name.to_string())
            })
    }
}
