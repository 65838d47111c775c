use anyhow::Result;
use bollard::errors::Error as BollardError;
use bollard::query_parameters::CreateImageOptions;
use futures::StreamExt;

use crate::config::ImagePullPolicy;
use crate::docker::client::DockerClient;

/// Service handling Docker images
pub struct ImageService<'a> {
    client: &'a DockerClient,
    pull_policy: ImagePullPolicy,
}

impl<'a> ImageService<'a> {
    /// Creates a new image service
    pub fn new(client: &'a DockerClient, pull_policy: ImagePullPolicy) -> Self {
        Self {
            client,
            pull_policy,
        }
    }

    /// Checks whether an image is present locally
    pub async fn image_exists(&self, image_name: &str) -> Result<bool> {
        match self.client.docker().inspect_image(image_name).await {
            Ok(_) => Ok(true),
            Err(BollardError::DockerResponseServerError { status_code: 404, .. }) => Ok(false),
            Err(e) => Err(anyhow::anyhow!("Failed to inspect image {}: {}", image_name, e)),
        }
    }

    /// Pulls an image according to the configured policy. Returns whether a
    /// pull actually happened.
    pub async fn pull_image(&self, image_name: &str) -> Result<bool> {
        match self.pull_policy {
            ImagePullPolicy::Always => {
                tracing::info!(image = image_name, "pulling image (policy: always)");
                self.force_pull_image(image_name).await?;
                Ok(true)
            }
            ImagePullPolicy::IfNotPresent => {
                if self.image_exists(image_name).await? {
                    tracing::debug!(image = image_name, "image present locally, skipping pull");
                    Ok(false)
                } else {
                    tracing::info!(image = image_name, "pulling image (policy: if-not-present)");
                    self.force_pull_image(image_name).await?;
                    Ok(true)
                }
            }
        }
    }

    async fn force_pull_image(&self, image_name: &str) -> Result<()> {
        let options = CreateImageOptions {
            from_image: Some(image_name.to_string()),
            ..Default::default()
        };

        let mut stream = self.client.docker().create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            if let Err(e) = result {
                return Err(anyhow::anyhow!("Failed to pull image {}: {}", image_name, e));
            }
        }

        tracing::info!(image = image_name, "pulled image");
        Ok(())
    }
}
