use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{self, Endpoints};
use crate::core::host::{Reboot, Screen};
use crate::core::transfer_engine::{IMAGE_FIELD_NAME, download_file, upload_multipart_file};

/// Time given to the reboot to take effect before returning.
const REBOOT_GRACE: Duration = Duration::from_secs(5);

const RULE: &str =
    "--------------------------------------------------------------------------------";

/// Entry point for a push or a pull: resolve endpoints, move the image once,
/// then reboot. Any failure is returned before the reboot is attempted.
pub struct Orchestrator {
    client: reqwest::Client,
    screen: Box<dyn Screen>,
    reboot: Box<dyn Reboot>,
    cmdline_path: PathBuf,
    reboot_grace: Duration,
}

impl Orchestrator {
    pub fn new(screen: Box<dyn Screen>, reboot: Box<dyn Reboot>) -> Self {
        Self {
            client: reqwest::Client::new(),
            screen,
            reboot,
            cmdline_path: config::cmdline_path(),
            reboot_grace: REBOOT_GRACE,
        }
    }

    pub fn with_cmdline_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cmdline_path = path.into();
        self
    }

    pub fn with_reboot_grace(mut self, grace: Duration) -> Self {
        self.reboot_grace = grace;
        self
    }

    /// Read the local disk image at `src` and send it to the server at `dst`.
    pub async fn push(&self) -> Result<()> {
        let endpoints = self.resolve_endpoints()?;
        self.push_to(&endpoints).await
    }

    /// Fetch the image at `src` and write it to the local `dst`.
    pub async fn pull(&self) -> Result<()> {
        let endpoints = self.resolve_endpoints()?;
        self.pull_from(&endpoints).await
    }

    pub async fn push_to(&self, endpoints: &Endpoints) -> Result<()> {
        info!(src = %endpoints.src, dst = %endpoints.dst, "Pushing image");

        let response = upload_multipart_file(
            &self.client,
            &endpoints.dst,
            IMAGE_FIELD_NAME,
            Path::new(&endpoints.src),
        )
        .await
        .with_context(|| format!("Failed to send {} to {}", endpoints.src, endpoints.dst))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Server did not accept the image cleanly");
        }

        println!("\n\n");
        println!(
            "Reading of disk [{}], and sending to [{}]",
            base_name(&endpoints.src),
            endpoints.dst
        );

        self.finish().await
    }

    pub async fn pull_from(&self, endpoints: &Endpoints) -> Result<()> {
        info!(src = %endpoints.src, dst = %endpoints.dst, "Pulling image");

        println!("\n\n");
        println!(
            "Beginning write of image [{}] to disk [{}]\n\n",
            base_name(&endpoints.src),
            endpoints.dst
        );

        let written = download_file(&self.client, &endpoints.src, Path::new(&endpoints.dst))
            .await
            .with_context(|| format!("Failed to write {} to {}", endpoints.src, endpoints.dst))?;

        info!(bytes = written, dst = %endpoints.dst, "Image written");

        self.finish().await
    }

    fn resolve_endpoints(&self) -> Result<Endpoints> {
        if let Err(e) = self.screen.clear() {
            debug!(error = %e, "Could not clear screen");
        }

        println!("{}", RULE);
        println!("Starting BOOTy\n\n");
        println!("Parsing config from [{}]", self.cmdline_path.display());

        Endpoints::resolve(&self.cmdline_path).with_context(|| {
            format!(
                "Failed to resolve endpoints from {}",
                self.cmdline_path.display()
            )
        })
    }

    async fn finish(&self) -> Result<()> {
        println!("\n\n");
        println!("{}", RULE);

        self.reboot.reboot().await.context("Reboot failed")?;
        tokio::time::sleep(self.reboot_grace).await;

        Ok(())
    }
}

/// Last path segment of a file path or URL.
fn base_name(endpoint: &str) -> &str {
    endpoint
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(endpoint)
}
