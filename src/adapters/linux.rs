use anyhow::Context;
use async_trait::async_trait;
use nix::sys::reboot::{RebootMode, reboot};
use nix::unistd::sync;
use tracing::info;

use crate::core::Reboot;

pub struct LinuxReboot;

#[async_trait]
impl Reboot for LinuxReboot {
    async fn reboot(&self) -> anyhow::Result<()> {
        info!("Syncing filesystems and rebooting");

        // NOTE: only returns if the kernel refused (e.g. missing CAP_SYS_BOOT)
        tokio::task::spawn_blocking(|| {
            sync();
            reboot(RebootMode::RB_AUTOBOOT).map(|_| ())
        })
        .await?
        .context("reboot(2) failed")
    }
}
