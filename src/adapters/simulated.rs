use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::info;

use crate::core::{Reboot, Screen};

/// Stands in for the reboot when running with `--no-reboot`.
pub struct LogOnlyReboot;

#[async_trait]
impl Reboot for LogOnlyReboot {
    async fn reboot(&self) -> anyhow::Result<()> {
        info!("Reboot skipped (simulation)");
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
pub struct UnsupportedReboot;

#[cfg(not(target_os = "linux"))]
#[async_trait]
impl Reboot for UnsupportedReboot {
    async fn reboot(&self) -> anyhow::Result<()> {
        anyhow::bail!("rebooting is only supported on Linux")
    }
}

/// Counts reboot requests instead of performing them.
///
/// Clones share the same counter, so a test can keep one and hand the other
/// to an orchestrator.
#[derive(Clone, Default)]
pub struct RecordingReboot {
    calls: Arc<AtomicUsize>,
}

impl RecordingReboot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reboot for RecordingReboot {
    async fn reboot(&self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A screen that is never cleared.
pub struct NoopScreen;

impl Screen for NoopScreen {
    fn clear(&self) -> std::io::Result<()> {
        Ok(())
    }
}
