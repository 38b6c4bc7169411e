use async_trait::async_trait;

/// Restarts the machine once an image has been written or sent.
#[async_trait]
pub trait Reboot: Send + Sync {
    async fn reboot(&self) -> anyhow::Result<()>;
}

/// The operator's terminal.
pub trait Screen: Send + Sync {
    fn clear(&self) -> std::io::Result<()>;
}
