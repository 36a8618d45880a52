use crate::error::Result;
use crate::Notifier;

use async_trait::async_trait;
use log::info;

/// Notifier that only logs what would have been sent
///
/// Stands in for the chat platform client when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_image(&self, recipient: &str, url: &str, caption: &str) -> Result<()> {
        info!("notify {}: {} ({})", recipient, caption, url);
        Ok(())
    }
}
