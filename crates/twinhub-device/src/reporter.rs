use std::future::Future;

use tokio::sync::mpsc;

use tracing::debug;

use twinhub::patch::PropertyPatch;

use crate::error::{Error, ErrorKind, Result};

/// Delivers reported-property patches to the service.
///
/// Implemented by the transport of the application. A report completes only
/// once the patch has been handed over, so callers awaiting it observe the
/// delivery order.
pub trait PropertyReporter: Send + Sync {
    /// Reports a patch.
    ///
    /// # Errors
    ///
    /// The patch cannot be delivered.
    fn report(&self, patch: PropertyPatch) -> impl Future<Output = Result<()>> + Send;
}

/// A [`PropertyReporter`] forwarding every patch on a channel.
///
/// The receiving half is owned by the task talking to the service.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: mpsc::Sender<PropertyPatch>,
}

impl ChannelReporter {
    /// Creates a [`ChannelReporter`] along with the receiver of its patches.
    ///
    /// The channel holds at most `capacity` undelivered patches.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PropertyPatch>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl PropertyReporter for ChannelReporter {
    async fn report(&self, patch: PropertyPatch) -> Result<()> {
        debug!("Reporting patch with {} entries", patch.len());
        self.sender.send(patch).await.map_err(|_| {
            Error::new(
                ErrorKind::Report,
                "The receiver of the reported properties has been dropped",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use twinhub::patch::PropertyPatch;

    use crate::error::ErrorKind;

    use super::{ChannelReporter, PropertyReporter};

    #[tokio::test]
    async fn forwards_in_order() {
        let (reporter, mut receiver) = ChannelReporter::new(4);

        for value in [1, 2] {
            let mut patch = PropertyPatch::new();
            patch.insert_property("counter", json!(value));
            reporter.report(patch).await.unwrap();
        }

        assert_eq!(receiver.recv().await.unwrap().get("counter"), Some(&json!(1)));
        assert_eq!(receiver.recv().await.unwrap().get("counter"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn closed_channel() {
        let (reporter, receiver) = ChannelReporter::new(1);
        drop(receiver);

        assert_eq!(
            reporter.report(PropertyPatch::new()).await.unwrap_err().kind(),
            ErrorKind::Report
        );
    }
}
