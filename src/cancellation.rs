use std::sync::Arc;

use tokio::sync::watch;

/// Cooperative cancellation flag shared by every stage of a run.
///
/// Clones observe the same flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct Cancellation {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Cancellation {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                // Sender gone without cancelling
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}
