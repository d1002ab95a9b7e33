use tokio::task::JoinHandle;

use crate::effects::ExpirationScanner;

/// Long-running tasks owned by a running engine.
#[derive(Default)]
pub struct BackgroundTasks {
    pub scanner: Option<ExpirationScanner>,
    pub writer: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Stop the scanner, then end the persistence writer.
    ///
    /// Callers flush the writer first; anything still queued is dropped.
    pub async fn stop_all(&mut self) {
        if let Some(scanner) = self.scanner.take() {
            scanner.stop().await;
        }
        if let Some(handle) = self.writer.take() {
            handle.abort();
        }
    }
}
