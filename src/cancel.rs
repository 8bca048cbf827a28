use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cooperative stop flag, checked between nodes and between leaves
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    stop_requested: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Request a stop once `duration` has passed
    pub fn cancel_after(&self, duration: Duration) {
        let token = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(duration);
            log::info!("Run duration of {:?} reached, stopping after the current step", duration);
            token.cancel();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_cancel_after() {
        let token = CancelToken::new();
        token.cancel_after(Duration::from_millis(10));
        let start = std::time::Instant::now();
        while !token.is_cancelled() && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(token.is_cancelled());
    }
}
