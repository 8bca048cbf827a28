use crate::error::InteractionError;
use crate::page::{Locator, Page, PageError};
use std::time::Duration;

/// Bounded linear backoff for UI interactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(6000),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the attempt following `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay.saturating_mul(attempt).min(self.max_delay)
    }
}

/// Run `action` until it succeeds, retrying transient failures.
///
/// Structural failures are returned at once as [`InteractionError::Impossible`];
/// after `max_attempts` transient failures the last one is wrapped in
/// [`InteractionError::Exhausted`].
pub fn retry_interaction<T, F>(
    policy: &RetryPolicy,
    what: &str,
    mut action: F,
) -> Result<T, InteractionError>
where
    F: FnMut() -> Result<T, PageError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match action() {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => {
                return Err(InteractionError::Impossible {
                    what: what.to_string(),
                    source: e,
                });
            }
            Err(e) if attempt >= max_attempts => {
                return Err(InteractionError::Exhausted {
                    what: what.to_string(),
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                log::warn!(
                    "{} failed, attempt {}/{}: {}",
                    what,
                    attempt,
                    max_attempts,
                    e
                );
                let delay = policy.backoff(attempt);
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
        }
    }
}

/// Scroll the element into view and click it, with retries
pub fn safe_click<P: Page + ?Sized>(
    page: &P,
    policy: &RetryPolicy,
    locator: &Locator,
    index: usize,
) -> Result<(), InteractionError> {
    let what = format!("click on {} #{}", locator, index);
    retry_interaction(policy, &what, || {
        page.scroll_into_view(locator, index)?;
        page.click(locator, index)
    })
}
