//! Abstract browser interaction contract.
//!
//! The crawler never talks to a browser directly. Everything it needs from the
//! automation layer goes through [`Page`]: element lookup, visibility, scrolling,
//! clicking, reading text and attributes, and navigation. Elements are addressed
//! by a [`Locator`] plus an index into its matches, and are re-resolved on every
//! call, so no element handle outlives a re-render.

use std::fmt;
use std::time::{Duration, Instant};

/// CSS selector, optionally scoped to the n-th match of a parent selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub scope: Option<(String, usize)>,
    pub selector: String,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            scope: None,
            selector: selector.into(),
        }
    }

    /// `selector` matched inside the `nth` element matching `scope`
    pub fn within(scope: impl Into<String>, nth: usize, selector: impl Into<String>) -> Self {
        Self {
            scope: Some((scope.into(), nth)),
            selector: selector.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some((scope, nth)) => write!(f, "{}[{}] {}", scope, nth, self.selector),
            None => write!(f, "{}", self.selector),
        }
    }
}

/// Errors raised by a single page interaction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("Click intercepted on {target} by {by}")]
    Intercepted { target: String, by: String },

    #[error("Element detached from document: {0}")]
    Detached(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("JavaScript execution error: {0}")]
    Script(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Browser session closed: {0}")]
    SessionClosed(String),
}

impl PageError {
    /// Rendering races that may clear up on their own.
    ///
    /// Invalid selectors and a closed session will fail the same way on every
    /// attempt.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            PageError::InvalidSelector(_) | PageError::SessionClosed(_)
        )
    }
}

/// Operations required from the browser-automation collaborator.
pub trait Page {
    fn navigate(&self, url: &str) -> Result<(), PageError>;

    /// Number of elements currently matching the locator
    fn count(&self, locator: &Locator) -> Result<usize, PageError>;

    fn is_visible(&self, locator: &Locator, index: usize) -> Result<bool, PageError>;

    fn scroll_into_view(&self, locator: &Locator, index: usize) -> Result<(), PageError>;

    fn click(&self, locator: &Locator, index: usize) -> Result<(), PageError>;

    /// Rendered text of the element, untrimmed
    fn text(&self, locator: &Locator, index: usize) -> Result<String, PageError>;

    fn attribute(
        &self,
        locator: &Locator,
        index: usize,
        name: &str,
    ) -> Result<Option<String>, PageError>;

    /// Detach every element matching the locator, returning how many there were
    fn remove_all(&self, locator: &Locator) -> Result<usize, PageError>;

    /// Serialized HTML of the current document
    fn content(&self) -> Result<String, PageError>;
}

/// Poll `predicate` until it holds or `timeout` elapses.
///
/// Transient errors raised by the predicate count as "not yet"; structural
/// errors end the wait immediately.
pub fn wait_until<P, F>(
    page: &P,
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut predicate: F,
) -> Result<(), PageError>
where
    P: Page + ?Sized,
    F: FnMut(&P) -> Result<bool, PageError>,
{
    let start = Instant::now();

    loop {
        match predicate(page) {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) if e.is_transient() => {
                log::trace!("Still waiting for {}: {}", what, e);
            }
            Err(e) => return Err(e),
        }

        if start.elapsed() >= timeout {
            return Err(PageError::Timeout(what.to_string()));
        }

        if !poll.is_zero() {
            std::thread::sleep(poll);
        }
    }
}

/// Wait until at least one element matches the locator
pub fn wait_for<P: Page + ?Sized>(
    page: &P,
    locator: &Locator,
    timeout: Duration,
    poll: Duration,
) -> Result<(), PageError> {
    wait_until(page, &locator.to_string(), timeout, poll, |p| {
        Ok(p.count(locator)? > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingPage {
        appears_after: usize,
        calls: Cell<usize>,
        fail_with: Option<PageError>,
    }

    impl Page for CountingPage {
        fn navigate(&self, _url: &str) -> Result<(), PageError> {
            Ok(())
        }
        fn count(&self, _locator: &Locator) -> Result<usize, PageError> {
            if let Some(e) = &self.fail_with {
                return Err(e.clone());
            }
            let n = self.calls.get() + 1;
            self.calls.set(n);
            Ok(if n > self.appears_after { 1 } else { 0 })
        }
        fn is_visible(&self, _: &Locator, _: usize) -> Result<bool, PageError> {
            Ok(true)
        }
        fn scroll_into_view(&self, _: &Locator, _: usize) -> Result<(), PageError> {
            Ok(())
        }
        fn click(&self, _: &Locator, _: usize) -> Result<(), PageError> {
            Ok(())
        }
        fn text(&self, _: &Locator, _: usize) -> Result<String, PageError> {
            Ok(String::new())
        }
        fn attribute(&self, _: &Locator, _: usize, _: &str) -> Result<Option<String>, PageError> {
            Ok(None)
        }
        fn remove_all(&self, _: &Locator) -> Result<usize, PageError> {
            Ok(0)
        }
        fn content(&self) -> Result<String, PageError> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_wait_for_eventually_succeeds() {
        let page = CountingPage {
            appears_after: 3,
            calls: Cell::new(0),
            fail_with: None,
        };
        let result = wait_for(&page, &Locator::css("#x"), Duration::from_secs(1), Duration::ZERO);
        assert!(result.is_ok());
        assert_eq!(page.calls.get(), 4);
    }

    #[test]
    fn test_wait_for_times_out() {
        let page = CountingPage {
            appears_after: usize::MAX,
            calls: Cell::new(0),
            fail_with: None,
        };
        let result = wait_for(
            &page,
            &Locator::css("#never"),
            Duration::from_millis(20),
            Duration::from_millis(1),
        );
        assert_eq!(result, Err(PageError::Timeout("#never".to_string())));
    }

    #[test]
    fn test_structural_error_ends_wait() {
        let page = CountingPage {
            appears_after: 0,
            calls: Cell::new(0),
            fail_with: Some(PageError::InvalidSelector("div[".to_string())),
        };
        let result = wait_for(&page, &Locator::css("div["), Duration::from_secs(5), Duration::ZERO);
        assert!(matches!(result, Err(PageError::InvalidSelector(_))));
    }

    #[test]
    fn test_locator_display() {
        let locator = Locator::within("ul.ari-hierarchyLvl", 1, "li.ari-hlvlItem");
        assert_eq!(locator.to_string(), "ul.ari-hierarchyLvl[1] li.ari-hlvlItem");
    }
}
