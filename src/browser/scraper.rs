//! [`Page`] over a headless Chrome tab.
//!
//! Every call resolves its element again with `querySelectorAll` inside a
//! single script evaluation, so no element handle outlives the call. Scripts
//! reply with a JSON string that is decoded on this side.

use crate::page::{Locator, Page, PageError};
use headless_chrome::Tab;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ScriptReply {
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: String,
}

pub struct BrowserScraper {
    tab: Arc<Tab>,
}

impl BrowserScraper {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    fn run(&self, script: &str) -> Result<serde_json::Value, PageError> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| classify_evaluate_error(&e.to_string()))?;

        let raw = result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| PageError::Script("Script returned no value".to_string()))?;
        let reply: ScriptReply = serde_json::from_str(raw)
            .map_err(|e| PageError::Script(format!("Unreadable script reply: {}", e)))?;

        match reply.error.as_deref() {
            None => Ok(reply.value),
            Some("not_found") => Err(PageError::NotFound(reply.detail)),
            Some("not_interactable") => Err(PageError::NotInteractable(reply.detail)),
            Some("intercepted") => {
                let (target, by) = reply
                    .detail
                    .split_once(" <- ")
                    .map(|(t, b)| (t.to_string(), b.to_string()))
                    .unwrap_or_else(|| (reply.detail.clone(), String::from("unknown")));
                Err(PageError::Intercepted { target, by })
            }
            Some("detached") => Err(PageError::Detached(reply.detail)),
            Some("invalid_selector") => Err(PageError::InvalidSelector(reply.detail)),
            Some(_) => Err(PageError::Script(reply.detail)),
        }
    }

    fn on_element(&self, locator: &Locator, index: usize, body: &str) -> Result<serde_json::Value, PageError> {
        let body = format!(
            r#"const el = all[{index}];
            if (!el) return JSON.stringify({{error: 'not_found', detail: describe() + ' #{index}'}});
            if (!el.isConnected) return JSON.stringify({{error: 'detached', detail: describe()}});
            {body}"#,
            index = index,
            body = body
        );
        self.run(&element_script(locator, &body))
    }
}

/// Wrap `body` in a script where `all` holds the locator's current matches
fn element_script(locator: &Locator, body: &str) -> String {
    let (scope, nth) = match &locator.scope {
        Some((scope, nth)) => (json_string(scope), nth.to_string()),
        None => ("null".to_string(), "0".to_string()),
    };
    format!(
        r#"(() => {{
    const scopeSelector = {scope};
    const selector = {selector};
    const describe = () => (scopeSelector === null ? '' : scopeSelector + '[{nth}] ') + selector;
    try {{
        let root = document;
        if (scopeSelector !== null) {{
            root = document.querySelectorAll(scopeSelector)[{nth}];
            if (!root) return JSON.stringify({{error: 'not_found', detail: describe()}});
        }}
        const all = root.querySelectorAll(selector);
        {body}
    }} catch (e) {{
        if (e && e.name === 'SyntaxError') return JSON.stringify({{error: 'invalid_selector', detail: describe()}});
        return JSON.stringify({{error: 'script', detail: String(e)}});
    }}
}})()"#,
        scope = scope,
        selector = json_string(&locator.selector),
        nth = nth,
        body = body
    )
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn classify_evaluate_error(message: &str) -> PageError {
    let lower = message.to_lowercase();
    if lower.contains("connection") || lower.contains("closed") {
        PageError::SessionClosed(message.to_string())
    } else if lower.contains("context") {
        PageError::Detached(message.to_string())
    } else {
        PageError::Script(message.to_string())
    }
}

const CLICK: &str = r#"
    const rect = el.getBoundingClientRect();
    if (rect.width === 0 || rect.height === 0) {
        return JSON.stringify({error: 'not_interactable', detail: describe()});
    }
    const hit = document.elementFromPoint(rect.left + rect.width / 2, rect.top + rect.height / 2);
    if (hit && hit !== el && !el.contains(hit) && !hit.contains(el)) {
        const name = hit.tagName.toLowerCase() + (hit.id ? '#' + hit.id : '')
            + (typeof hit.className === 'string' && hit.className ? '.' + hit.className.trim().split(/\s+/).join('.') : '');
        return JSON.stringify({error: 'intercepted', detail: describe() + ' <- ' + name});
    }
    el.click();
    return JSON.stringify({value: true});"#;

const VISIBLE: &str = r#"
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    return JSON.stringify({value: rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden' && style.display !== 'none'});"#;

impl Page for BrowserScraper {
    fn navigate(&self, url: &str) -> Result<(), PageError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| PageError::Navigation(format!("Failed to navigate to {}: {}", url, e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| PageError::Navigation(format!("Navigation timeout for {}: {}", url, e)))?;
        Ok(())
    }

    fn count(&self, locator: &Locator) -> Result<usize, PageError> {
        let value = self.run(&element_script(locator, "return JSON.stringify({value: all.length});"));
        match value {
            Ok(value) => Ok(value.as_u64().unwrap_or(0) as usize),
            // No scope element means nothing matches yet
            Err(PageError::NotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn is_visible(&self, locator: &Locator, index: usize) -> Result<bool, PageError> {
        Ok(self.on_element(locator, index, VISIBLE)?.as_bool().unwrap_or(false))
    }

    fn scroll_into_view(&self, locator: &Locator, index: usize) -> Result<(), PageError> {
        self.on_element(
            locator,
            index,
            "el.scrollIntoView({block: 'center', inline: 'center'}); return JSON.stringify({value: true});",
        )?;
        Ok(())
    }

    fn click(&self, locator: &Locator, index: usize) -> Result<(), PageError> {
        self.on_element(locator, index, CLICK)?;
        Ok(())
    }

    fn text(&self, locator: &Locator, index: usize) -> Result<String, PageError> {
        let value = self.on_element(
            locator,
            index,
            "return JSON.stringify({value: el.innerText || el.textContent || ''});",
        )?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn attribute(
        &self,
        locator: &Locator,
        index: usize,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        let body = format!(
            "return JSON.stringify({{value: el.getAttribute({})}});",
            json_string(name)
        );
        let value = self.on_element(locator, index, &body)?;
        Ok(value.as_str().map(str::to_string))
    }

    fn remove_all(&self, locator: &Locator) -> Result<usize, PageError> {
        let value = self.run(&element_script(
            locator,
            "all.forEach(el => el.remove()); return JSON.stringify({value: all.length});",
        ));
        match value {
            Ok(value) => Ok(value.as_u64().unwrap_or(0) as usize),
            Err(PageError::NotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn content(&self) -> Result<String, PageError> {
        self.tab
            .get_content()
            .map_err(|e| classify_evaluate_error(&e.to_string()))
    }
}
