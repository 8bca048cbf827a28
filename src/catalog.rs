//! Hierarchical selector tree of the catalog UI.
//!
//! [`CatalogUi`] is the synchronous view of the rendered catalog the crawler
//! works against. [`LynxCatalog`] implements it for the Lynx parts catalog on
//! top of any [`Page`].

use crate::error::NavigationError;
use crate::models::{LeafItem, SelectorNode};
use crate::page::{wait_for, wait_until, Locator, Page, PageError};
use crate::retry::{safe_click, RetryPolicy};
use std::time::Duration;

/// Site selectors of the Lynx catalog
pub mod selectors {
    pub const BRAND_LOGO: &str = "div.brandLogoBox";
    pub const SHOW_MORE: &str = "#ari-item-show-more";
    pub const PRODUCT_LINE: &str = "div.ari-product-line";
    pub const YEAR_LABEL: &str = "div.ari-product-line div.item p";
    pub const LEAF_ITEM: &str = "div.ari-product-line div.item[slug]";
    pub const HIERARCHY_LEVEL: &str = "ul.ari-hierarchyLvl";
    pub const HIERARCHY_ITEM: &str = "li.ari-hlvlItem";
    pub const BREADCRUMB: &str = "li.ari-breadCrumbItem";
    pub const PART_LIST: &str = "#ariPartList";

    pub fn brand_logo(brand_key: &str) -> String {
        format!("{}[name='{}']", BRAND_LOGO, brand_key)
    }
}

/// What a selection rendered next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    MoreLevels(Vec<SelectorNode>),
    LeafReached,
}

/// Synchronous interface over the live catalog UI.
///
/// Depth counts the selections made below the brand root; it is whatever the
/// UI's breadcrumb reports.
pub trait CatalogUi {
    fn activate_root(&mut self, brand_key: &str) -> Result<(), NavigationError>;

    /// Every item rendered at `level_index`, with pagination exhausted
    fn list_level(&mut self, level_index: usize) -> Result<Vec<SelectorNode>, NavigationError>;

    fn select(&mut self, node: &SelectorNode) -> Result<SelectOutcome, NavigationError>;

    fn current_depth(&mut self) -> Result<usize, NavigationError>;

    fn navigate_back(&mut self, to_depth: usize) -> Result<(), NavigationError>;

    /// Every diagram of the current leaf render, with pagination exhausted
    fn harvest_leaf_items(&mut self) -> Result<Vec<LeafItem>, NavigationError>;
}

/// Bounded waits used by [`LynxCatalog`]
#[derive(Debug, Clone)]
pub struct CatalogTimings {
    /// Wait for an element that must appear
    pub wait: Duration,
    /// Wait for the optional "show more" control
    pub show_more_wait: Duration,
    /// Pause after each click while the UI re-renders
    pub settle: Duration,
    pub poll: Duration,
    pub max_pagination_rounds: usize,
}

impl CatalogTimings {
    /// Short waits and no pauses, for in-memory pages
    pub fn immediate() -> Self {
        Self {
            wait: Duration::from_millis(50),
            show_more_wait: Duration::ZERO,
            settle: Duration::ZERO,
            poll: Duration::ZERO,
            max_pagination_rounds: 50,
        }
    }
}

/// Lynx catalog bound to a page
pub struct LynxCatalog<P: Page> {
    page: P,
    retry: RetryPolicy,
    timings: CatalogTimings,
    activated: bool,
}

impl<P: Page> LynxCatalog<P> {
    pub fn new(page: P, retry: RetryPolicy, timings: CatalogTimings) -> Self {
        Self {
            page,
            retry,
            timings,
            activated: false,
        }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    fn level_locator(level_index: usize) -> Locator {
        match level_index {
            0 => Locator::css(selectors::YEAR_LABEL),
            n => Locator::within(selectors::HIERARCHY_LEVEL, n - 1, selectors::HIERARCHY_ITEM),
        }
    }

    fn settle(&self) {
        if !self.timings.settle.is_zero() {
            std::thread::sleep(self.timings.settle);
        }
    }

    fn wait(&self, locator: &Locator) -> Result<(), NavigationError> {
        wait_for(&self.page, locator, self.timings.wait, self.timings.poll).map_err(|source| {
            NavigationError::Wait {
                what: locator.to_string(),
                source,
            }
        })
    }

    fn click(&self, locator: &Locator, index: usize) -> Result<(), NavigationError> {
        safe_click(&self.page, &self.retry, locator, index)?;
        self.settle();
        Ok(())
    }

    /// Click "show more" until it disappears or stops revealing items
    fn exhaust_pagination(&self, items: &Locator) -> Result<(), NavigationError> {
        let show_more = Locator::css(selectors::SHOW_MORE);
        let mut first_probe = true;

        for round in 0..self.timings.max_pagination_rounds {
            let present = if first_probe && !self.timings.show_more_wait.is_zero() {
                wait_for(
                    &self.page,
                    &show_more,
                    self.timings.show_more_wait,
                    self.timings.poll,
                )
                .is_ok()
            } else {
                self.count(&show_more)? > 0
            };
            first_probe = false;

            if !present {
                return Ok(());
            }
            if !self.visible(&show_more, 0)? {
                log::debug!("Show more control present but not visible");
                return Ok(());
            }

            let before = self.count(items)?;
            self.click(&show_more, 0)?;

            let grew = wait_until(
                &self.page,
                "more items after show more",
                self.timings.wait,
                self.timings.poll,
                |p| Ok(p.count(items)? > before || p.count(&show_more)? == 0),
            )
            .is_ok();

            if !grew || self.count(items)? == before {
                log::debug!("Show more revealed no new items after round {}", round + 1);
                return Ok(());
            }
        }

        log::warn!(
            "Stopped paginating {} after {} rounds",
            items,
            self.timings.max_pagination_rounds
        );
        Ok(())
    }

    fn count(&self, locator: &Locator) -> Result<usize, NavigationError> {
        self.read(locator, |p| p.count(locator))
    }

    fn visible(&self, locator: &Locator, index: usize) -> Result<bool, NavigationError> {
        self.read(locator, |p| p.is_visible(locator, index))
    }

    /// Reads retry like clicks, since the element may be mid re-render
    fn read<T>(
        &self,
        locator: &Locator,
        op: impl Fn(&P) -> Result<T, PageError>,
    ) -> Result<T, NavigationError> {
        let what = format!("read {}", locator);
        Ok(crate::retry::retry_interaction(&self.retry, &what, || {
            op(&self.page)
        })?)
    }

    fn read_nodes(&self, level_index: usize) -> Result<Vec<SelectorNode>, NavigationError> {
        let locator = Self::level_locator(level_index);
        let total = self.count(&locator)?;
        let mut nodes = Vec::with_capacity(total);

        for index in 0..total {
            let label = self
                .read(&locator, |p| p.text(&locator, index))?
                .trim()
                .to_string();
            let opaque_id = if level_index == 0 {
                format!("year:{}", label)
            } else {
                let arib = self.read(&locator, |p| p.attribute(&locator, index, "arib"))?;
                let aria = self.read(&locator, |p| p.attribute(&locator, index, "aria"))?;
                match (arib, aria) {
                    (None, None) => format!("label:{}", label),
                    (arib, aria) => format!(
                        "{}|{}",
                        arib.unwrap_or_default(),
                        aria.unwrap_or_default()
                    ),
                }
            };
            nodes.push(SelectorNode::new(label, level_index, opaque_id));
        }

        Ok(nodes)
    }

    /// Index of `node` in the current render of its level
    fn locate(&self, node: &SelectorNode) -> Result<Option<usize>, NavigationError> {
        let nodes = self.read_nodes(node.level_index)?;
        Ok(nodes
            .iter()
            .position(|n| n.opaque_id == node.opaque_id)
            .or_else(|| nodes.iter().position(|n| n.label == node.label)))
    }
}

impl<P: Page> CatalogUi for LynxCatalog<P> {
    fn activate_root(&mut self, brand_key: &str) -> Result<(), NavigationError> {
        let logo = Locator::css(selectors::brand_logo(brand_key));
        self.wait(&logo)?;
        self.click(&logo, 0)?;
        self.activated = true;
        log::info!("Activated brand {}", brand_key);
        Ok(())
    }

    fn list_level(&mut self, level_index: usize) -> Result<Vec<SelectorNode>, NavigationError> {
        if !self.activated {
            return Err(NavigationError::NotActivated);
        }

        let locator = Self::level_locator(level_index);
        if level_index == 0 {
            self.exhaust_pagination(&Locator::css(selectors::YEAR_LABEL))?;
        }
        self.wait(&locator)?;
        self.read_nodes(level_index)
    }

    fn select(&mut self, node: &SelectorNode) -> Result<SelectOutcome, NavigationError> {
        let locator = Self::level_locator(node.level_index);

        let index = match self.locate(node)? {
            Some(index) => index,
            None if node.level_index == 0 => {
                // The year grid collapses again after returning to the brand page
                self.exhaust_pagination(&locator)?;
                self.locate(node)?.ok_or_else(|| NavigationError::NodeVanished {
                    label: node.label.clone(),
                    level: node.level_index,
                })?
            }
            None => {
                return Err(NavigationError::NodeVanished {
                    label: node.label.clone(),
                    level: node.level_index,
                })
            }
        };

        self.click(&locator, index)?;

        let next_level = node.level_index + 1;
        let next = Self::level_locator(next_level);
        let leaf = Locator::css(selectors::LEAF_ITEM);
        let what = format!("render after selecting {:?}", node.label);

        wait_until(&self.page, &what, self.timings.wait, self.timings.poll, |p| {
            Ok(p.count(&leaf)? > 0 || p.count(&next)? > 0)
        })
        .map_err(|source| NavigationError::Wait { what, source })?;

        if self.count(&leaf)? > 0 {
            Ok(SelectOutcome::LeafReached)
        } else {
            Ok(SelectOutcome::MoreLevels(self.read_nodes(next_level)?))
        }
    }

    fn current_depth(&mut self) -> Result<usize, NavigationError> {
        let crumbs = self.count(&Locator::css(selectors::BREADCRUMB))?;
        Ok(crumbs.saturating_sub(1))
    }

    fn navigate_back(&mut self, to_depth: usize) -> Result<(), NavigationError> {
        if self.current_depth()? == to_depth {
            return Ok(());
        }

        let crumbs = Locator::css(selectors::BREADCRUMB);
        let available = self.count(&crumbs)?;
        if available <= to_depth {
            return Err(NavigationError::BreadcrumbUnavailable {
                depth: to_depth,
                available,
            });
        }

        self.click(&crumbs, to_depth)?;

        let what = format!("breadcrumb depth {}", to_depth);
        wait_until(&self.page, &what, self.timings.wait, self.timings.poll, |p| {
            Ok(p.count(&crumbs)?.saturating_sub(1) == to_depth)
        })
        .map_err(|source| NavigationError::Wait { what, source })
    }

    fn harvest_leaf_items(&mut self) -> Result<Vec<LeafItem>, NavigationError> {
        let items = Locator::css(selectors::LEAF_ITEM);
        self.wait(&items)?;
        self.exhaust_pagination(&items)?;

        let total = self.count(&items)?;
        let mut out = Vec::with_capacity(total);
        for index in 0..total {
            let title = self.read(&items, |p| p.attribute(&items, index, "title"))?;
            let slug = self.read(&items, |p| p.attribute(&items, index, "slug"))?;
            match (title, slug) {
                (Some(title), Some(slug)) if !title.trim().is_empty() && !slug.trim().is_empty() => {
                    out.push(LeafItem {
                        label: title.trim().to_string(),
                        locator: slug.trim().to_string(),
                    });
                }
                _ => log::debug!("Skipping leaf item #{} without title or slug", index),
            }
        }

        Ok(out)
    }
}
