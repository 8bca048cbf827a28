//! In-memory catalogs for tests, built with the `fixtures` feature.
//!
//! [`FixtureTree`] describes a catalog. [`FixtureCatalog`] serves it through
//! [`CatalogUi`] directly, [`LynxDomFixture`] renders it as the Lynx DOM behind
//! the [`Page`] contract, and [`FixtureLeafSource`] serves part lists by locator.

use crate::catalog::{selectors, CatalogUi, SelectOutcome};
use crate::error::{NavigationError, ResourceUnavailableError};
use crate::extraction::LeafSource;
use crate::models::{CatalogIndexRow, LeafItem, SelectorNode};
use crate::page::{Locator, Page, PageError};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct FixtureNode {
    pub label: String,
    pub children: Vec<FixtureNode>,
    pub items: Vec<LeafItem>,
}

impl FixtureNode {
    pub fn branch(label: &str, children: Vec<FixtureNode>) -> Self {
        Self {
            label: label.to_string(),
            children,
            items: Vec::new(),
        }
    }

    /// Terminal node whose render lists the given diagrams
    pub fn leaves(label: &str, diagrams: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            children: Vec::new(),
            items: diagrams
                .iter()
                .map(|d| LeafItem {
                    label: d.to_string(),
                    locator: String::new(),
                })
                .collect(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    fn assign_locators(&mut self, prefix: &str) {
        let here = format!("{}/{}", prefix, slug(&self.label));
        for item in &mut self.items {
            item.locator = format!("{}/{}", here, slug(&item.label));
        }
        for child in &mut self.children {
            child.assign_locators(&here);
        }
    }

    fn collect(&self, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, LeafItem)>) {
        path.push(self.label.clone());
        for item in &self.items {
            out.push((path.clone(), item.clone()));
        }
        for child in &self.children {
            child.collect(path, out);
        }
        path.pop();
    }
}

fn slug(label: &str) -> String {
    label.replace(' ', "_")
}

/// Catalog tree below the brand root; the roots are the year level
#[derive(Debug, Clone)]
pub struct FixtureTree {
    pub roots: Vec<FixtureNode>,
}

impl FixtureTree {
    pub fn new(mut roots: Vec<FixtureNode>) -> Self {
        for root in &mut roots {
            root.assign_locators("LNX");
        }
        Self { roots }
    }

    pub fn node_at(&self, indices: &[usize]) -> Option<&FixtureNode> {
        let (first, rest) = indices.split_first()?;
        let mut node = self.roots.get(*first)?;
        for i in rest {
            node = node.children.get(*i)?;
        }
        Some(node)
    }

    /// Children rendered below the given selection; the roots for an empty one
    pub fn children_at(&self, indices: &[usize]) -> &[FixtureNode] {
        if indices.is_empty() {
            return &self.roots;
        }
        self.node_at(indices)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Every diagram with its label path, in pre-order
    pub fn leaves_preorder(&self) -> Vec<(Vec<String>, LeafItem)> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        for root in &self.roots {
            root.collect(&mut path, &mut out);
        }
        out
    }

    /// Number of diagrams whose label path starts with `prefix`
    pub fn leaf_count_with_prefix(&self, prefix: &[&str]) -> usize {
        self.leaves_preorder()
            .iter()
            .filter(|(path, _)| {
                path.len() >= prefix.len() && path.iter().zip(prefix).all(|(a, b)| a == b)
            })
            .count()
    }

    fn labels(&self, indices: &[usize]) -> Vec<String> {
        (1..=indices.len())
            .filter_map(|n| self.node_at(&indices[..n]).map(|node| node.label.clone()))
            .collect()
    }
}

/// [`CatalogUi`] over a fixture tree, with failure injection
pub struct FixtureCatalog {
    tree: FixtureTree,
    brand_key: String,
    activated: bool,
    selected: Vec<usize>,
    failing_selects: HashSet<Vec<String>>,
    failing_harvests: HashSet<Vec<String>>,
    half_selects: HashSet<Vec<String>>,
    failing_back_depth: Option<usize>,
    /// Label path of every successful selection, in order
    pub visits: Vec<Vec<String>>,
}

impl FixtureCatalog {
    pub fn new(tree: FixtureTree, brand_key: &str) -> Self {
        Self {
            tree,
            brand_key: brand_key.to_string(),
            activated: false,
            selected: Vec::new(),
            failing_selects: HashSet::new(),
            failing_harvests: HashSet::new(),
            half_selects: HashSet::new(),
            failing_back_depth: None,
            visits: Vec::new(),
        }
    }

    /// Selecting the node at this label path fails without moving
    pub fn fail_select(mut self, path: &[&str]) -> Self {
        self.failing_selects.insert(to_owned(path));
        self
    }

    /// Selecting the node at this label path moves the UI but then reports failure
    pub fn fail_after_select(mut self, path: &[&str]) -> Self {
        self.half_selects.insert(to_owned(path));
        self
    }

    pub fn fail_harvest(mut self, path: &[&str]) -> Self {
        self.failing_harvests.insert(to_owned(path));
        self
    }

    /// Breadcrumb for this depth is never available
    pub fn fail_back_to(mut self, depth: usize) -> Self {
        self.failing_back_depth = Some(depth);
        self
    }

    fn current_labels(&self) -> Vec<String> {
        self.tree.labels(&self.selected)
    }

    fn opaque_id(&self, parent: &[usize], label: &str) -> String {
        let mut labels = self.tree.labels(parent);
        labels.push(label.to_string());
        format!("fx:{}", labels.join("/"))
    }

    fn nodes_at(&self, parent: &[usize]) -> Vec<SelectorNode> {
        self.tree
            .children_at(parent)
            .iter()
            .map(|n| SelectorNode::new(n.label.clone(), parent.len(), self.opaque_id(parent, &n.label)))
            .collect()
    }

    fn at_leaf(&self) -> bool {
        !self.selected.is_empty()
            && self
                .tree
                .node_at(&self.selected)
                .map(FixtureNode::is_terminal)
                .unwrap_or(false)
    }
}

fn to_owned(path: &[&str]) -> Vec<String> {
    path.iter().map(|s| s.to_string()).collect()
}

fn not_rendered(what: String) -> NavigationError {
    NavigationError::Wait {
        source: PageError::Timeout(what.clone()),
        what,
    }
}

impl CatalogUi for FixtureCatalog {
    fn activate_root(&mut self, brand_key: &str) -> Result<(), NavigationError> {
        if brand_key != self.brand_key {
            return Err(not_rendered(format!("brand {}", brand_key)));
        }
        self.activated = true;
        self.selected.clear();
        Ok(())
    }

    fn list_level(&mut self, level_index: usize) -> Result<Vec<SelectorNode>, NavigationError> {
        if !self.activated {
            return Err(NavigationError::NotActivated);
        }
        let rendered = level_index < self.selected.len()
            || (level_index == self.selected.len() && !self.at_leaf());
        if !rendered {
            return Err(not_rendered(format!("level {}", level_index)));
        }
        Ok(self.nodes_at(&self.selected[..level_index]))
    }

    fn select(&mut self, node: &SelectorNode) -> Result<SelectOutcome, NavigationError> {
        let level = node.level_index;
        let nodes = self.list_level(level)?;
        let index = nodes
            .iter()
            .position(|n| n.opaque_id == node.opaque_id)
            .ok_or_else(|| NavigationError::NodeVanished {
                label: node.label.clone(),
                level,
            })?;

        let mut path = self.tree.labels(&self.selected[..level]);
        path.push(node.label.clone());
        if self.failing_selects.contains(&path) {
            return Err(not_rendered(format!("render after selecting {:?}", node.label)));
        }

        self.selected.truncate(level);
        self.selected.push(index);

        if self.half_selects.contains(&path) {
            return Err(not_rendered(format!("render after selecting {:?}", node.label)));
        }
        self.visits.push(path);

        if self.at_leaf() {
            Ok(SelectOutcome::LeafReached)
        } else {
            Ok(SelectOutcome::MoreLevels(self.nodes_at(&self.selected)))
        }
    }

    fn current_depth(&mut self) -> Result<usize, NavigationError> {
        Ok(self.selected.len())
    }

    fn navigate_back(&mut self, to_depth: usize) -> Result<(), NavigationError> {
        let available = if self.activated { self.selected.len() + 1 } else { 0 };
        if self.failing_back_depth == Some(to_depth) || to_depth >= available {
            return Err(NavigationError::BreadcrumbUnavailable {
                depth: to_depth,
                available,
            });
        }
        self.selected.truncate(to_depth);
        Ok(())
    }

    fn harvest_leaf_items(&mut self) -> Result<Vec<LeafItem>, NavigationError> {
        if !self.at_leaf() || self.failing_harvests.contains(&self.current_labels()) {
            return Err(not_rendered(selectors::LEAF_ITEM.to_string()));
        }
        Ok(self
            .tree
            .node_at(&self.selected)
            .map(|n| n.items.clone())
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
struct DomState {
    brand_active: bool,
    selected: Vec<usize>,
    years_expanded: bool,
    leaf_expanded: bool,
    intercepts: u32,
    url: Option<String>,
    part_list_removed: bool,
}

#[derive(Debug, Clone, Copy)]
enum Element {
    BrandLogo,
    ShowMore,
    Year(usize),
    Level { ul: usize, index: usize },
    Leaf(usize),
    Crumb(usize),
    Hierarchy(usize),
    PartList,
}

/// The Lynx catalog DOM rendered from a fixture tree
pub struct LynxDomFixture {
    tree: FixtureTree,
    brand_key: String,
    base_url: String,
    page_size: usize,
    broken_breadcrumbs: bool,
    part_lists: HashMap<String, String>,
    state: RefCell<DomState>,
}

impl LynxDomFixture {
    pub fn new(tree: FixtureTree, brand_key: &str) -> Self {
        Self {
            tree,
            brand_key: brand_key.to_string(),
            base_url: "https://epc.example.test/#".to_string(),
            page_size: usize::MAX,
            broken_breadcrumbs: false,
            part_lists: HashMap::new(),
            state: RefCell::new(DomState::default()),
        }
    }

    /// Items shown before "show more" is clicked
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_part_list(mut self, locator: &str, html: String) -> Self {
        self.part_lists.insert(locator.to_string(), html);
        self
    }

    /// Breadcrumb clicks are swallowed
    pub fn with_broken_breadcrumbs(mut self) -> Self {
        self.broken_breadcrumbs = true;
        self
    }

    /// The next `n` clicks land on an overlay
    pub fn intercept_next_clicks(&self, n: u32) {
        self.state.borrow_mut().intercepts = n;
    }

    fn on_year_page(&self, state: &DomState) -> bool {
        state.brand_active && state.selected.is_empty() && state.url.is_none()
    }

    fn leaf_node(&self, state: &DomState) -> Option<&FixtureNode> {
        if state.selected.is_empty() || state.url.is_some() {
            return None;
        }
        self.tree
            .node_at(&state.selected)
            .filter(|n| n.is_terminal())
    }

    fn shown(&self, total: usize, expanded: bool) -> usize {
        if expanded {
            total
        } else {
            total.min(self.page_size)
        }
    }

    fn ul_count(&self, state: &DomState) -> usize {
        if state.url.is_some() || state.selected.is_empty() {
            return 0;
        }
        match self.leaf_node(state) {
            Some(_) => state.selected.len() - 1,
            None => state.selected.len(),
        }
    }

    fn part_list_locator(&self, state: &DomState) -> Option<String> {
        if state.part_list_removed {
            return None;
        }
        let url = state.url.as_deref()?;
        let locator = url.strip_prefix(&self.base_url)?;
        self.part_lists
            .contains_key(locator)
            .then(|| locator.to_string())
    }

    fn elements(&self, locator: &Locator) -> Result<Vec<Element>, PageError> {
        let state = self.state.borrow();

        if let Some((scope, nth)) = &locator.scope {
            if scope != selectors::HIERARCHY_LEVEL || locator.selector != selectors::HIERARCHY_ITEM {
                return Ok(Vec::new());
            }
            if *nth >= self.ul_count(&state) {
                return Ok(Vec::new());
            }
            let children = self.tree.children_at(&state.selected[..=*nth]);
            return Ok((0..children.len())
                .map(|index| Element::Level { ul: *nth, index })
                .collect());
        }

        let selector = locator.selector.as_str();
        let out = if selector == selectors::brand_logo(&self.brand_key) {
            if state.brand_active { vec![] } else { vec![Element::BrandLogo] }
        } else if selector == selectors::SHOW_MORE {
            let hidden = if self.on_year_page(&state) {
                !state.years_expanded && self.tree.roots.len() > self.page_size
            } else if let Some(node) = self.leaf_node(&state) {
                !state.leaf_expanded && node.items.len() > self.page_size
            } else {
                false
            };
            if hidden { vec![Element::ShowMore] } else { vec![] }
        } else if selector == selectors::YEAR_LABEL {
            if self.on_year_page(&state) {
                let n = self.shown(self.tree.roots.len(), state.years_expanded);
                (0..n).map(Element::Year).collect()
            } else {
                vec![]
            }
        } else if selector == selectors::LEAF_ITEM {
            match self.leaf_node(&state) {
                Some(node) => {
                    let n = self.shown(node.items.len(), state.leaf_expanded);
                    (0..n).map(Element::Leaf).collect()
                }
                None => vec![],
            }
        } else if selector == selectors::HIERARCHY_LEVEL {
            (0..self.ul_count(&state)).map(Element::Hierarchy).collect()
        } else if selector == selectors::BREADCRUMB {
            if state.brand_active && state.url.is_none() {
                (0..=state.selected.len()).map(Element::Crumb).collect()
            } else {
                vec![]
            }
        } else if selector == selectors::PART_LIST {
            if self.part_list_locator(&state).is_some() { vec![Element::PartList] } else { vec![] }
        } else if selector.matches('[').count() != selector.matches(']').count() {
            return Err(PageError::InvalidSelector(selector.to_string()));
        } else {
            vec![]
        };
        Ok(out)
    }

    fn element(&self, locator: &Locator, index: usize) -> Result<Element, PageError> {
        self.elements(locator)?
            .get(index)
            .copied()
            .ok_or_else(|| PageError::NotFound(format!("{} #{}", locator, index)))
    }

    fn label_of(&self, element: Element) -> String {
        let state = self.state.borrow();
        match element {
            Element::Year(i) => self
                .tree
                .roots
                .get(i)
                .map(|n| n.label.clone())
                .unwrap_or_default(),
            Element::Level { ul, index } => self
                .tree
                .children_at(&state.selected[..=ul])
                .get(index)
                .map(|n| n.label.clone())
                .unwrap_or_default(),
            Element::Crumb(0) => "Lynx".to_string(),
            Element::Crumb(i) => self
                .tree
                .labels(&state.selected)
                .get(i - 1)
                .cloned()
                .unwrap_or_default(),
            Element::ShowMore => "Show more".to_string(),
            _ => String::new(),
        }
    }
}

impl Page for LynxDomFixture {
    fn navigate(&self, url: &str) -> Result<(), PageError> {
        let mut state = self.state.borrow_mut();
        state.url = Some(url.to_string());
        state.selected.clear();
        state.part_list_removed = false;
        Ok(())
    }

    fn count(&self, locator: &Locator) -> Result<usize, PageError> {
        Ok(self.elements(locator)?.len())
    }

    fn is_visible(&self, locator: &Locator, index: usize) -> Result<bool, PageError> {
        self.element(locator, index).map(|_| true)
    }

    fn scroll_into_view(&self, locator: &Locator, index: usize) -> Result<(), PageError> {
        self.element(locator, index).map(|_| ())
    }

    fn click(&self, locator: &Locator, index: usize) -> Result<(), PageError> {
        let element = self.element(locator, index)?;
        let mut state = self.state.borrow_mut();

        if state.intercepts > 0 {
            state.intercepts -= 1;
            return Err(PageError::Intercepted {
                target: locator.to_string(),
                by: "div.ari-overlay".to_string(),
            });
        }

        match element {
            Element::BrandLogo => state.brand_active = true,
            Element::ShowMore => {
                if state.selected.is_empty() {
                    state.years_expanded = true;
                } else {
                    state.leaf_expanded = true;
                }
            }
            Element::Year(i) => {
                state.selected = vec![i];
                state.leaf_expanded = false;
            }
            Element::Level { ul, index } => {
                state.selected.truncate(ul + 1);
                state.selected.push(index);
                state.leaf_expanded = false;
            }
            Element::Crumb(i) if !self.broken_breadcrumbs => {
                state.selected.truncate(i);
                state.leaf_expanded = false;
                if i == 0 {
                    state.years_expanded = false;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&self, locator: &Locator, index: usize) -> Result<String, PageError> {
        let element = self.element(locator, index)?;
        Ok(format!(" {}\n", self.label_of(element)))
    }

    fn attribute(
        &self,
        locator: &Locator,
        index: usize,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        let element = self.element(locator, index)?;
        let value = match (element, name) {
            (Element::Level { ul, .. }, "arib") => Some(format!("lvl{}", ul)),
            (Element::Level { .. }, "aria") => Some(format!("ari-{}", slug(&self.label_of(element)))),
            (Element::Crumb(0), "aria") => Some("ari-backToBrandsPage".to_string()),
            (Element::Leaf(i), "title") | (Element::Leaf(i), "slug") => {
                let state = self.state.borrow();
                self.leaf_node(&state).and_then(|n| n.items.get(i)).map(|item| {
                    if name == "title" {
                        item.label.clone()
                    } else {
                        item.locator.clone()
                    }
                })
            }
            _ => None,
        };
        Ok(value)
    }

    fn remove_all(&self, locator: &Locator) -> Result<usize, PageError> {
        let removed = self.elements(locator)?.len();
        if removed > 0 && locator.selector == selectors::PART_LIST {
            self.state.borrow_mut().part_list_removed = true;
        }
        Ok(removed)
    }

    fn content(&self) -> Result<String, PageError> {
        let state = self.state.borrow();
        let body = self
            .part_list_locator(&state)
            .and_then(|locator| self.part_lists.get(&locator))
            .cloned()
            .unwrap_or_default();
        Ok(format!("<html><body>{}</body></html>", body))
    }
}

/// Part lists served by locator; unknown locators are unavailable
#[derive(Debug, Default)]
pub struct FixtureLeafSource {
    part_lists: HashMap<String, String>,
    /// Locators requested, in order
    pub requests: Vec<String>,
}

impl FixtureLeafSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_part_list(mut self, locator: &str, html: String) -> Self {
        self.part_lists.insert(locator.to_string(), html);
        self
    }
}

impl LeafSource for FixtureLeafSource {
    fn load_part_list(&mut self, row: &CatalogIndexRow) -> Result<String, ResourceUnavailableError> {
        self.requests.push(row.diagram_locator.clone());
        self.part_lists
            .get(&row.diagram_locator)
            .cloned()
            .ok_or_else(|| ResourceUnavailableError {
                locator: row.diagram_locator.clone(),
                reason: "part list never rendered".to_string(),
            })
    }
}

/// Rendered `#ariPartList` table; each row is (ref, description, identifiers, price)
pub fn part_list_html(rows: &[(&str, &str, &[&str], &str)]) -> String {
    let mut html = String::from(r#"<div id="ariPartList"><table><tbody>"#);
    for (reference, description, identifiers, price) in rows {
        let spans: String = identifiers
            .iter()
            .map(|id| format!(r#"<span name="{}">{}</span>"#, id, id))
            .collect();
        html.push_str(&format!(
            r#"<tr class="ariPartInfo"><td class="ariPLTag">{}</td><td class="ariPLDesc">{}</td><td class="ariPLSku" adjustedprice="{}">{}</td></tr>"#,
            reference, description, price, spans
        ));
    }
    html.push_str("</tbody></table></div>");
    html
}
