// Randomized select/back sequences: the navigation path must always agree
// with the depth the UI reports.
//
// Run with: cargo test --test drift_tests

use lynx_catalog_scraper::catalog::{CatalogTimings, CatalogUi, LynxCatalog, SelectOutcome};
use lynx_catalog_scraper::fixture::{FixtureCatalog, FixtureNode, FixtureTree, LynxDomFixture};
use lynx_catalog_scraper::models::NavigationPath;
use lynx_catalog_scraper::retry::RetryPolicy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BRAND_KEY: &str = "LNX_EN_US";

fn tree() -> FixtureTree {
    let models = |year: &str| {
        vec![
            FixtureNode::branch(
                "Snowmobile",
                vec![
                    FixtureNode::branch(
                        "Adventure",
                        vec![
                            FixtureNode::leaves("600", &["Engine", "Hood"]),
                            FixtureNode::leaves("800", &["Engine"]),
                        ],
                    ),
                    FixtureNode::leaves(&format!("Rave {}", year), &["Exhaust", "Seat", "Skis"]),
                ],
            ),
            FixtureNode::leaves("Accessories", &["Cover"]),
        ]
    };
    FixtureTree::new(
        ["2003", "2004", "2005", "2006", "2007"]
            .iter()
            .map(|&year| FixtureNode::branch(year, models(year)))
            .collect(),
    )
}

/// Apply `steps` random selections and breadcrumb jumps, checking the depth after each
fn random_walk<C: CatalogUi>(ui: &mut C, seed: u64, steps: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut path = NavigationPath::new("Lynx");
    let mut at_leaf = false;

    ui.activate_root(BRAND_KEY).unwrap();

    for step in 0..steps {
        let go_back = !path.is_empty() && (at_leaf || rng.gen_bool(0.3));

        if go_back {
            let depth = rng.gen_range(0..path.len());
            ui.navigate_back(depth).unwrap();
            path.truncate(depth);
            at_leaf = false;
        } else {
            let nodes = ui.list_level(path.len()).unwrap();
            let node = &nodes[rng.gen_range(0..nodes.len())];
            let outcome = ui.select(node).unwrap();
            path.push(node.label.clone());
            at_leaf = matches!(outcome, SelectOutcome::LeafReached);
        }

        assert_eq!(
            ui.current_depth().unwrap(),
            path.len(),
            "seed {} step {}: path {}",
            seed,
            step,
            path
        );
    }
}

#[test]
fn test_fixture_catalog_never_drifts() {
    for seed in 0..20 {
        let mut ui = FixtureCatalog::new(tree(), BRAND_KEY);
        random_walk(&mut ui, seed, 60);
    }
}

#[test]
fn test_lynx_dom_never_drifts() {
    for seed in 0..10 {
        let page = LynxDomFixture::new(tree(), BRAND_KEY).with_page_size(2);
        let mut catalog = LynxCatalog::new(page, RetryPolicy::immediate(3), CatalogTimings::immediate());
        random_walk(&mut catalog, seed, 40);
    }
}
