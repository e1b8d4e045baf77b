//! E2E Test: PWA Multi-Instance
//!
//! Several open tabs fetch through the same worker at once:
//! 1. Distinct resources all end up cached
//! 2. Racing writes to one resource leave a single entry
//! 3. Every tab gets its own readable response

use storefront_sw::service_worker::{Dispatched, FetchSource, Request};

use crate::fixtures::{self, url};
use crate::Storefront;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_tabs_cache_distinct_pages() {
    let mut page = Storefront::new();
    let sw = page.deploy("v1.0.0").await.unwrap();
    for id in 1..=4 {
        page.network()
            .route(&url(&format!("/products/{id}")), 200, &fixtures::product_page(id));
    }

    let (mut a, mut b, mut c, mut d) = tokio::join!(
        page.navigate(&sw, "/products/1"),
        page.navigate(&sw, "/products/2"),
        page.navigate(&sw, "/products/3"),
        page.navigate(&sw, "/products/4"),
    );
    assert_eq!(a.text(), Some(fixtures::product_page(1)));
    assert_eq!(b.text(), Some(fixtures::product_page(2)));
    assert_eq!(c.text(), Some(fixtures::product_page(3)));
    assert_eq!(d.text(), Some(fixtures::product_page(4)));

    let cache = page.store().snapshot("gee-ess-opticals-v1.0.0").unwrap();
    assert_eq!(cache.len(), 7 + 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_writes_keep_one_entry() {
    let mut page = Storefront::new();
    let sw = page.deploy("v1.0.0").await.unwrap();
    page.network().route(&url("/cart"), 200, "<main>cart</main>");

    let (mut a, mut b, mut c) = tokio::join!(
        page.navigate(&sw, "/cart"),
        page.navigate(&sw, "/cart"),
        page.navigate(&sw, "/cart"),
    );
    for fetch in [&mut a, &mut b, &mut c] {
        assert_eq!(fetch.text().as_deref(), Some("<main>cart</main>"));
    }

    let cache = page.store().snapshot("gee-ess-opticals-v1.0.0").unwrap();
    let cart = url("/cart");
    assert_eq!(cache.urls().iter().filter(|u| **u == cart).count(), 1);

    let fetch = page.fetch(&sw, Request::navigate(cart)).await;
    assert!(matches!(fetch.dispatched, Dispatched::Responded(FetchSource::Cache)));
}

#[tokio::test]
async fn test_each_tab_reads_its_own_copy() {
    let mut page = Storefront::new();
    let sw = page.deploy("v1.0.0").await.unwrap();

    let mut first = page.navigate(&sw, "/").await;
    let mut second = page.navigate(&sw, "/").await;
    assert_eq!(first.text(), second.text());
    // Reading a body twice is not possible
    assert!(first.text().is_none());
}
