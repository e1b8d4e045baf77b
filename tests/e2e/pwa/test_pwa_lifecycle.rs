//! E2E Test: PWA Lifecycle
//!
//! 1. First deploy: install → activate → page reports "cached for offline use"
//! 2. New deploy: page reports an update, posts SKIP_WAITING, new worker
//!    takes over and evicts the old version's cache
//! 3. Held update: the new worker waits until the page says otherwise

use storefront_sw::service_worker::{
    ControlMessage, Dispatched, FetchSource, RegistrationOptions, Request, WorkerState,
};

use crate::fixtures::{self, url};
use crate::Storefront;

#[tokio::test]
async fn test_first_deploy_activates_and_claims() {
    let mut page = Storefront::new();
    let sw = page.deploy("v1.0.0").await.unwrap();

    assert_eq!(sw.state(), WorkerState::Active);
    assert_eq!(page.updates().successes(), 1);
    assert_eq!(page.updates().updates(), 0);
    assert_eq!(page.host().claims(), 1);
    assert_eq!(
        page.registration().active().map(|w| w.version()),
        Some("v1.0.0")
    );
    assert!(page.registration().waiting().is_none());
    assert_eq!(
        page.cache_names().await,
        vec!["gee-ess-opticals-v1.0.0".to_string()]
    );
}

#[tokio::test]
async fn test_new_version_takes_over() {
    let mut page = Storefront::new();
    let old = page.deploy("v1.0.0").await.unwrap();
    page.network().route(&url("/products"), 200, &fixtures::catalog_page());
    page.navigate(&old, "/products").await;

    let new = page.deploy("v1.1.0").await.unwrap();

    assert_eq!(page.updates().updates(), 1);
    assert_eq!(new.state(), WorkerState::Active);
    assert_eq!(
        page.registration().active().map(|w| w.version()),
        Some("v1.1.0")
    );
    assert_eq!(page.host().claims(), 2);

    // Only the new version's cache is left, runtime entries went with the old one
    assert_eq!(
        page.cache_names().await,
        vec!["gee-ess-opticals-v1.1.0".to_string()]
    );
    let fetch = page.navigate(&new, "/products").await;
    assert!(matches!(fetch.dispatched, Dispatched::Responded(FetchSource::Network)));
    assert_eq!(page.network().calls_to(&url("/products")), 2);
}

#[tokio::test]
async fn test_held_update_waits_for_skip_waiting() {
    let options = RegistrationOptions {
        auto_skip_waiting: false,
        ..Default::default()
    };
    let mut page = Storefront::with_options(options);
    let old = page.deploy("v1.0.0").await.unwrap();

    let config = storefront_sw::WorkerConfig {
        skip_waiting_on_install: false,
        ..fixtures::config("v2.0.0")
    };
    let new = page.deploy_with(config).await.unwrap();

    assert_eq!(new.state(), WorkerState::Waiting);
    assert_eq!(page.updates().updates(), 1);
    assert_eq!(page.registration().waiting().map(|w| w.id()), Some(new.id()));

    // Old worker keeps serving, and the new cache already exists beside it
    let fetch = page.fetch(&old, Request::new(url("/"))).await;
    assert!(matches!(fetch.dispatched, Dispatched::Responded(FetchSource::Cache)));
    assert_eq!(page.cache_names().await.len(), 2);

    // Waiting workers don't intercept
    let fetch = page.fetch(&new, Request::new(url("/"))).await;
    assert!(matches!(fetch.dispatched, Dispatched::Passthrough));

    let result = page.post(&new, ControlMessage::SkipWaiting).await;
    assert!(matches!(result, Dispatched::Command(ControlMessage::SkipWaiting)));
    assert_eq!(new.state(), WorkerState::Activating);

    page.activate(&new).await;
    assert_eq!(new.state(), WorkerState::Active);
    assert_eq!(page.registration().active().map(|w| w.id()), Some(new.id()));
    assert_eq!(
        page.cache_names().await,
        vec!["gee-ess-opticals-v2.0.0".to_string()]
    );
}

#[tokio::test]
async fn test_redeploying_same_version_keeps_cache() {
    let mut page = Storefront::new();
    let first = page.deploy("v1.0.0").await.unwrap();
    page.network().route(&url("/wishlist"), 200, "<ul></ul>");
    page.navigate(&first, "/wishlist").await;

    let second = page.deploy("v1.0.0").await.unwrap();
    let fetch = page.navigate(&second, "/wishlist").await;
    assert!(matches!(fetch.dispatched, Dispatched::Responded(FetchSource::Cache)));
}
