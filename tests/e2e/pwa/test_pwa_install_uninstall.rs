//! E2E Test: PWA Install / Uninstall
//!
//! 1. Install pre-caches the whole app shell with fresh network reads
//! 2. A broken deploy installs without a cache and the page keeps working
//! 3. Uninstall drops every cache

use storefront_sw::service_worker::{
    ConfigError, Dispatched, FetchSource, RequestCache, WorkerConfig, WorkerState, OFFLINE_STATUS,
};

use crate::fixtures::{self, url};
use crate::Storefront;

#[tokio::test]
async fn test_install_precaches_app_shell() {
    let mut page = Storefront::new();
    let sw = page.deploy("v1.0.0").await.unwrap();

    let shell = &sw.manager().config().static_assets;
    let cache = page.store().snapshot("gee-ess-opticals-v1.0.0").unwrap();
    assert_eq!(cache.len(), shell.len());
    for path in shell {
        assert!(cache.urls().contains(&url(path)), "{path}");
    }

    // Install bypassed HTTP caches for every asset
    let install_requests = page.network().requests();
    assert_eq!(install_requests.len(), shell.len());
    assert!(install_requests
        .iter()
        .all(|r| r.cache == RequestCache::Reload));
}

#[tokio::test]
async fn test_failed_precache_is_not_fatal() {
    let mut page = Storefront::new();
    page.network().fail(&url("/static/js/bundle.js"));
    let sw = page.deploy("v1.0.0").await.unwrap();

    // Activated anyway, just with an empty cache
    assert_eq!(sw.state(), WorkerState::Active);
    let cache = page.store().snapshot("gee-ess-opticals-v1.0.0").unwrap();
    assert!(cache.is_empty());

    // Online the storefront works and fills the cache as it goes
    let fetch = page.navigate(&sw, "/").await;
    assert!(matches!(fetch.dispatched, Dispatched::Responded(FetchSource::Network)));

    // Offline there is no offline page to fall back on
    page.network().set_offline(true);
    let fetch = page.navigate(&sw, "/orders").await;
    assert!(matches!(
        fetch.dispatched,
        Dispatched::Responded(FetchSource::Synthesized)
    ));
    assert_eq!(fetch.status(), Some(OFFLINE_STATUS));
}

#[tokio::test]
async fn test_next_deploy_recovers_from_failed_install() {
    let mut page = Storefront::new();
    page.network().fail(&url("/manifest.json"));
    page.deploy("v1.0.0").await.unwrap();

    page.network().route(&url("/manifest.json"), 200, "{}");
    let sw = page.deploy("v1.0.1").await.unwrap();
    page.network().set_offline(true);

    let mut fetch = page.navigate(&sw, "/cart").await;
    assert!(matches!(
        fetch.dispatched,
        Dispatched::Responded(FetchSource::OfflinePage)
    ));
    assert!(fetch.text().is_some());
}

#[tokio::test]
async fn test_invalid_config_rejected_before_install() {
    let mut page = Storefront::new();
    let config = WorkerConfig {
        offline_page: "/offline-v2.html".to_string(),
        ..fixtures::config("v1.0.0")
    };
    assert!(matches!(
        page.deploy_with(config).await,
        Err(ConfigError::OfflinePageNotPrecached(_))
    ));
    assert_eq!(page.network().calls(), 0);
    assert!(page.registration().installing().is_none());
}

#[tokio::test]
async fn test_uninstall_removes_caches() {
    let mut page = Storefront::new();
    let sw = page.deploy("v1.0.0").await.unwrap();
    page.network().route(&url("/products/1"), 200, &fixtures::product_page(1));
    page.navigate(&sw, "/products/1").await;

    let result = page.unregister(&sw).await;
    assert!(matches!(result, Dispatched::Command(_)));
    assert!(page.cache_names().await.is_empty());
    assert!(page.registration().active().is_none());
}
