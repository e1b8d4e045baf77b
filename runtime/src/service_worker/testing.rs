//! Test doubles for the host seams: a scripted network, a host that records
//! what the worker asked of it, and a store whose deletions can be made to
//! fail.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use spin::Mutex;

use super::{
    CacheError, CacheStore, Clients, HostError, MemoryCacheStore, Network, NetworkError,
    Notification, Notifier, Request, Response, WorkerConfig,
};

#[derive(Debug, Clone)]
enum Route {
    Respond { status: u16, body: String },
    Fail,
}

/// Network answering from a routing table
#[derive(Debug, Default)]
pub struct MockNetwork {
    routes: Mutex<BTreeMap<String, Route>>,
    offline: AtomicBool,
    requests: Mutex<Vec<Request>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Network serving every static asset of `config`
    pub fn with_app_shell(config: &WorkerConfig) -> Self {
        let network = Self::new();
        for path in &config.static_assets {
            network.route(&config.absolute_url(path), 200, &Self::shell_body(path));
        }
        network
    }

    /// Body served for an app shell path
    pub fn shell_body(path: &str) -> String {
        format!("<!-- app shell: {path} -->")
    }

    /// Answer `url` with a status and body
    pub fn route(&self, url: &str, status: u16, body: &str) {
        self.routes.lock().insert(
            url.to_string(),
            Route::Respond {
                status,
                body: body.to_string(),
            },
        );
    }

    /// Make requests for `url` time out
    pub fn fail(&self, url: &str) {
        self.routes.lock().insert(url.to_string(), Route::Fail);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every request seen, in order
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url == url).count()
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: Request) -> Result<Response, NetworkError> {
        self.requests.lock().push(request.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Unreachable);
        }

        let route = self.routes.lock().get(&request.url).cloned();
        match route {
            Some(Route::Respond { status, body }) => Ok(Response::new(status)
                .with_url(request.url)
                .with_header("Content-Type", content_type(&body))
                .with_body(body.into_bytes())),
            Some(Route::Fail) => Err(NetworkError::Timeout),
            None => Ok(Response::text(404, "Not Found").with_url(request.url)),
        }
    }
}

fn content_type(body: &str) -> &'static str {
    if body.starts_with('<') {
        "text/html"
    } else {
        "text/plain"
    }
}

/// Host that records claims, opened windows and notifications
#[derive(Debug, Default)]
pub struct RecordingHost {
    claims: AtomicUsize,
    fail_claims: AtomicBool,
    windows: Mutex<Vec<String>>,
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later claim fail
    pub fn fail_claims(&self) {
        self.fail_claims.store(true, Ordering::SeqCst);
    }

    /// Successful claims
    pub fn claims(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }

    pub fn opened_windows(&self) -> Vec<String> {
        self.windows.lock().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }
}

#[async_trait]
impl Clients for RecordingHost {
    async fn claim(&self) -> Result<(), HostError> {
        if self.fail_claims.load(Ordering::SeqCst) {
            return Err(HostError("clients unavailable".to_string()));
        }
        self.claims.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<(), HostError> {
        self.windows.lock().push(url.to_string());
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingHost {
    async fn show(&self, notification: Notification) -> Result<(), HostError> {
        self.notifications.lock().push(notification);
        Ok(())
    }
}

/// In-memory store whose deletion of chosen caches fails
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryCacheStore,
    undeletable: Mutex<BTreeSet<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deleting `name` fail
    pub fn fail_delete(&self, name: &str) {
        self.undeletable.lock().insert(name.to_string());
    }

    /// Let deleting `name` succeed again
    pub fn heal(&self, name: &str) {
        self.undeletable.lock().remove(name);
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        self.inner.open(name).await
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        self.inner.has(name).await
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        if self.undeletable.lock().contains(name) {
            return Err(CacheError::Storage(format!("{name} is locked")));
        }
        self.inner.delete(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        self.inner.keys().await
    }

    async fn match_request(
        &self,
        name: &str,
        request: &Request,
    ) -> Result<Option<Response>, CacheError> {
        self.inner.match_request(name, request).await
    }

    async fn match_any(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        self.inner.match_any(request).await
    }

    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<(), CacheError> {
        self.inner.put(name, request, response).await
    }

    async fn put_all(
        &self,
        name: &str,
        entries: Vec<(Request, Response)>,
    ) -> Result<(), CacheError> {
        self.inner.put_all(name, entries).await
    }
}
