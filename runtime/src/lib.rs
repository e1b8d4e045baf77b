//! Storefront Service Worker Runtime
//!
//! This crate provides the offline asset-caching worker behind the Gee Ess
//! Opticals storefront's installable web app. The worker intercepts every
//! outbound request made by the page, serves app-shell and runtime-cached
//! resources cache-first, and keeps exactly one versioned cache authoritative.
//!
//! The worker never talks to a browser directly. The host platform supplies a
//! [`CacheStore`], a [`Network`] and the page-facing [`Clients`] and
//! [`Notifier`] handles, and feeds lifecycle events through the
//! [`ControlChannel`].
//!
//! # Architecture
//!
//! - `service_worker::config`: compiled-in worker configuration (+ JSON overrides)
//! - `service_worker::classifier`: pure request classification (bypass vs. cacheable)
//! - `service_worker::cache`: named response caches and the in-memory store
//! - `service_worker::fetch`: request / response model + fetch events
//! - `service_worker::manager`: install / activate / fetch state machine
//! - `service_worker::control`: lifecycle event + page command dispatch
//! - `service_worker::registration`: page-side registration and update relay
//! - `service_worker::notification` / `service_worker::sync`: push and background sync
//!
//! [`CacheStore`]: service_worker::CacheStore
//! [`Network`]: service_worker::Network
//! [`Clients`]: service_worker::Clients
//! [`Notifier`]: service_worker::Notifier
//! [`ControlChannel`]: service_worker::ControlChannel

pub mod service_worker;

pub use service_worker::{
    CacheManager, ControlChannel, ControlMessage, RequestClass, WorkerConfig, WorkerError,
    WorkerState,
};
