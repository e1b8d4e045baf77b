//! Storefront PWA End-to-End Tests
//!
//! Drives the storefront service worker the way a browser would: deploys
//! worker versions, dispatches install / activate / fetch / message / push
//! events, and relays lifecycle changes to the page's registration. The
//! scenarios live in `pwa/`.

pub mod harness;

pub use harness::{Deployment, PageFetch, Storefront, UpdateLog};

#[cfg(test)]
#[path = "../pwa/mod.rs"]
mod pwa;
