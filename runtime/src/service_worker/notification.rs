//! Push notifications
//!
//! Turns push payloads into user notifications with the storefront's fixed
//! appearance, and shows them through the host's notification center.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::HostError;

/// Notification appearance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Title of every notification
    pub title: String,
    /// Body used when the push carries no text
    pub default_body: String,
    /// Icon URL
    pub icon: String,
    /// Badge URL
    pub badge: String,
    /// Vibration pattern (ms on / off / on ...)
    pub vibrate: Vec<u32>,
    /// Tag (de-duplication key)
    pub tag: String,
    /// Keep the notification until the user acts on it
    pub require_interaction: bool,
    /// Page opened when a notification is clicked
    pub click_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: "Gee Ess Opticals".to_string(),
            default_body: "New notification from Gee Ess Opticals".to_string(),
            icon: "/logo192.png".to_string(),
            badge: "/logo192.png".to_string(),
            vibrate: vec![200, 100, 200],
            tag: "gee-ess-notification".to_string(),
            require_interaction: false,
            click_url: "/".to_string(),
        }
    }
}

impl NotificationConfig {
    /// Build the notification for a push payload
    pub fn for_push(&self, payload: Option<&str>) -> Notification {
        Notification {
            title: self.title.clone(),
            body: payload.unwrap_or(&self.default_body).to_string(),
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            vibrate: self.vibrate.clone(),
            tag: self.tag.clone(),
            require_interaction: self.require_interaction,
        }
    }
}

/// A notification ready to be shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub tag: String,
    pub require_interaction: bool,
}

/// Host notification center
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Display a notification to the user
    async fn show(&self, notification: Notification) -> Result<(), HostError>;
}
