//! E2E Test: PWA Notifications and Background Sync
//!
//! 1. Push message → notification with the storefront's appearance
//! 2. Notification click → storefront opened at its root
//! 3. Queued order sync fires once back online

use storefront_sw::service_worker::{
    Dispatched, NotificationClickEvent, PushEvent, SyncState, WorkerEvent, ORDER_SYNC_TAG,
};

use crate::fixtures::url;
use crate::Storefront;

#[tokio::test]
async fn test_order_update_push() {
    let mut page = Storefront::new();
    let sw = page.deploy("v1.0.0").await.unwrap();

    let push = PushEvent::new(Some(b"Order #1042 is out for delivery".to_vec()));
    let result = page.dispatch(&sw, WorkerEvent::Push(push)).await;
    assert!(matches!(result, Dispatched::Notified));

    let shown = page.host().notifications();
    assert_eq!(shown.len(), 1);
    let n = &shown[0];
    assert_eq!(n.title, "Gee Ess Opticals");
    assert_eq!(n.body, "Order #1042 is out for delivery");
    assert_eq!(n.icon, "/logo192.png");
    assert_eq!(n.badge, "/logo192.png");
    assert_eq!(n.vibrate, vec![200, 100, 200]);
    assert_eq!(n.tag, "gee-ess-notification");
}

#[tokio::test]
async fn test_empty_push_uses_default_text() {
    let mut page = Storefront::new();
    let sw = page.deploy("v1.0.0").await.unwrap();
    page.dispatch(&sw, WorkerEvent::Push(PushEvent::new(None)))
        .await;
    assert_eq!(
        page.host().notifications()[0].body,
        "New notification from Gee Ess Opticals"
    );
}

#[tokio::test]
async fn test_notification_click_opens_storefront() {
    let mut page = Storefront::new();
    let sw = page.deploy("v1.0.0").await.unwrap();

    let click = NotificationClickEvent::new().with_tag("gee-ess-notification");
    page.dispatch(&sw, WorkerEvent::NotificationClick(click))
        .await;
    assert_eq!(page.host().opened_windows(), vec![url("/")]);
}

#[tokio::test]
async fn test_order_sync_after_reconnect() {
    let mut page = Storefront::new();
    let sw = page.deploy("v1.0.0").await.unwrap();

    // Checkout queued an order while offline
    sw.channel().register_sync(ORDER_SYNC_TAG);
    sw.channel().register_sync(ORDER_SYNC_TAG);
    assert_eq!(sw.channel().sync_tags(), vec![ORDER_SYNC_TAG.to_string()]);

    for event in sw.channel().pending_syncs() {
        let result = page.dispatch(&sw, WorkerEvent::Sync(event)).await;
        assert!(matches!(result, Dispatched::Synced(SyncState::Success)));
    }
    assert!(sw.channel().sync_tags().is_empty());
    assert!(sw.channel().pending_syncs().is_empty());
}
