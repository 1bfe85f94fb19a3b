use restock_watcher::AppError;
use restock_watcher::models::{ChangeEvent, ChangeKind, MemberTier, ProductRecord};
use restock_watcher::plugins::Notifier;
use restock_watcher::plugins::notifiers::ServerChanNotifier;
use restock_watcher::plugins::traits::Notification;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{PUSH_KEY, bodies_for, expect_pushes, serverchan_for};

#[tokio::test]
async fn test_push_posts_title_and_desp() {
    let server = MockServer::start().await;
    expect_pushes(&server, 1).await;

    let notifier = ServerChanNotifier::new(&serverchan_for(&server)).unwrap();
    let product = ProductRecord::new("HK-NAT", "白银区", 3).with_tier(MemberTier::Silver);
    let event = ChangeEvent::for_product(ChangeKind::Listed, 0, &product);

    let result = notifier.notify(&Notification::from_change(&event)).await.unwrap();
    assert!(result.success);
    assert_eq!(result.message_id.as_deref(), Some("1001"));

    let bodies = bodies_for(&server, &format!("/{}.send", PUSH_KEY)).await;
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("title=🟢 Listed - 白银区"));
    assert!(bodies[0].contains("Name: HK-NAT"));
    assert!(bodies[0].contains("Stock: 3"));
}

#[tokio::test]
async fn test_nonzero_code_is_delivery_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{}.send", PUSH_KEY)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 40001,
            "message": "bad key"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = ServerChanNotifier::new(&serverchan_for(&server)).unwrap();
    let err = notifier.notify(&Notification::new("t", "b")).await.unwrap_err();

    match err {
        AppError::Notification(message) => assert!(message.contains("bad key")),
        other => panic!("expected notification error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_error_is_delivery_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = ServerChanNotifier::new(&serverchan_for(&server)).unwrap();
    let result = notifier.notify(&Notification::new("t", "b")).await;

    assert!(matches!(result, Err(AppError::Notification(_))));
}
