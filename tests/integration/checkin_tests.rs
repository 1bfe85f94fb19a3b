use chrono::NaiveDate;
use restock_watcher::checkin::{CheckinOutcome, CheckinTask};
use restock_watcher::config::CheckinConfig;
use restock_watcher::models::SignInStats;
use restock_watcher::plugins::Notifier;
use restock_watcher::plugins::notifiers::ServerChanNotifier;
use restock_watcher::store::JsonStore;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{PUSH_KEY, bodies_for, expect_pushes, serverchan_for, storage_in};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn task(server: &MockServer, dir: &TempDir) -> (CheckinTask, JsonStore) {
    let config = CheckinConfig {
        url: Some(format!("{}/plugin.php?id=dsu_paulsign:sign", server.uri())),
        referer: Some(format!("{}/", server.uri())),
        cookie: Some("auth=token".to_string()),
        request_timeout: 5,
        ..CheckinConfig::default()
    };
    let store = JsonStore::new(storage_in(dir));
    let notifier: Arc<dyn Notifier> = Arc::new(ServerChanNotifier::new(&serverchan_for(server)).unwrap());
    let task = CheckinTask::from_config(&config, None, store.clone(), notifier)
        .unwrap()
        .expect("check-in should be enabled");
    (task, store)
}

async fn mount_checkin(server: &MockServer, response: ResponseTemplate, times: u64) {
    Mock::given(method("POST"))
        .and(path("/plugin.php"))
        .and(header("cookie", "auth=token"))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_successful_checkin_records_streak() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_checkin(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"ret": 1, "msg": "签到成功"})),
        1,
    )
    .await;
    expect_pushes(&server, 1).await;

    let (task, store) = task(&server, &dir);
    let outcome = task.run(today()).await;

    assert_eq!(
        outcome,
        CheckinOutcome::Signed {
            message: "签到成功".to_string()
        }
    );
    let stats = store.load_stats().await;
    assert_eq!(stats.total_days, 1);
    assert_eq!(stats.consecutive_days, 1);
    assert_eq!(store.load_last_sign_date().await, Some(today()));

    let pushes = bodies_for(&server, &format!("/{}.send", PUSH_KEY)).await;
    assert!(pushes[0].contains("Streak: 1 days"));
}

#[tokio::test]
async fn test_checkin_after_yesterday_extends_streak() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_checkin(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": "ok"})),
        1,
    )
    .await;
    expect_pushes(&server, 1).await;

    let (task, store) = task(&server, &dir);
    store
        .save_stats(&SignInStats {
            total_days: 10,
            consecutive_days: 3,
            max_consecutive_days: 5,
            last_success_date: today().pred_opt(),
            last_failure_date: None,
        })
        .await
        .unwrap();

    task.run(today()).await;

    let stats = store.load_stats().await;
    assert_eq!(stats.consecutive_days, 4);
    assert_eq!(stats.max_consecutive_days, 5);
    assert_eq!(stats.total_days, 11);
}

#[tokio::test]
async fn test_failed_checkin_closes_day_until_tomorrow() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_checkin(&server, ResponseTemplate::new(500), 1).await;
    expect_pushes(&server, 1).await;

    let (task, store) = task(&server, &dir);
    let outcome = task.run(today()).await;

    assert!(matches!(outcome, CheckinOutcome::Failed { .. }));
    assert_eq!(store.load_last_sign_date().await, None);
    let stats = store.load_stats().await;
    assert_eq!(stats.last_failure_date, Some(today()));
    assert_eq!(stats.total_days, 0);
    assert!(!task.is_due(today()).await);
    assert!(task.is_due(today().succ_opt().unwrap()).await);
}

#[tokio::test]
async fn test_failed_checkin_runs_once_per_day() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_checkin(&server, ResponseTemplate::new(500), 1).await;
    expect_pushes(&server, 1).await;

    let (task, _store) = task(&server, &dir);
    let mut attempts = 0;
    for _ in 0..3 {
        if task.run_if_due(today()).await.is_some() {
            attempts += 1;
        }
    }

    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn test_already_signed_closes_day_without_counting() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_checkin(
        &server,
        ResponseTemplate::new(200).set_body_string("<div class=\"alert\">您今天已签到过了</div>"),
        1,
    )
    .await;
    expect_pushes(&server, 1).await;

    let (task, store) = task(&server, &dir);
    let outcome = task.run(today()).await;

    assert!(matches!(outcome, CheckinOutcome::AlreadySigned { .. }));
    assert_eq!(store.load_last_sign_date().await, Some(today()));
    assert_eq!(store.load_stats().await.total_days, 0);
}

#[tokio::test]
async fn test_run_if_due_skips_signed_day() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_checkin(&server, ResponseTemplate::new(200), 0).await;
    expect_pushes(&server, 0).await;

    let (task, store) = task(&server, &dir);
    store.save_last_sign_date(today()).await.unwrap();

    assert!(task.run_if_due(today()).await.is_none());
}
