//! End-to-end runs of the controller against mocked providers

use crate::common::{
    create_test_config, mount_master_list, mount_stats, mount_store, stats_body, store_body,
};
use catalog_harvest::fetch::ErrorKind;
use catalog_harvest::query::run_query;
use catalog_harvest::state::{CheckpointStore, JsonCheckpointStore};
use catalog_harvest::storage::{Provider, RunStatus, Storage};
use catalog_harvest::{Controller, HarvestError, StopReason};
use chrono::NaiveDate;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_run_classifies_every_item() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_master_list(&server, &[(10, "Alpha"), (20, "Alpha Soundtrack"), (30, "Giant"), (40, "")]).await;
    mount_stats(&server, 10, "0 .. 20,000").await;
    mount_stats(&server, 20, "0 .. 20,000").await;
    mount_stats(&server, 30, "2,000,000 .. 5,000,000").await;
    mount_store(&server, 10, "game").await;
    mount_store(&server, 20, "dlc").await;

    let config = create_test_config(&server.uri(), dir.path(), 100);
    let mut controller = Controller::open(config, "hash".to_string()).unwrap();
    let summary = controller.run().await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::Completed);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.ineligible, 1);
    assert_eq!(summary.over_threshold, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.requests_used, 2);
    assert_eq!(summary.next_index, 3);
    assert!(controller.checkpoint().reset_log);
    assert!(controller.checkpoint().master_list_fetched);

    let storage = controller.storage();
    let item = storage.get_item(10).unwrap().unwrap();
    assert_eq!(item.name, "Item 10");
    assert_eq!(item.price, Some(999));
    assert_eq!(item.owner_count, 10_000);
    assert_eq!(item.rating, Some(90));
    assert_eq!(item.release_date, NaiveDate::from_ymd_opt(2021, 3, 14));
    assert_eq!(item.tags.get("Action"), Some(&120));
    assert_eq!(item.genres.get("Action"), Some(&1));
    assert_eq!(item.categories.get("Single-player"), Some(&2));
    assert!(item.windows && item.linux && !item.mac);

    assert!(storage.get_item(20).unwrap().is_none());
    assert_eq!(storage.list_ineligible().unwrap(), vec![20]);
    assert_eq!(storage.list_over_threshold().unwrap(), vec![(30, 2_000_000)]);
    assert_eq!(storage.load_master_list().unwrap().len(), 3);

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.updated, 1);
}

#[tokio::test]
async fn test_next_pass_ignores_ineligible_and_rechecks_over_threshold() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/applist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "applist": { "apps": [
                { "appid": 10, "name": "Alpha" },
                { "appid": 20, "name": "Alpha Soundtrack" },
                { "appid": 30, "name": "Giant" }
            ] }
        })))
        .expect(1)
        .mount(&server)
        .await;
    for id in [10, 20] {
        Mock::given(method("GET"))
            .and(path(format!("/stats/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(stats_body("0 .. 20,000")))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/stats/30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stats_body("2,000,000 .. 5,000,000")))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/store/10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(store_body(10, "game")))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/store/20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(store_body(20, "dlc")))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path(), 100);
    let first = Controller::open(config.clone(), "hash".to_string())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.ineligible, 1);

    let mut controller = Controller::open(config, "hash".to_string()).unwrap();
    let second = controller.run().await.unwrap();

    assert_eq!(second.stop_reason, StopReason::Completed);
    assert_eq!(second.updated, 1);
    assert_eq!(second.ignored, 1);
    assert_eq!(second.over_threshold, 1);
    assert_eq!(second.requests_used, 1);

    // Re-merging the same item leaves a single row
    assert_eq!(controller.storage().count_items().unwrap(), 1);
}

#[tokio::test]
async fn test_budget_stops_and_later_runs_resume() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let apps: Vec<(i64, &str)> = vec![(1, "One"), (2, "Two"), (3, "Three"), (4, "Four"), (5, "Five")];
    mount_master_list(&server, &apps).await;
    for (id, _) in &apps {
        mount_stats(&server, *id, "0 .. 20,000").await;
        Mock::given(method("GET"))
            .and(path(format!("/store/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(store_body(*id, "game")))
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = create_test_config(&server.uri(), dir.path(), 2);
    let checkpoints = JsonCheckpointStore::new(&config.output.checkpoint_path);

    let first = Controller::open(config.clone(), "hash".to_string())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.stop_reason, StopReason::BudgetReached);
    assert_eq!(first.updated, 2);
    assert_eq!(first.requests_used, 2);
    assert_eq!(first.next_index, 2);

    let saved = checkpoints.load().unwrap();
    assert_eq!(saved.last_processed_index, 2);
    assert_eq!(saved.store_request_count, 2);
    assert!(saved.store_request_count_reset);

    let second = Controller::open(config.clone(), "hash".to_string())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(second.stop_reason, StopReason::BudgetReached);
    assert_eq!(second.updated, 2);
    assert_eq!(second.next_index, 4);

    let mut controller = Controller::open(config, "hash".to_string()).unwrap();
    let third = controller.run().await.unwrap();
    assert_eq!(third.stop_reason, StopReason::Completed);
    assert_eq!(third.updated, 1);
    assert_eq!(third.requests_used, 1);
    assert_eq!(controller.storage().count_items().unwrap(), 5);

    let run = controller.storage().get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_soft_failure_is_repaired() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_master_list(&server, &[(42, "Flaky")]).await;
    mount_stats(&server, 42, "0 .. 20,000").await;
    Mock::given(method("GET"))
        .and(path("/store/42"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_store(&server, 42, "game").await;

    let config = create_test_config(&server.uri(), dir.path(), 100);
    let mut controller = Controller::open(config, "hash".to_string()).unwrap();

    let summary = controller.run().await.unwrap();
    assert_eq!(summary.failed, 1);

    let failures = controller.storage().list_failed_requests().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].id, 42);
    assert_eq!(failures[0].provider, Provider::Store);
    assert_eq!(failures[0].error_kind, ErrorKind::ServerError);
    assert_eq!(failures[0].status_code, Some(500));
    assert!(controller.storage().exclusion_set().unwrap().is_empty());

    let repaired = controller.repair().await.unwrap();
    assert_eq!(repaired.updated, 1);
    assert!(controller.storage().list_failed_requests().unwrap().is_empty());
    assert!(controller.storage().get_item(42).unwrap().is_some());
}

#[tokio::test]
async fn test_hard_failures_are_excluded() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_master_list(&server, &[(7, "Rejected"), (8, "Missing")]).await;
    mount_stats(&server, 7, "0 .. 20,000").await;
    mount_stats(&server, 8, "0 .. 20,000").await;
    Mock::given(method("GET"))
        .and(path("/store/7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "7": { "success": false } })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/store/8"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path(), 100);
    let first = Controller::open(config.clone(), "hash".to_string())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.failed, 2);

    let mut controller = Controller::open(config, "hash".to_string()).unwrap();
    let failures = controller.storage().list_failed_requests().unwrap();
    assert_eq!(failures[0].error_kind, ErrorKind::ResponseRejected);
    assert_eq!(failures[0].status_code, None);
    assert_eq!(failures[1].error_kind, ErrorKind::NotFound);

    let second = controller.run().await.unwrap();
    assert_eq!(second.ignored, 2);
    assert_eq!(second.requests_used, 0);
}

#[tokio::test]
async fn test_shutdown_keeps_position() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_master_list(&server, &[(1, "One")]).await;

    let config = create_test_config(&server.uri(), dir.path(), 100);
    let checkpoint_path = config.output.checkpoint_path.clone();
    let mut controller = Controller::open(config, "hash".to_string()).unwrap();

    let summary = controller.run_until(std::future::ready(())).await.unwrap();
    assert_eq!(summary.stop_reason, StopReason::Interrupted);
    assert_eq!(summary.processed(), 0);

    let saved = JsonCheckpointStore::new(checkpoint_path).load().unwrap();
    assert_eq!(saved.last_processed_index, 0);
    assert!(saved.master_list_fetched);
    assert!(!saved.reset_log);

    let run = controller.storage().get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
}

#[tokio::test]
async fn test_connection_failure_aborts_run() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_master_list(&server, &[(1, "One")]).await;

    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut config = create_test_config(&server.uri(), dir.path(), 100);
    config.providers.stats_url = format!("http://127.0.0.1:{}/stats/{{id}}", port);
    let checkpoint_path = config.output.checkpoint_path.clone();

    let mut controller = Controller::open(config, "hash".to_string()).unwrap();
    let result = controller.run().await;
    assert!(matches!(result, Err(HarvestError::Fetch(ref e)) if e.is_fatal()));

    let saved = JsonCheckpointStore::new(checkpoint_path).load().unwrap();
    assert_eq!(saved.last_processed_index, 0);

    let run = controller.storage().get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(controller.storage().list_failed_requests().unwrap().is_empty());
}

#[tokio::test]
async fn test_query_merged_items() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_master_list(&server, &[(1, "One"), (2, "Two")]).await;
    for id in [1, 2] {
        mount_stats(&server, id, "0 .. 20,000").await;
        mount_store(&server, id, "game").await;
    }

    let config = create_test_config(&server.uri(), dir.path(), 100);
    let mut controller = Controller::open(config, "hash".to_string()).unwrap();
    controller.run().await.unwrap();
    let storage = controller.storage();

    let all = run_query(storage, "genres=1&order_by=id:asc").unwrap();
    assert_eq!(all.iter().map(|item| item.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(all[0].release_date.as_deref(), Some("2021-03-14"));

    let limited = run_query(storage, "limit=1").unwrap();
    assert_eq!(limited.len(), 1);

    assert!(run_query(storage, "genres=99").unwrap().is_empty());
    assert!(run_query(storage, "limit=21").is_err());
    assert!(run_query(storage, "order_by=name;DROP TABLE items").is_err());
    assert_eq!(storage.count_items().unwrap(), 2);
}

#[tokio::test]
async fn test_shutdown_during_request_abandons_item() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_master_list(&server, &[(1, "One")]).await;
    mount_stats(&server, 1, "0 .. 20,000").await;
    Mock::given(method("GET"))
        .and(path("/store/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(store_body(1, "game"))
                .set_delay(std::time::Duration::from_millis(2_000)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_store(&server, 1, "game").await;

    let mut config = create_test_config(&server.uri(), dir.path(), 100);
    config.fetch.timeout_ms = 5_000;
    let checkpoint_path = config.output.checkpoint_path.clone();

    let mut controller = Controller::open(config.clone(), "hash".to_string()).unwrap();
    let shutdown = tokio::time::sleep(std::time::Duration::from_millis(300));
    let summary = controller.run_until(shutdown).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::Interrupted);
    assert_eq!(summary.processed(), 0);
    assert_eq!(controller.storage().count_items().unwrap(), 0);
    assert!(controller.storage().list_failed_requests().unwrap().is_empty());

    let saved = JsonCheckpointStore::new(checkpoint_path).load().unwrap();
    assert_eq!(saved.last_processed_index, 0);
    drop(controller);

    let mut controller = Controller::open(config, "hash".to_string()).unwrap();
    let resumed = controller.run().await.unwrap();
    assert_eq!(resumed.stop_reason, StopReason::Completed);
    assert_eq!(resumed.updated, 1);
    assert!(controller.storage().get_item(1).unwrap().is_some());
}
