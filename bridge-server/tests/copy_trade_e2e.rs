// bridge-server/tests/copy_trade_e2e.rs
//
// Master EA signals fanned out to slave drop folders through the copy pairs.

mod common;

use axum::http::StatusCode;
use common::TestServer;
use serde_json::{json, Value};

/// Master 1001 copied to 2002 (multiply x2) and 3003 (balance percent), one api_key
async fn two_slaves() -> (TestServer, String) {
    let server = TestServer::start().await;
    for account in ["1001", "2002", "3003"] {
        server.add_account(account).await;
    }
    server.write_balance("1001", 10_000.0);
    server.write_balance("3003", 5_000.0);

    let (status, first) = server
        .call(
            "POST",
            "/api/copy/pairs",
            Some(json!({"master_account": "1001", "slave_account": "2002"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", first);
    let api_key = first["api_key"].as_str().unwrap().to_string();

    let (status, second) = server
        .call(
            "POST",
            "/api/copy/pairs",
            Some(json!({
                "master_account": "1001",
                "slave_account": "3003",
                "api_key": api_key,
                "settings": {"volume_mode": "percent", "multiplier": 1.0}
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", second);

    (server, api_key)
}

fn open_signal(api_key: &str) -> Value {
    json!({
        "api_key": api_key,
        "event": "deal_add",
        "order_id": 778899,
        "account": 1001,
        "symbol": "EURUSD",
        "type": "buy",
        "volume": 0.4,
        "tp": 1.095,
        "sl": 1.08
    })
}

#[tokio::test]
async fn test_open_signal_fans_out_to_every_slave() {
    let (server, api_key) = two_slaves().await;

    let (status, body) = server.post("/api/copy/trade", open_signal(&api_key)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "BUY sent to 2/2 slave accounts");

    let multiplied = server.command_files("2002", "slave_command_");
    assert_eq!(multiplied.len(), 1);
    assert_eq!(multiplied[0]["action"], "BUY");
    assert_eq!(multiplied[0]["symbol"], "EURUSD");
    assert_eq!(multiplied[0]["volume"], 0.8);
    assert_eq!(multiplied[0]["take_profit"], 1.095);
    assert_eq!(multiplied[0]["comment"], "COPY_778899");
    assert_eq!(multiplied[0]["copy_from"], "1001");

    let proportional = server.command_files("3003", "slave_command_");
    assert_eq!(proportional.len(), 1);
    assert_eq!(proportional[0]["volume"], 0.2);

    // The master never receives its own signal
    assert!(server.command_files("1001", "slave_command_").is_empty());

    let (_, history) = server.call("GET", "/api/copy/history", None).await;
    assert_eq!(history["count"], 2);
    let (_, stats) = server.call("GET", "/api/copy/history/stats", None).await;
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["success_rate"], 100.0);
}

#[tokio::test]
async fn test_missing_balance_only_fails_that_slave() {
    let (server, api_key) = two_slaves().await;
    std::fs::remove_file(server.drop_folder("3003").join("account_info.json")).unwrap();

    let (status, body) = server.post("/api/copy/trade", open_signal(&api_key)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "BUY partial success: sent to 1/2 slave accounts");

    let failed = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["account"] == "3003")
        .unwrap();
    assert_eq!(failed["success"], false);
    assert!(failed["message"]
        .as_str()
        .unwrap()
        .starts_with("Volume calculation failed"));
    assert!(server.command_files("3003", "slave_command_").is_empty());

    let (_, errors) = server
        .call("GET", "/api/copy/history?status=error&account=3003", None)
        .await;
    assert_eq!(errors["count"], 1);
    assert_eq!(errors["history"][0]["master"], "1001");
}

#[tokio::test]
async fn test_close_and_modify_follow_order_id() {
    let (server, api_key) = two_slaves().await;

    let (status, _) = server
        .post(
            "/api/copy/trade",
            json!({"api_key": api_key, "event": "position_close", "order_id": "778899",
                   "account": "1001", "symbol": "EURUSD", "volume": 0.4}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let closes = server.command_files("2002", "slave_command_");
    assert_eq!(closes[0]["action"], "CLOSE");
    assert_eq!(closes[0]["command_type"], "close_position");
    assert_eq!(closes[0]["comment"], "COPY_778899");

    let (status, _) = server
        .post(
            "/api/copy/trade",
            json!({"api_key": api_key, "event": "position_modify", "order_id": "778899",
                   "account": "1001", "symbol": "EURUSD", "tp": 1.1, "sl": 1.07}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let commands = server.command_files("2002", "slave_command_");
    let modify = commands.iter().find(|c| c["action"] == "MODIFY").unwrap();
    assert_eq!(modify["command_type"], "modify_position");
    assert_eq!(modify["take_profit"], 1.1);
    assert_eq!(modify["stop_loss"], 1.07);
}

#[tokio::test]
async fn test_signal_rejections() {
    let (server, api_key) = two_slaves().await;

    let mut wrong_master = open_signal(&api_key);
    wrong_master["account"] = json!("9999");
    let (status, problem) = server.post("/api/copy/trade", wrong_master).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["detail"], "Account number does not match master account");

    let mut no_type = open_signal(&api_key);
    no_type.as_object_mut().unwrap().remove("type");
    let (status, _) = server.post("/api/copy/trade", no_type).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Pause both pairs
    let (_, pairs) = server.call("GET", "/api/copy/pairs", None).await;
    for pair in pairs.as_array().unwrap() {
        let uri = format!("/api/copy/pairs/{}/toggle", pair["id"].as_str().unwrap());
        let (status, _) = server.call("POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, problem) = server.post("/api/copy/trade", open_signal(&api_key)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["detail"], "Copy pair is inactive");

    assert!(server.command_files("2002", "slave_command_").is_empty());
    let (_, history) = server.call("GET", "/api/copy/history", None).await;
    assert_eq!(history["count"], 0);
}

#[tokio::test]
async fn test_offline_slave_is_skipped() {
    let (server, api_key) = two_slaves().await;
    let (status, _) = server.call("POST", "/accounts/2002/stop", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.post("/api/copy/trade", open_signal(&api_key)).await;
    assert_eq!(status, StatusCode::OK);
    let skipped = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["account"] == "2002")
        .unwrap();
    assert_eq!(skipped["message"], "Slave account 2002 is offline");
    assert!(server.command_files("2002", "slave_command_").is_empty());
    assert_eq!(server.command_files("3003", "slave_command_").len(), 1);
}
