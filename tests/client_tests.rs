mod common;

use std::time::Duration;

use common::*;
use serde_json::json;
use tech_emodul::*;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn unauthenticated_client(server: &MockServer) -> TechClient {
    TechClient::builder()
        .base_url(base_url(server))
        .build()
        .unwrap()
}

// -- Authentication --

#[tokio::test]
async fn authenticate_stores_session_for_later_calls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/authentication"))
        .and(body_json(json!({ "username": "jan", "password": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authenticated": true,
            "user_id": 42,
            "token": TOKEN
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/42/modules"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(module_list()))
        .expect(1)
        .mount(&server)
        .await;

    let client = unauthenticated_client(&server);
    assert!(client.authenticate("jan", "secret").await.unwrap());
    assert!(client.is_authenticated());

    let creds = client.credentials().unwrap();
    assert_eq!(creds.user_id, "42");
    assert_eq!(creds.token, TOKEN);

    let modules = client.list_modules().await.unwrap();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].udid, UDID);
    assert_eq!(modules[0].name, "Dom");
    assert_eq!(modules[0].kind, "L-8");
}

#[tokio::test]
async fn rejected_credentials_leave_client_unauthenticated() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/authentication"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "authenticated": false })),
        )
        .mount(&server)
        .await;

    let client = unauthenticated_client(&server);
    assert!(!client.authenticate("jan", "wrong").await.unwrap());
    assert!(!client.is_authenticated());

    let err = client.list_modules().await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized), "got {err:?}");
}

#[tokio::test]
async fn string_user_id_is_accepted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/authentication"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authenticated": true,
            "user_id": "42",
            "token": TOKEN
        })))
        .mount(&server)
        .await;

    let client = unauthenticated_client(&server);
    assert!(client.authenticate("jan", "secret").await.unwrap());
    assert_eq!(client.credentials().unwrap().user_id, "42");
}

#[tokio::test]
async fn requests_ask_for_json() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(default_module_data()))
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server);
    client.get_module_data(UDID).await.unwrap();
}

// -- Reads --

#[tokio::test]
async fn module_zones_skip_unregistered() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(default_module_data()))
        .mount(&server)
        .await;

    let client = authed_client(&server);
    let zones = client.get_module_zones(UDID).await.unwrap();

    assert_eq!(zones.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    let salon = &zones[&1];
    assert_eq!(salon.name(), "Zone 1");
    assert_eq!(salon.zone.current_temperature.unwrap().celsius(), 21.5);
    assert_eq!(salon.zone.set_temperature.unwrap().celsius(), 22.0);
    assert_eq!(salon.zone.flags.relay_state, RelayState::On);
    assert_eq!(salon.mode.id, 101);
}

#[tokio::test]
async fn module_zones_are_memoized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(default_module_data()))
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server);
    let first = client.get_module_zones(UDID).await.unwrap();
    let second = client.get_module_zones(UDID).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn module_zones_refetched_after_ttl() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(default_module_data()))
        .expect(2)
        .mount(&server)
        .await;

    let client = builder(&server)
        .cache_ttl(Duration::from_millis(50))
        .build()
        .unwrap();
    client.get_module_zones(UDID).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    client.get_module_zones(UDID).await.unwrap();
}

#[tokio::test]
async fn module_data_bypasses_memoization() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(default_module_data()))
        .expect(2)
        .mount(&server)
        .await;

    let client = authed_client(&server);
    let data = client.get_module_data(UDID).await.unwrap();
    assert_eq!(data.zones.elements.len(), 3);
    assert_eq!(data.tiles.len(), 1);
    client.get_module_data(UDID).await.unwrap();
}

#[tokio::test]
async fn get_zone_reports_unknown_zone() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(default_module_data()))
        .mount(&server)
        .await;

    let client = authed_client(&server);
    assert_eq!(client.get_zone(UDID, 3).await.unwrap().name(), "Zone 3");

    // Unregistered zones are filtered out, so they count as unknown too.
    let err = client.get_zone(UDID, 2).await.unwrap_err();
    assert!(matches!(err, Error::InvalidZone(2)), "got {err:?}");
}

#[tokio::test]
async fn menu_is_memoized_per_menu_type() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MENU_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(menu_response(2, "f")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/42/modules/abc123/menu/mi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "success", "data": { "elements": [] } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server);
    let menu = client.get_module_menu(UDID, "mu").await.unwrap();
    assert!(menu.is_success());
    let element = menu.data.as_ref().unwrap().element(1000).unwrap();
    assert_eq!(element.params.value, Some(2));
    assert!(!element.is_during_change());

    client.get_module_menu(UDID, "mu").await.unwrap();
    let installer = client.get_module_menu(UDID, "mi").await.unwrap();
    assert!(installer.data.unwrap().elements.is_empty());
    client.get_module_menu(UDID, "mi").await.unwrap();
}

// -- Commands --

#[tokio::test]
async fn set_const_temp_sends_tenths_and_invalidates_zones() {
    let server = MockServer::start().await;

    // Once to resolve the zone's mode id, once after the write.
    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(default_module_data()))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(ZONES_PATH))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(body_json(json!({
            "mode": {
                "id": 101,
                "parentId": 1,
                "mode": "constantTemp",
                "constTempTime": 60,
                "setTemperature": 215,
                "scheduleIndex": 0
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server);
    client.get_module_zones(UDID).await.unwrap();
    client
        .set_const_temp(UDID, 1, Temperature::from_celsius(21.5))
        .await
        .unwrap();
    client.get_module_zones(UDID).await.unwrap();
}

#[tokio::test]
async fn set_const_temp_rejects_unknown_zone() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(default_module_data()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(ZONES_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = authed_client(&server);
    let err = client
        .set_const_temp(UDID, 9, Temperature::from_celsius(20.0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidZone(9)), "got {err:?}");
}

#[tokio::test]
async fn set_const_temp_rejects_non_finite_target() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ZONES_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = authed_client(&server);
    for target in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = client
            .set_const_temp(UDID, 1, Temperature::from_celsius(target))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTemperature(_)), "got {err:?}");
    }
}

#[tokio::test]
async fn set_zone_on_sends_zone_state() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ZONES_PATH))
        .and(body_json(json!({ "zone": { "id": 3, "zoneState": "zoneOn" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(ZONES_PATH))
        .and(body_json(json!({ "zone": { "id": 3, "zoneState": "zoneOff" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server);
    client.set_zone_on(UDID, 3, true).await.unwrap();
    client.set_zone_on(UDID, 3, false).await.unwrap();
}

#[tokio::test]
async fn set_menu_value_posts_value_and_invalidates_menu() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MENU_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(menu_response(0, "f")))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/users/42/modules/abc123/menu/mu/ido/1000"))
        .and(body_json(json!({ "value": 3 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = authed_client(&server);
    client.get_module_menu(UDID, "mu").await.unwrap();
    client.set_menu_value(UDID, "mu", 1000, 3).await.unwrap();
    client.get_module_menu(UDID, "mu").await.unwrap();
}

#[tokio::test]
async fn failed_write_still_invalidates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(default_module_data()))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(ZONES_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let client = authed_client(&server);
    client.get_module_zones(UDID).await.unwrap();
    let err = client.set_zone_on(UDID, 1, false).await.unwrap_err();
    assert!(matches!(err, Error::Remote { status: 503, .. }), "got {err:?}");
    client.get_module_zones(UDID).await.unwrap();
}

// -- Errors --

#[tokio::test]
async fn server_error_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let client = authed_client(&server);
    match client.get_module_data(UDID).await.unwrap_err() {
        Error::Remote { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal error");
        }
        other => panic!("expected Remote, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_token_is_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = authed_client(&server);
    let err = client.get_module_zones(UDID).await.unwrap_err();
    assert!(err.is_auth_failure(), "got {err:?}");
}

#[tokio::test]
async fn errors_are_not_memoized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(default_module_data()))
        .mount(&server)
        .await;

    let client = authed_client(&server);
    assert!(client.get_module_zones(UDID).await.is_err());
    assert_eq!(client.get_module_zones(UDID).await.unwrap().len(), 2);
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(default_module_data())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = builder(&server)
        .request_timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let err = client.get_module_data(UDID).await.unwrap_err();
    assert!(matches!(err, Error::Timeout), "got {err:?}");
}

#[tokio::test]
async fn malformed_payload_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(MODULE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tiles": [] })))
        .mount(&server)
        .await;

    let client = authed_client(&server);
    match client.get_module_data(UDID).await.unwrap_err() {
        Error::Decode { path, .. } => assert_eq!(path, "users/42/modules/abc123"),
        other => panic!("expected Decode, got {other:?}"),
    }
}

// -- Message log --

#[tokio::test]
async fn message_log_records_commands_without_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/authentication"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authenticated": true,
            "user_id": 42,
            "token": TOKEN
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(ZONES_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let log = tempfile::NamedTempFile::new().unwrap();
    let client = TechClient::builder()
        .base_url(base_url(&server))
        .message_log(MessageLogMode::Full, log.path().to_str().unwrap())
        .build()
        .unwrap();

    client.authenticate("jan", "secret").await.unwrap();
    client.set_zone_on(UDID, 1, true).await.unwrap();

    let content = std::fs::read_to_string(log.path()).unwrap();
    assert!(!content.contains(TOKEN));
    assert!(!content.contains("secret"));

    let entries: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let cmd = entries.iter().find(|e| e["dir"] == "cmd").unwrap();
    assert_eq!(cmd["action"], "set_zone_on");
    assert_eq!(cmd["udid"], UDID);
    assert_eq!(cmd["body"]["zone"]["zoneState"], "zoneOn");
    let resp = entries
        .iter()
        .find(|e| e["dir"] == "resp" && e["body"]["ok"] == true)
        .unwrap();
    assert_eq!(resp["status"], 201);
}
