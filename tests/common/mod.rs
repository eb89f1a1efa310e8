#![allow(dead_code)]

use serde_json::{Value, json};
use tech_emodul::{Credentials, TechClient, TechClientBuilder};
use wiremock::MockServer;

pub const USER_ID: &str = "42";
pub const TOKEN: &str = "test-token";
pub const UDID: &str = "abc123";

pub const MODULE_PATH: &str = "/api/v1/users/42/modules/abc123";
pub const ZONES_PATH: &str = "/api/v1/users/42/modules/abc123/zones";
pub const MENU_PATH: &str = "/api/v1/users/42/modules/abc123/menu/mu";

pub fn base_url(server: &MockServer) -> String {
    format!("{}/api/v1/", server.uri())
}

pub fn builder(server: &MockServer) -> TechClientBuilder {
    TechClient::builder()
        .base_url(base_url(server))
        .credentials(Credentials::new(USER_ID, TOKEN))
}

pub fn authed_client(server: &MockServer) -> TechClient {
    builder(server).build().expect("client should build")
}

pub fn zone_element(id: u32, state: &str, current: i64, set: i64, relay: &str) -> Value {
    json!({
        "zone": {
            "id": id,
            "parentId": 1,
            "time": "2024-01-01T00:00:00",
            "duringChange": false,
            "index": id,
            "currentTemperature": current,
            "setTemperature": set,
            "flags": {
                "relayState": relay,
                "minOneWindowOpen": false,
                "algorithm": "heating",
                "floorSensor": 0,
                "humidityAlgorytm": 0,
                "zoneExcluded": 0
            },
            "zoneState": state,
            "signalStrength": 90,
            "batteryLevel": 80,
            "actuatorsOpen": 0,
            "humidity": 45,
            "visibility": true
        },
        "description": {
            "id": id,
            "parentId": 1,
            "name": format!("Zone {id}"),
            "styleId": 0,
            "styleIcon": "icon",
            "duringChange": false
        },
        "mode": {
            "id": 100 + id,
            "parentId": id,
            "mode": "timeLimit",
            "constTempTime": 60,
            "setTemperature": set,
            "scheduleIndex": 0
        },
        "schedule": { "id": id, "p0Days": [], "p0Intervals": [] },
        "actuators": [],
        "underfloor": {},
        "windowsSensors": [],
        "additionalContacts": []
    })
}

pub fn module_data(elements: Vec<Value>) -> Value {
    json!({
        "zones": {
            "transaction_time": "1700000000",
            "elements": elements,
            "globalSchedules": { "time": "", "duringChange": false, "elements": [] },
            "controllerParameters": {
                "controllerMode": {
                    "id": 1, "parentId": 0, "type": 1, "txtId": 0,
                    "iconId": 0, "value": 0, "menuId": 1000
                },
                "globalSchedulesNumber": {}
            }
        },
        "tiles": [{
            "id": 1,
            "parentId": 0,
            "type": 50,
            "menuId": 0,
            "visibility": true,
            "params": { "description": "Controller", "txtId": 0, "iconId": 0, "version": "1.0.0" }
        }],
        "tilesLastUpdate": "1700000000"
    })
}

/// Zone 1 heating at 21.5, zone 2 unregistered, zone 3 off.
pub fn default_module_data() -> Value {
    module_data(vec![
        zone_element(1, "zoneOn", 215, 220, "on"),
        zone_element(2, "zoneUnregistered", 0, 0, "off"),
        zone_element(3, "zoneOff", 190, 180, "off"),
    ])
}

pub fn menu_response(heating_mode: i64, during_change: &str) -> Value {
    json!({
        "status": "success",
        "data": {
            "elements": [{
                "menuType": "MU",
                "type": 13,
                "id": 1000,
                "parentId": 0,
                "access": true,
                "txtId": 1,
                "wikiTxtId": 0,
                "iconId": 0,
                "params": {
                    "description": "Heating mode",
                    "value": heating_mode,
                    "default": 0,
                    "options": [
                        { "txtId": 10, "value": 0 },
                        { "txtId": 11, "value": 1 },
                        { "txtId": 12, "value": 2 },
                        { "txtId": 13, "value": 3 }
                    ]
                },
                "duringChange": during_change
            }],
            "transaction_time": "1700000000"
        }
    })
}

pub fn module_list() -> Value {
    json!([{
        "id": 7,
        "default": true,
        "name": "Dom",
        "email": "user@example.com",
        "type": "L-8",
        "controllerStatus": "active",
        "moduleStatus": "active",
        "additionalInformation": "",
        "phoneNumber": null,
        "zipCode": "00-001",
        "tag": null,
        "country": "PL",
        "gmtId": 1,
        "gmtTime": "+01:00",
        "postcodePolicyAccepted": true,
        "style": "default",
        "version": "2.1.4",
        "company": "Tech",
        "udid": UDID
    }])
}
