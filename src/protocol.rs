use serde::Deserialize;
use serde_json::{Value, json};

use crate::types::{ModuleData, Temperature, Zones};

pub const DEFAULT_BASE_URL: &str = "https://emodul.eu/api/v1/";

/// Menu holding the controller-wide heating mode.
pub const DEFAULT_MENU_TYPE: &str = "mu";

pub const AUTHENTICATION_PATH: &str = "authentication";

/// Minutes a constant-temperature override stays active.
const CONST_TEMP_TIME: u32 = 60;

pub fn modules_path(user_id: &str) -> String {
    format!("users/{user_id}/modules")
}

pub fn module_path(user_id: &str, udid: &str) -> String {
    format!("users/{user_id}/modules/{udid}")
}

pub fn zones_path(user_id: &str, udid: &str) -> String {
    format!("users/{user_id}/modules/{udid}/zones")
}

pub fn menu_path(user_id: &str, udid: &str, menu_type: &str) -> String {
    format!("users/{user_id}/modules/{udid}/menu/{menu_type}")
}

pub fn menu_value_path(user_id: &str, udid: &str, menu_type: &str, menu_id: u32) -> String {
    format!("users/{user_id}/modules/{udid}/menu/{menu_type}/ido/{menu_id}")
}

pub fn authentication_data(username: &str, password: &str) -> Value {
    json!({
        "username": username,
        "password": password
    })
}

pub fn const_temp_data(mode_id: u32, zone_id: u32, target: Temperature) -> Value {
    json!({
        "mode": {
            "id": mode_id,
            "parentId": zone_id,
            "mode": "constantTemp",
            "constTempTime": CONST_TEMP_TIME,
            "setTemperature": target.to_tenths(),
            "scheduleIndex": 0
        }
    })
}

pub fn zone_state_data(zone_id: u32, on: bool) -> Value {
    json!({
        "zone": {
            "id": zone_id,
            "zoneState": if on { "zoneOn" } else { "zoneOff" }
        }
    })
}

pub fn menu_value_data(value: i64) -> Value {
    json!({ "value": value })
}

/// The remote sends `user_id` as a number; older responses used a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UserId {
    Number(u64),
    Text(String),
}

impl UserId {
    pub fn into_string(self) -> String {
        match self {
            UserId::Number(n) => n.to_string(),
            UserId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub authenticated: bool,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Drop unregistered zones and index the rest by zone id.
pub fn registered_zones(data: ModuleData) -> Zones {
    data.zones
        .elements
        .into_iter()
        .filter(|e| e.zone.zone_state.is_registered())
        .map(|e| (e.zone.id, e))
        .collect()
}
