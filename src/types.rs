use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Temperature stored as Celsius internally.
/// On the wire emodul uses integer tenths of a degree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature(f64);

impl Temperature {
    pub fn from_celsius(c: f64) -> Self {
        Self(c)
    }

    pub fn celsius(&self) -> f64 {
        self.0
    }

    pub(crate) fn from_tenths(tenths: f64) -> Self {
        Self(tenths / 10.0)
    }

    pub(crate) fn to_tenths(self) -> i32 {
        (self.0 * 10.0).round() as i32
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.0)
    }
}

impl<'de> Deserialize<'de> for Temperature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Temperature::from_tenths)
    }
}

impl Serialize for Temperature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if !self.0.is_finite() {
            return Err(serde::ser::Error::custom(format!(
                "temperature {} has no tenths encoding",
                self.0
            )));
        }
        serializer.serialize_i32(self.to_tenths())
    }
}

/// Session established by `authenticate`, or restored from persisted config.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user_id: String,
    pub token: String,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// A Tech controller hub as listed under the user's account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: u64,
    #[serde(default)]
    pub default: bool,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub controller_status: String,
    #[serde(default)]
    pub module_status: String,
    #[serde(default)]
    pub additional_information: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub gmt_id: Option<i32>,
    #[serde(default)]
    pub gmt_time: Option<String>,
    #[serde(default)]
    pub postcode_policy_accepted: Option<bool>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub company: String,
    pub udid: String,
}

/// What a host persists per configured module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserModule {
    pub user_id: String,
    pub token: String,
    pub module: Module,
    pub module_title: String,
}

impl UserModule {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.user_id.clone(), self.token.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ZoneState {
    ZoneOn,
    ZoneOff,
    NoAlarm,
    ZoneUnregistered,
    Other(String),
}

impl ZoneState {
    pub fn as_emodul_str(&self) -> &str {
        match self {
            ZoneState::ZoneOn => "zoneOn",
            ZoneState::ZoneOff => "zoneOff",
            ZoneState::NoAlarm => "noAlarm",
            ZoneState::ZoneUnregistered => "zoneUnregistered",
            ZoneState::Other(s) => s,
        }
    }

    pub fn is_registered(&self) -> bool {
        *self != ZoneState::ZoneUnregistered
    }

    /// `noAlarm` is reported by zones that are running normally.
    pub fn is_on(&self) -> bool {
        matches!(self, ZoneState::ZoneOn | ZoneState::NoAlarm)
    }
}

impl From<String> for ZoneState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "zoneOn" => ZoneState::ZoneOn,
            "zoneOff" => ZoneState::ZoneOff,
            "noAlarm" => ZoneState::NoAlarm,
            "zoneUnregistered" => ZoneState::ZoneUnregistered,
            _ => ZoneState::Other(s),
        }
    }
}

impl From<ZoneState> for String {
    fn from(state: ZoneState) -> Self {
        state.as_emodul_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelayState {
    On,
    #[default]
    Off,
    Other(String),
}

impl From<String> for RelayState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "on" => RelayState::On,
            "off" => RelayState::Off,
            _ => RelayState::Other(s),
        }
    }
}

impl From<RelayState> for String {
    fn from(state: RelayState) -> Self {
        match state {
            RelayState::On => "on".to_string(),
            RelayState::Off => "off".to_string(),
            RelayState::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneFlags {
    #[serde(default)]
    pub relay_state: RelayState,
    #[serde(default)]
    pub min_one_window_open: bool,
    #[serde(default)]
    pub algorithm: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: u32,
    #[serde(default)]
    pub parent_id: u32,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub during_change: bool,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub current_temperature: Option<Temperature>,
    #[serde(default)]
    pub set_temperature: Option<Temperature>,
    #[serde(default)]
    pub flags: ZoneFlags,
    pub zone_state: ZoneState,
    #[serde(default)]
    pub signal_strength: Option<i32>,
    #[serde(default)]
    pub battery_level: Option<i32>,
    #[serde(default)]
    pub actuators_open: Option<i32>,
    #[serde(default)]
    pub humidity: Option<i32>,
    #[serde(default)]
    pub visibility: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDescription {
    pub id: u32,
    #[serde(default)]
    pub parent_id: u32,
    pub name: String,
    #[serde(default)]
    pub style_id: Option<i32>,
    #[serde(default)]
    pub style_icon: Option<String>,
    #[serde(default)]
    pub during_change: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneMode {
    pub id: u32,
    #[serde(default)]
    pub parent_id: u32,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub const_temp_time: Option<i32>,
    #[serde(default)]
    pub set_temperature: Option<Temperature>,
    #[serde(default)]
    pub schedule_index: Option<i32>,
}

/// One zone entry of the module data; schedule and actuator payloads are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneElement {
    pub zone: Zone,
    pub description: ZoneDescription,
    pub mode: ZoneMode,
}

impl ZoneElement {
    pub fn id(&self) -> u32 {
        self.zone.id
    }

    pub fn name(&self) -> &str {
        &self.description.name
    }
}

/// Registered zones of a module, keyed by zone id.
pub type Zones = BTreeMap<u32, ZoneElement>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerMode {
    pub id: u32,
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub menu_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerParameters {
    #[serde(default)]
    pub controller_mode: Option<ControllerMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZonesData {
    #[serde(rename = "transaction_time", default)]
    pub transaction_time: Option<String>,
    pub elements: Vec<ZoneElement>,
    #[serde(default)]
    pub controller_parameters: Option<ControllerParameters>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileParams {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub txt_id: Option<u32>,
    #[serde(default)]
    pub icon_id: Option<u32>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub company_id: Option<u32>,
    #[serde(default)]
    pub controller_name: Option<String>,
    #[serde(default)]
    pub main_controller_id: Option<u32>,
    #[serde(default)]
    pub working_status: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    pub id: u32,
    #[serde(default)]
    pub parent_id: u32,
    #[serde(rename = "type", default)]
    pub kind: i32,
    #[serde(default)]
    pub menu_id: u32,
    #[serde(default)]
    pub visibility: bool,
    #[serde(default)]
    pub params: TileParams,
}

/// Full payload of `users/{userId}/modules/{udid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleData {
    pub zones: ZonesData,
    #[serde(default)]
    pub tiles: Vec<Tile>,
    #[serde(default)]
    pub tiles_last_update: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuOption {
    pub txt_id: u32,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuParams {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default)]
    pub default: Option<i64>,
    #[serde(default)]
    pub options: Option<Vec<MenuOption>>,
    #[serde(default)]
    pub txt_id: Option<u32>,
    #[serde(rename = "type", default)]
    pub kind: Option<i32>,
    #[serde(default)]
    pub block_hide: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuElement {
    #[serde(default)]
    pub menu_type: String,
    #[serde(rename = "type", default)]
    pub kind: i32,
    pub id: u32,
    #[serde(default)]
    pub parent_id: u32,
    #[serde(default)]
    pub access: bool,
    #[serde(default)]
    pub txt_id: u32,
    #[serde(default)]
    pub wiki_txt_id: u32,
    #[serde(default)]
    pub icon_id: u32,
    #[serde(default)]
    pub params: MenuParams,
    #[serde(default)]
    pub during_change: Option<String>,
}

impl MenuElement {
    /// A write to this element is still propagating to the controller.
    pub fn is_during_change(&self) -> bool {
        self.during_change.as_deref() == Some("t")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuData {
    pub elements: Vec<MenuElement>,
    #[serde(default)]
    pub transaction_time: Option<String>,
}

impl MenuData {
    pub fn element(&self, id: u32) -> Option<&MenuElement> {
        self.elements.iter().find(|e| e.id == id)
    }
}

/// Envelope of `users/{userId}/modules/{udid}/menu/{menuType}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleMenu {
    pub status: String,
    #[serde(default)]
    pub data: Option<MenuData>,
}

impl ModuleMenu {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacMode {
    Heat,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HvacAction {
    Heating,
    Idle,
    #[default]
    Off,
}

impl HvacAction {
    pub fn from_relay(relay: &RelayState) -> Self {
        match relay {
            RelayState::On => HvacAction::Heating,
            RelayState::Off => HvacAction::Idle,
            RelayState::Other(_) => HvacAction::Off,
        }
    }
}
