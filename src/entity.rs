//! Framework-agnostic entity adapters over a [`Coordinator`] snapshot.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::client::TechClient;
use crate::coordinator::{Coordinator, Snapshot};
use crate::types::*;
use crate::{Error, Result};

/// Menu element holding the controller-wide heating mode.
pub const HEATING_MODE_MENU_ID: u32 = 1000;

/// Heating presets, indexed by the menu value the controller stores.
pub const DEFAULT_PRESETS: [&str; 4] = ["Normalny", "Urlop", "Ekonomiczny", "Komfortowy"];

/// Shown while a preset write is still propagating.
pub const CHANGE_PRESET: &str = "Oczekiwanie na zmianę";

pub const SUPPORTED_HVAC_MODES: [HvacMode; 2] = [HvacMode::Heat, HvacMode::Off];

#[derive(Debug, Clone, PartialEq)]
pub struct ClimateState {
    pub unique_id: String,
    pub name: String,
    pub current_temperature: Option<Temperature>,
    pub target_temperature: Option<Temperature>,
    pub humidity: Option<i32>,
    pub hvac_mode: HvacMode,
    pub hvac_action: HvacAction,
}

impl ClimateState {
    pub fn from_zone(udid: &str, element: &ZoneElement) -> Self {
        let zone = &element.zone;
        Self {
            unique_id: format!("{udid}_{}", zone.id),
            name: element.description.name.clone(),
            current_temperature: zone.current_temperature,
            target_temperature: zone.set_temperature,
            humidity: zone.humidity,
            hvac_mode: if zone.zone_state.is_on() {
                HvacMode::Heat
            } else {
                HvacMode::Off
            },
            hvac_action: HvacAction::from_relay(&zone.flags.relay_state),
        }
    }
}

/// Climate entity for one zone.
#[derive(Clone)]
pub struct Thermostat {
    coordinator: Coordinator,
    zone_id: u32,
}

impl Thermostat {
    pub fn new(coordinator: Coordinator, zone_id: u32) -> Self {
        Self {
            coordinator,
            zone_id,
        }
    }

    /// One thermostat per zone in the coordinator's current snapshot.
    pub fn all(coordinator: &Coordinator) -> Vec<Thermostat> {
        coordinator
            .zones()
            .into_keys()
            .map(|id| Thermostat::new(coordinator.clone(), id))
            .collect()
    }

    pub fn zone_id(&self) -> u32 {
        self.zone_id
    }

    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.coordinator.udid(), self.zone_id)
    }

    /// `None` once the zone has disappeared from the snapshot.
    pub fn state(&self) -> Option<ClimateState> {
        self.coordinator
            .zone(self.zone_id)
            .map(|z| ClimateState::from_zone(self.coordinator.udid(), &z))
    }

    pub async fn set_temperature(&self, target: Temperature) -> Result<()> {
        self.client()
            .set_const_temp(self.coordinator.udid(), self.zone_id, target)
            .await?;
        self.refresh_after_write().await;
        Ok(())
    }

    pub async fn set_hvac_mode(&self, mode: HvacMode) -> Result<()> {
        self.client()
            .set_zone_on(self.coordinator.udid(), self.zone_id, mode == HvacMode::Heat)
            .await?;
        self.refresh_after_write().await;
        Ok(())
    }

    fn client(&self) -> &Arc<TechClient> {
        self.coordinator.client()
    }

    async fn refresh_after_write(&self) {
        if let Err(e) = self.coordinator.refresh().await {
            warn!(zone_id = self.zone_id, error = %e, "refresh after write failed");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresetState {
    Current(&'static str),
    /// The controller reports no value, or one outside the preset table.
    Unknown(Option<i64>),
    /// A preset write has not reached the controller yet.
    Changing,
    /// No menu in the snapshot, or no heating-mode element in it.
    Unavailable,
}

impl PresetState {
    pub fn from_menu(menu: Option<&MenuData>) -> Self {
        let Some(element) = menu.and_then(|m| m.element(HEATING_MODE_MENU_ID)) else {
            return PresetState::Unavailable;
        };
        if element.is_during_change() {
            return PresetState::Changing;
        }
        let value = element.params.value;
        value
            .and_then(|v| usize::try_from(v).ok())
            .and_then(|i| DEFAULT_PRESETS.get(i))
            .map_or(PresetState::Unknown(value), |name| PresetState::Current(*name))
    }

    /// Label shown as the selected option, if any.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            PresetState::Current(name) => Some(*name),
            PresetState::Unknown(_) => Some("Unknown"),
            PresetState::Changing => Some(CHANGE_PRESET),
            PresetState::Unavailable => None,
        }
    }
}

/// Heating-mode selector for a whole module.
#[derive(Clone)]
pub struct PresetSelector {
    coordinator: Coordinator,
    name: String,
    /// Snapshot current when the last write succeeded. The selector reports
    /// `Changing` until the coordinator publishes a newer one.
    pending: Arc<Mutex<Option<Arc<Snapshot>>>>,
}

impl PresetSelector {
    pub fn new(coordinator: Coordinator, name: impl Into<String>) -> Self {
        Self {
            coordinator,
            name: name.into(),
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_id(&self) -> &str {
        self.coordinator.udid()
    }

    pub fn state(&self) -> PresetState {
        let snapshot = self.coordinator.snapshot();
        {
            let mut pending = self.pending.lock().expect("pending lock poisoned");
            if pending
                .as_ref()
                .is_some_and(|at_write| Arc::ptr_eq(at_write, &snapshot))
            {
                return PresetState::Changing;
            }
            *pending = None;
        }

        let state = PresetState::from_menu(snapshot.menu.as_ref());
        if state == PresetState::Unavailable {
            warn!(hub = %self.name, "heating mode menu not found");
        }
        state
    }

    pub fn options(&self) -> Vec<&'static str> {
        match self.state() {
            PresetState::Changing => vec![CHANGE_PRESET],
            _ => DEFAULT_PRESETS.to_vec(),
        }
    }

    /// Write the preset and refresh. Ignored while a change is pending.
    pub async fn select_option(&self, option: &str) -> Result<()> {
        if self.state() == PresetState::Changing {
            debug!(hub = %self.name, "preset change already in progress");
            return Ok(());
        }

        let index = DEFAULT_PRESETS
            .iter()
            .position(|p| *p == option)
            .ok_or_else(|| Error::InvalidPreset(option.to_string()))?;

        let menu_type = &self.coordinator.config().menu_type;
        self.coordinator
            .client()
            .set_menu_value(self.coordinator.udid(), menu_type, HEATING_MODE_MENU_ID, index as i64)
            .await?;
        *self.pending.lock().expect("pending lock poisoned") = Some(self.coordinator.snapshot());

        if let Err(e) = self.coordinator.refresh().await {
            warn!(hub = %self.name, error = %e, "refresh after preset change failed");
        }
        Ok(())
    }
}
