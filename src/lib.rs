mod cache;
mod client;
mod coordinator;
mod diff;
mod entity;
mod error;
mod logger;
mod protocol;
mod types;

pub use client::{TechClient, TechClientBuilder};
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorState, ListenerId, Snapshot};
pub use entity::{
    CHANGE_PRESET, ClimateState, DEFAULT_PRESETS, HEATING_MODE_MENU_ID, PresetSelector,
    PresetState, SUPPORTED_HVAC_MODES, Thermostat,
};
pub use error::{Error, RefreshError, Result};
pub use logger::MessageLogMode;
pub use protocol::{DEFAULT_BASE_URL, DEFAULT_MENU_TYPE};
pub use types::*;
