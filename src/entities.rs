//! Presentation adapters
//!
//! Every entity the plugin exposes is one variant of [`Adapter`]. Each variant
//! holds a shared reference to the entry's [`RateStore`] and recomputes its
//! value from it on demand; none of them persist state of their own.

use crate::error::{Result, SavingsError};
use crate::host::{Attributes, DeviceInfo, Host, Platform, RegistryEntry, slugify};
use crate::keys;
use crate::store::RateStore;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;

pub mod date;
pub mod number;
pub mod select;
pub mod sensor;

pub use date::EffectiveDate;
pub use number::RateNumber;
pub use select::FutureScheduleSelect;
pub use sensor::{CurrencyUnit, CurrentRate, PeakStatus, SavingsSensor, select_rate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityCategory {
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Monetary,
}

impl DeviceClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monetary => "monetary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Measurement,
}

impl StateClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Measurement => "measurement",
        }
    }
}

/// Static metadata of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescription {
    /// `<entry-id>_<suffix>`
    pub unique_id: String,
    pub platform: Platform,
    pub name: &'static str,
    pub icon: &'static str,
    pub category: Option<EntityCategory>,
    pub device_class: Option<DeviceClass>,
    pub state_class: Option<StateClass>,
    pub unit: Option<String>,
    /// Suggested number of decimals when displayed; never applied to the value
    pub display_precision: Option<u32>,
}

impl EntityDescription {
    pub fn new(entry_id: &str, suffix: &str, platform: Platform, name: &'static str) -> Self {
        Self {
            unique_id: format!("{entry_id}_{suffix}"),
            platform,
            name,
            icon: "",
            category: None,
            device_class: None,
            state_class: None,
            unit: None,
            display_precision: None,
        }
    }

    #[must_use]
    pub const fn icon(mut self, icon: &'static str) -> Self {
        self.icon = icon;
        self
    }

    #[must_use]
    pub const fn category(mut self, category: EntityCategory) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub const fn device_class(mut self, device_class: DeviceClass) -> Self {
        self.device_class = Some(device_class);
        self
    }

    #[must_use]
    pub const fn state_class(mut self, state_class: StateClass) -> Self {
        self.state_class = Some(state_class);
        self
    }

    #[must_use]
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub const fn display_precision(mut self, digits: u32) -> Self {
        self.display_precision = Some(digits);
        self
    }

    /// Name shown by the host: device name followed by entity name
    pub fn friendly_name(&self) -> String {
        format!("{} {}", keys::DEVICE_NAME, self.name)
    }

    pub fn suggested_object_id(&self) -> String {
        slugify(&self.friendly_name())
    }
}

/// Value an adapter currently reports
#[derive(Debug, Clone, PartialEq)]
pub enum EntityValue {
    Number(f64),
    Text(String),
    Date(NaiveDate),
    Unknown,
}

impl EntityValue {
    /// Host state string
    pub fn to_state_string(&self) -> String {
        match self {
            Self::Number(n) => format!("{n:?}"),
            Self::Text(s) => s.clone(),
            Self::Date(d) => d.to_string(),
            Self::Unknown => "unknown".to_string(),
        }
    }

    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Value plus extra state attributes
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub value: EntityValue,
    pub attributes: Attributes,
}

impl EntityState {
    pub fn new(value: EntityValue) -> Self {
        Self {
            value,
            attributes: Attributes::new(),
        }
    }
}

/// Value submitted to an editable adapter
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterInput {
    Number(f64),
    Date(NaiveDate),
    Option(String),
}

/// Read-side capability shared by every adapter
pub trait SavingsEntity {
    fn description(&self) -> &EntityDescription;

    fn state(&self) -> EntityState;

    /// Platform-specific attributes (ranges, option lists)
    fn capability_attributes(&self) -> Attributes {
        Attributes::new()
    }
}

/// Closed set of entity kinds the plugin exposes
pub enum Adapter {
    Number(RateNumber),
    Date(EffectiveDate),
    Select(FutureScheduleSelect),
    Sensor(SavingsSensor),
}

impl Adapter {
    fn entity(&self) -> &dyn SavingsEntity {
        match self {
            Self::Number(e) => e,
            Self::Date(e) => e,
            Self::Select(e) => e,
            Self::Sensor(e) => e,
        }
    }

    pub fn description(&self) -> &EntityDescription {
        self.entity().description()
    }

    pub fn unique_id(&self) -> &str {
        &self.description().unique_id
    }

    pub fn state(&self) -> EntityState {
        self.entity().state()
    }

    pub const fn is_editable(&self) -> bool {
        !matches!(self, Self::Sensor(_))
    }

    /// Accept a new value from the user
    pub async fn accept(&self, input: AdapterInput) -> Result<()> {
        match (self, input) {
            (Self::Number(e), AdapterInput::Number(v)) => e.set_native_value(v).await,
            (Self::Date(e), AdapterInput::Date(d)) => e.set_value(d).await,
            (Self::Select(e), AdapterInput::Option(o)) => e.select_option(&o).await,
            (Self::Sensor(_), _) => Err(SavingsError::validation(
                self.unique_id(),
                "Entity is read-only",
            )),
            (_, input) => Err(SavingsError::validation(
                self.unique_id(),
                format!("Unsupported value {input:?}"),
            )),
        }
    }

    /// Current-rate sensors follow a schedule object; this is its id
    pub fn tracked_entity(&self) -> Option<&str> {
        match self {
            Self::Sensor(SavingsSensor::CurrentRate(s)) => Some(s.schedule_entity_id()),
            _ => None,
        }
    }

    pub fn registry_entry(&self, entry_id: &str) -> RegistryEntry {
        let description = self.description();
        RegistryEntry {
            unique_id: description.unique_id.clone(),
            platform: description.platform,
            suggested_object_id: description.suggested_object_id(),
            config_entry_id: entry_id.to_string(),
            device: device_info(entry_id),
        }
    }

    /// Full attribute set written alongside the state
    pub fn state_attributes(&self, state: &EntityState) -> Attributes {
        let description = self.description();
        let mut attributes = self.entity().capability_attributes();
        attributes.insert(
            "friendly_name".to_string(),
            Value::from(description.friendly_name()),
        );
        if !description.icon.is_empty() {
            attributes.insert("icon".to_string(), Value::from(description.icon));
        }
        if let Some(unit) = &description.unit {
            attributes.insert(
                "unit_of_measurement".to_string(),
                Value::from(unit.as_str()),
            );
        }
        if let Some(device_class) = description.device_class {
            attributes.insert(
                "device_class".to_string(),
                Value::from(device_class.as_str()),
            );
        }
        if let Some(state_class) = description.state_class {
            attributes.insert(
                "state_class".to_string(),
                Value::from(state_class.as_str()),
            );
        }
        if let Some(digits) = description.display_precision {
            attributes.insert(
                "suggested_display_precision".to_string(),
                Value::from(digits),
            );
        }
        attributes.extend(state.attributes.clone());
        attributes
    }

    /// Recompute and publish the state under `entity_id`
    pub fn write_state(&self, host: &dyn Host, entity_id: &str) {
        let state = self.state();
        let attributes = self.state_attributes(&state);
        host.set_state(entity_id, &state.value.to_state_string(), attributes);
    }
}

/// Device every entity of `entry_id` is grouped under
pub fn device_info(entry_id: &str) -> DeviceInfo {
    DeviceInfo {
        identifiers: (keys::DOMAIN.to_string(), entry_id.to_string()),
        name: keys::DEVICE_NAME.to_string(),
        manufacturer: keys::DEVICE_MANUFACTURER.to_string(),
        model: keys::DEVICE_MODEL.to_string(),
    }
}

/// Every adapter for the entry behind `store`
pub fn build_adapters(store: &Arc<RateStore>) -> Vec<Adapter> {
    let mut adapters = Vec::new();
    adapters.extend(sensor::entities(store));
    adapters.extend(number::entities(store));
    adapters.extend(date::entities(store));
    adapters.extend(select::entities(store));
    adapters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_keep_their_decimal_point() {
        assert_eq!(EntityValue::Number(45.0).to_state_string(), "45.0");
        assert_eq!(EntityValue::Number(0.325).to_state_string(), "0.325");
        assert_eq!(EntityValue::Unknown.to_state_string(), "unknown");
        assert_eq!(
            EntityValue::Date(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()).to_state_string(),
            "2025-07-01"
        );
    }

    #[test]
    fn description_builds_ids_from_entry() {
        let d = EntityDescription::new("abc", "export_rate_cents", Platform::Sensor, "Export Rate (Cents)");
        assert_eq!(d.unique_id, "abc_export_rate_cents");
        assert_eq!(d.suggested_object_id(), "solar_savings_export_rate_cents");
    }
}
