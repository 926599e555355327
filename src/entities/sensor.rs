//! Read-only computed sensors
//!
//! Static projections of the stored rates plus the schedule-driven "current
//! import rate". Rates are stored in cents; the major-unit variants divide by
//! [`keys::MINOR_PER_MAJOR`] at read time.

use super::{Adapter, EntityDescription, EntityState, EntityValue, SavingsEntity, StateClass};
use crate::host::{Platform, State};
use crate::keys;
use crate::store::RateStore;
use serde_json::Value;
use std::sync::Arc;

const NO_SCHEDULE: &str = "None";

/// Currency unit a rate is reported in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyUnit {
    /// Cents, as stored
    Minor,
    /// Host currency (cents / 100)
    Major,
}

impl CurrencyUnit {
    pub fn convert(self, cents: f64) -> f64 {
        match self {
            Self::Minor => cents,
            Self::Major => cents / keys::MINOR_PER_MAJOR,
        }
    }

    pub const fn display_precision(self) -> u32 {
        match self {
            Self::Minor => 2,
            Self::Major => 4,
        }
    }

    pub fn unit_label(self, currency: &str) -> String {
        match self {
            Self::Minor => keys::CENTS_PER_KWH.to_string(),
            Self::Major => format!("{currency}/kWh"),
        }
    }

    const fn suffix(self) -> &'static str {
        match self {
            Self::Minor => "cents",
            Self::Major => "dollars",
        }
    }
}

/// Which branch of the tariff is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakStatus {
    OnPeak,
    OffPeak,
}

impl PeakStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnPeak => "On Peak",
            Self::OffPeak => "Off Peak",
        }
    }
}

/// Pick the active rate from the schedule state; only `on` is on-peak
pub fn select_rate(schedule_state: Option<&str>, on_peak: f64, off_peak: f64) -> (PeakStatus, f64) {
    if schedule_state == Some(keys::STATE_ON) {
        (PeakStatus::OnPeak, on_peak)
    } else {
        (PeakStatus::OffPeak, off_peak)
    }
}

/// Rate a current-rate sensor reports for one schedule state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentRate {
    pub status: PeakStatus,
    pub raw_cents: f64,
    /// `raw_cents` converted to the sensor's unit
    pub value: f64,
}

/// Identifier of the active schedule, as text
pub struct ActiveScheduleSensor {
    description: EntityDescription,
    store: Arc<RateStore>,
}

impl ActiveScheduleSensor {
    pub fn new(store: Arc<RateStore>) -> Self {
        let name = "Active Schedule";
        let suffix = name.to_lowercase().replace(' ', "_");
        let description = EntityDescription::new(&store.entry_id(), &suffix, Platform::Sensor, name)
            .icon("mdi:calendar-check");
        Self { description, store }
    }
}

impl SavingsEntity for ActiveScheduleSensor {
    fn description(&self) -> &EntityDescription {
        &self.description
    }

    fn state(&self) -> EntityState {
        let schedule = self
            .store
            .get_string(keys::PEAK_SCHEDULE)
            .unwrap_or_else(|| NO_SCHEDULE.to_string());
        EntityState::new(EntityValue::Text(schedule))
    }
}

/// A stored rate, optionally converted to the major currency unit
pub struct RateSensor {
    description: EntityDescription,
    store: Arc<RateStore>,
    key: &'static str,
    unit: CurrencyUnit,
}

impl RateSensor {
    /// Current on/off-peak rate in cents
    pub fn static_rate(store: Arc<RateStore>, name: &'static str, key: &'static str) -> Self {
        let description = EntityDescription::new(&store.entry_id(), key, Platform::Sensor, name)
            .icon("mdi:currency-usd")
            .state_class(StateClass::Measurement)
            .unit(keys::CENTS_PER_KWH);
        Self {
            description,
            store,
            key,
            unit: CurrencyUnit::Minor,
        }
    }

    /// Export rate in the given unit
    pub fn export(store: Arc<RateStore>, unit: CurrencyUnit) -> Self {
        let name = match unit {
            CurrencyUnit::Minor => "Export Rate (Cents)",
            CurrencyUnit::Major => "Export Rate (Dollars)",
        };
        let suffix = format!("{}_{}", keys::EXPORT_RATE, unit.suffix());
        let description = EntityDescription::new(&store.entry_id(), &suffix, Platform::Sensor, name)
            .icon("mdi:home-export-outline")
            .state_class(StateClass::Measurement)
            .unit(unit.unit_label(store.host().currency()))
            .display_precision(unit.display_precision());
        Self {
            description,
            store,
            key: keys::EXPORT_RATE,
            unit,
        }
    }

    pub fn native_value(&self) -> f64 {
        self.unit.convert(self.store.get_f64(self.key, 0.0))
    }
}

impl SavingsEntity for RateSensor {
    fn description(&self) -> &EntityDescription {
        &self.description
    }

    fn state(&self) -> EntityState {
        EntityState::new(EntityValue::Number(self.native_value()))
    }
}

/// Import rate currently in force, following the peak schedule's state
pub struct CurrentRateSensor {
    description: EntityDescription,
    store: Arc<RateStore>,
    schedule_entity_id: String,
    unit: CurrencyUnit,
}

impl CurrentRateSensor {
    pub fn new(store: Arc<RateStore>, schedule_entity_id: &str, unit: CurrencyUnit) -> Self {
        let name = match unit {
            CurrencyUnit::Minor => "Current Import Rate (Cents)",
            CurrencyUnit::Major => "Current Import Rate (Dollars)",
        };
        let suffix = format!("current_import_rate_{}", unit.suffix());
        let description = EntityDescription::new(&store.entry_id(), &suffix, Platform::Sensor, name)
            .icon("mdi:cash-fast")
            .state_class(StateClass::Measurement)
            .unit(unit.unit_label(store.host().currency()))
            .display_precision(unit.display_precision());
        Self {
            description,
            store,
            schedule_entity_id: schedule_entity_id.to_string(),
            unit,
        }
    }

    pub fn schedule_entity_id(&self) -> &str {
        &self.schedule_entity_id
    }

    /// Rate for a given schedule state
    pub fn compute(&self, schedule: Option<&State>) -> CurrentRate {
        let (status, raw_cents) = select_rate(
            schedule.map(|s| s.state.as_str()),
            self.store.get_f64(keys::ON_PEAK_RATE, 0.0),
            self.store.get_f64(keys::OFF_PEAK_RATE, 0.0),
        );
        CurrentRate {
            status,
            raw_cents,
            value: self.unit.convert(raw_cents),
        }
    }

    /// Rate for the schedule state the host holds right now
    pub fn refresh(&self) -> CurrentRate {
        let schedule = self.store.host().state(&self.schedule_entity_id);
        self.compute(schedule.as_ref())
    }
}

impl SavingsEntity for CurrentRateSensor {
    fn description(&self) -> &EntityDescription {
        &self.description
    }

    fn state(&self) -> EntityState {
        let rate = self.refresh();
        let mut state = EntityState::new(EntityValue::Number(rate.value));
        state
            .attributes
            .insert("status".to_string(), Value::from(rate.status.as_str()));
        state
            .attributes
            .insert("raw_cents".to_string(), Value::from(rate.raw_cents));
        state
    }
}

pub enum SavingsSensor {
    ActiveSchedule(ActiveScheduleSensor),
    Rate(RateSensor),
    CurrentRate(CurrentRateSensor),
}

impl SavingsEntity for SavingsSensor {
    fn description(&self) -> &EntityDescription {
        match self {
            Self::ActiveSchedule(s) => s.description(),
            Self::Rate(s) => s.description(),
            Self::CurrentRate(s) => s.description(),
        }
    }

    fn state(&self) -> EntityState {
        match self {
            Self::ActiveSchedule(s) => s.state(),
            Self::Rate(s) => s.state(),
            Self::CurrentRate(s) => s.state(),
        }
    }
}

pub fn entities(store: &Arc<RateStore>) -> Vec<Adapter> {
    let sensor = |s: SavingsSensor| Adapter::Sensor(s);

    let mut adapters = vec![
        sensor(SavingsSensor::ActiveSchedule(ActiveScheduleSensor::new(
            Arc::clone(store),
        ))),
        sensor(SavingsSensor::Rate(RateSensor::static_rate(
            Arc::clone(store),
            "On Peak Rate",
            keys::ON_PEAK_RATE,
        ))),
        sensor(SavingsSensor::Rate(RateSensor::static_rate(
            Arc::clone(store),
            "Off Peak Rate",
            keys::OFF_PEAK_RATE,
        ))),
        sensor(SavingsSensor::Rate(RateSensor::export(
            Arc::clone(store),
            CurrencyUnit::Minor,
        ))),
        sensor(SavingsSensor::Rate(RateSensor::export(
            Arc::clone(store),
            CurrencyUnit::Major,
        ))),
    ];

    if let Some(schedule) = store
        .get_string(keys::PEAK_SCHEDULE)
        .filter(|s| s != NO_SCHEDULE)
    {
        for unit in [CurrencyUnit::Minor, CurrencyUnit::Major] {
            adapters.push(sensor(SavingsSensor::CurrentRate(CurrentRateSensor::new(
                Arc::clone(store),
                &schedule,
                unit,
            ))));
        }
    }

    adapters
}
