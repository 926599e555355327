//! Editable future rates

use super::{
    Adapter, DeviceClass, EntityCategory, EntityDescription, EntityState, EntityValue,
    SavingsEntity,
};
use crate::error::{Result, SavingsError};
use crate::host::{Attributes, Platform};
use crate::keys;
use crate::store::RateStore;
use serde_json::Value;
use std::sync::Arc;

pub const MIN_VALUE: f64 = 0.0;
pub const MAX_VALUE: f64 = 1000.0;
pub const STEP: f64 = 0.001;

/// Future rate editor; writes straight into the entry options
pub struct RateNumber {
    description: EntityDescription,
    store: Arc<RateStore>,
    key: &'static str,
}

impl RateNumber {
    pub fn new(store: Arc<RateStore>, name: &'static str, key: &'static str) -> Self {
        let description = EntityDescription::new(&store.entry_id(), key, Platform::Number, name)
            .icon("mdi:currency-usd")
            .category(EntityCategory::Config)
            .device_class(DeviceClass::Monetary)
            .unit(keys::CENTS_PER_KWH);
        Self {
            description,
            store,
            key,
        }
    }

    pub const fn key(&self) -> &'static str {
        self.key
    }

    pub fn native_value(&self) -> f64 {
        self.store.get_f64(self.key, 0.0)
    }

    pub async fn set_native_value(&self, value: f64) -> Result<()> {
        if !value.is_finite() || !(MIN_VALUE..=MAX_VALUE).contains(&value) {
            return Err(SavingsError::validation(
                self.key,
                format!("{value} is outside {MIN_VALUE}..={MAX_VALUE}"),
            ));
        }
        self.store.set_option(self.key, Value::from(value)).await?;
        Ok(())
    }
}

impl SavingsEntity for RateNumber {
    fn description(&self) -> &EntityDescription {
        &self.description
    }

    fn state(&self) -> EntityState {
        EntityState::new(EntityValue::Number(self.native_value()))
    }

    fn capability_attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("min".to_string(), Value::from(MIN_VALUE));
        attributes.insert("max".to_string(), Value::from(MAX_VALUE));
        attributes.insert("step".to_string(), Value::from(STEP));
        attributes.insert("mode".to_string(), Value::from("box"));
        attributes
    }
}

pub fn entities(store: &Arc<RateStore>) -> Vec<Adapter> {
    [
        ("Future On Peak", keys::FUTURE_ON_PEAK_RATE),
        ("Future Off Peak", keys::FUTURE_OFF_PEAK_RATE),
        ("Future Export Rate", keys::FUTURE_EXPORT_RATE),
    ]
    .into_iter()
    .map(|(name, key)| Adapter::Number(RateNumber::new(Arc::clone(store), name, key)))
    .collect()
}
