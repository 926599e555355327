//! Effective date of the pending rate change

use super::{Adapter, EntityCategory, EntityDescription, EntityState, EntityValue, SavingsEntity};
use crate::error::Result;
use crate::host::Platform;
use crate::keys;
use crate::store::RateStore;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;

pub struct EffectiveDate {
    description: EntityDescription,
    store: Arc<RateStore>,
}

impl EffectiveDate {
    pub fn new(store: Arc<RateStore>) -> Self {
        let description = EntityDescription::new(
            &store.entry_id(),
            keys::SCHEDULED_DATE,
            Platform::Date,
            "Effective Date",
        )
        .icon("mdi:calendar-clock")
        .category(EntityCategory::Config);
        Self { description, store }
    }

    pub fn native_value(&self) -> Option<NaiveDate> {
        self.store.scheduled_date()
    }

    pub async fn set_value(&self, value: NaiveDate) -> Result<()> {
        self.store
            .set_option(keys::SCHEDULED_DATE, Value::from(value.to_string()))
            .await?;
        Ok(())
    }
}

impl SavingsEntity for EffectiveDate {
    fn description(&self) -> &EntityDescription {
        &self.description
    }

    fn state(&self) -> EntityState {
        EntityState::new(
            self.native_value()
                .map_or(EntityValue::Unknown, EntityValue::Date),
        )
    }
}

pub fn entities(store: &Arc<RateStore>) -> Vec<Adapter> {
    vec![Adapter::Date(EffectiveDate::new(Arc::clone(store)))]
}
