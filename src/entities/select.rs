//! Choice of the schedule that becomes active on the effective date

use super::{Adapter, EntityCategory, EntityDescription, EntityState, EntityValue, SavingsEntity};
use crate::error::{Result, SavingsError};
use crate::host::{Attributes, Platform};
use crate::keys;
use crate::store::RateStore;
use serde_json::Value;
use std::sync::Arc;

pub struct FutureScheduleSelect {
    description: EntityDescription,
    store: Arc<RateStore>,
}

impl FutureScheduleSelect {
    pub fn new(store: Arc<RateStore>) -> Self {
        let description = EntityDescription::new(
            &store.entry_id(),
            keys::FUTURE_PEAK_SCHEDULE,
            Platform::Select,
            "Future Peak Schedule",
        )
        .icon("mdi:calendar-refresh")
        .category(EntityCategory::Config);
        Self { description, store }
    }

    pub fn current_option(&self) -> Option<String> {
        self.store.option_string(keys::FUTURE_PEAK_SCHEDULE)
    }

    /// Known schedule objects, sorted; the stored choice is kept even if it no
    /// longer exists on the host
    pub fn options(&self) -> Vec<String> {
        let mut schedules = self.store.host().entity_ids(keys::SCHEDULE_DOMAIN);
        if let Some(current) = self.current_option()
            && !schedules.contains(&current)
        {
            schedules.push(current);
        }
        schedules.sort();
        schedules
    }

    pub async fn select_option(&self, option: &str) -> Result<()> {
        if !self.options().iter().any(|o| o == option) {
            return Err(SavingsError::validation(
                keys::FUTURE_PEAK_SCHEDULE,
                format!("'{option}' is not a known schedule"),
            ));
        }
        self.store
            .set_option(keys::FUTURE_PEAK_SCHEDULE, Value::from(option))
            .await?;
        Ok(())
    }
}

impl SavingsEntity for FutureScheduleSelect {
    fn description(&self) -> &EntityDescription {
        &self.description
    }

    fn state(&self) -> EntityState {
        EntityState::new(
            self.current_option()
                .map_or(EntityValue::Unknown, EntityValue::Text),
        )
    }

    fn capability_attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("options".to_string(), Value::from(self.options()));
        attributes
    }
}

pub fn entities(store: &Arc<RateStore>) -> Vec<Adapter> {
    vec![Adapter::Select(FutureScheduleSelect::new(Arc::clone(store)))]
}
