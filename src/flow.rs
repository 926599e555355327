//! Setup and options forms
//!
//! Both forms share one small schema layer: float fields accept anything that
//! coerces to a float, schedule fields must name a `schedule.*` object the host
//! currently knows. A submit with any field error saves nothing and returns
//! the form again with per-field error codes.

use crate::error::{Result, SavingsError};
use crate::host::Host;
use crate::keys;
use crate::logging::{LogContext, get_logger, get_logger_with_context};
use crate::store::{ConfigEntry, OptionsMap};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const FLOW_VERSION: u32 = keys::ENTRY_VERSION;

pub const ERROR_INVALID_NUMBER: &str = "invalid_number";
pub const ERROR_REQUIRED: &str = "required";
pub const ERROR_UNKNOWN_SCHEDULE: &str = "unknown_schedule";

/// Field key to error code
pub type FormErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    /// Entity id in the `schedule` domain
    Schedule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub key: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Used when the field is missing from the submission
    pub default: Option<Value>,
    /// Pre-filled in the form but never applied implicitly
    pub suggested: Option<Value>,
}

impl FormField {
    fn float(key: &'static str, default: f64) -> Self {
        Self {
            key,
            kind: FieldKind::Float,
            required: false,
            default: Some(Value::from(default)),
            suggested: None,
        }
    }

    fn schedule(key: &'static str, required: bool, suggested: Option<String>) -> Self {
        Self {
            key,
            kind: FieldKind::Schedule,
            required,
            default: None,
            suggested: suggested.map(Value::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormSchema {
    pub step_id: &'static str,
    pub fields: Vec<FormField>,
}

impl FormSchema {
    pub fn field(&self, key: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Coerce and check a submission. Keys the schema does not name are dropped.
    pub fn validate(
        &self,
        input: &OptionsMap,
        schedules: &[String],
    ) -> std::result::Result<OptionsMap, FormErrors> {
        let mut output = OptionsMap::new();
        let mut errors = FormErrors::new();

        for field in &self.fields {
            let submitted = input.get(field.key);
            match field.kind {
                FieldKind::Float => match submitted {
                    Some(value) => match coerce_float(value) {
                        Some(f) => {
                            output.insert(field.key.to_string(), Value::from(f));
                        }
                        None => {
                            errors.insert(field.key.to_string(), ERROR_INVALID_NUMBER.to_string());
                        }
                    },
                    None => {
                        if let Some(default) = &field.default {
                            output.insert(field.key.to_string(), default.clone());
                        } else if field.required {
                            errors.insert(field.key.to_string(), ERROR_REQUIRED.to_string());
                        }
                    }
                },
                FieldKind::Schedule => match submitted {
                    None | Some(Value::Null) => {
                        if field.required {
                            errors.insert(field.key.to_string(), ERROR_REQUIRED.to_string());
                        }
                    }
                    Some(Value::String(s)) if s.is_empty() && field.required => {
                        errors.insert(field.key.to_string(), ERROR_REQUIRED.to_string());
                    }
                    Some(Value::String(s)) if schedules.iter().any(|known| known == s) => {
                        output.insert(field.key.to_string(), Value::from(s.as_str()));
                    }
                    Some(_) => {
                        errors.insert(field.key.to_string(), ERROR_UNKNOWN_SCHEDULE.to_string());
                    }
                },
            }
        }

        if errors.is_empty() {
            Ok(output)
        } else {
            Err(errors)
        }
    }
}

/// Float coercion for form values: numbers, numeric strings and booleans
pub fn coerce_float(value: &Value) -> Option<f64> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => return None,
    };
    f.is_finite().then_some(f)
}

/// What a flow step produced
#[derive(Debug, Clone, PartialEq)]
pub enum FlowResult {
    /// Show (or re-show) the form
    ShowForm {
        schema: FormSchema,
        errors: FormErrors,
    },
    /// The setup step created a new entry
    CreateEntry(ConfigEntry),
    /// The options step wrote a new options mapping; `changed` is the host's verdict
    OptionsSaved { options: OptionsMap, changed: bool },
}

/// Initial setup of a new entry
pub struct ConfigFlow {
    host: Arc<dyn Host>,
}

impl ConfigFlow {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self { host }
    }

    pub fn schema() -> FormSchema {
        FormSchema {
            step_id: "user",
            fields: vec![
                FormField::schedule(keys::PEAK_SCHEDULE, true, None),
                FormField::float(keys::ON_PEAK_RATE, 0.0),
                FormField::float(keys::OFF_PEAK_RATE, 0.0),
                FormField::float(keys::EXPORT_RATE, 0.0),
            ],
        }
    }

    /// `None` asks for the empty form; a submission creates the entry
    pub async fn step_user(&self, user_input: Option<OptionsMap>) -> Result<FlowResult> {
        let schema = Self::schema();
        let Some(input) = user_input else {
            return Ok(FlowResult::ShowForm {
                schema,
                errors: FormErrors::new(),
            });
        };

        let schedules = self.host.entity_ids(keys::SCHEDULE_DOMAIN);
        match schema.validate(&input, &schedules) {
            Ok(data) => {
                let entry = self
                    .host
                    .create_entry(keys::DOMAIN, keys::ENTRY_TITLE, data)
                    .await?;
                Ok(FlowResult::CreateEntry(entry))
            }
            Err(errors) => {
                get_logger("flow").debug(&format!("Setup form rejected: {errors:?}"));
                Ok(FlowResult::ShowForm { schema, errors })
            }
        }
    }
}

/// Editing the options of an existing entry
pub struct OptionsFlow {
    host: Arc<dyn Host>,
    entry_id: String,
}

impl OptionsFlow {
    pub fn new(host: Arc<dyn Host>, entry_id: &str) -> Self {
        Self {
            host,
            entry_id: entry_id.to_string(),
        }
    }

    fn entry(&self) -> Result<ConfigEntry> {
        self.host.config_entry(&self.entry_id).ok_or_else(|| {
            SavingsError::host(format!("Config entry {} not found", self.entry_id))
        })
    }

    /// Form pre-filled from options, else data, else zero
    pub fn schema(entry: &ConfigEntry) -> FormSchema {
        let current = |key: &'static str| FormField::float(key, entry.get_f64(key, 0.0));
        FormSchema {
            step_id: "init",
            fields: vec![
                FormField::schedule(
                    keys::PEAK_SCHEDULE,
                    false,
                    entry.get_str(keys::PEAK_SCHEDULE).map(str::to_string),
                ),
                current(keys::ON_PEAK_RATE),
                current(keys::OFF_PEAK_RATE),
                current(keys::EXPORT_RATE),
            ],
        }
    }

    /// `None` asks for the pre-filled form; a submission replaces the options
    pub async fn step_init(&self, user_input: Option<OptionsMap>) -> Result<FlowResult> {
        let entry = self.entry()?;
        let schema = Self::schema(&entry);
        let Some(input) = user_input else {
            return Ok(FlowResult::ShowForm {
                schema,
                errors: FormErrors::new(),
            });
        };

        let logger = get_logger_with_context(LogContext::new("flow").with_entry_id(&self.entry_id));
        let schedules = self.host.entity_ids(keys::SCHEDULE_DOMAIN);
        match schema.validate(&input, &schedules) {
            Ok(options) => {
                let changed = self
                    .host
                    .update_entry_options(&self.entry_id, options.clone())
                    .await?;
                logger.info(&format!("Options submitted (changed: {changed})"));
                Ok(FlowResult::OptionsSaved { options, changed })
            }
            Err(errors) => {
                logger.debug(&format!("Options form rejected: {errors:?}"));
                Ok(FlowResult::ShowForm { schema, errors })
            }
        }
    }
}
