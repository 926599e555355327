//! Option keys, entity suffixes and fixed labels shared across the crate

/// Integration domain, used for device identifiers and entry ownership
pub const DOMAIN: &str = "solar_savings";

/// Host domain of the schedule objects the peak schedule refers to
pub const SCHEDULE_DOMAIN: &str = "schedule";

/// State value of a schedule object whose window is currently active
pub const STATE_ON: &str = "on";

pub const ENTRY_TITLE: &str = "Solar Savings";
pub const ENTRY_VERSION: u32 = 1;

pub const DEVICE_NAME: &str = "Solar Savings";
pub const DEVICE_MANUFACTURER: &str = "Solar Savings Integration";
pub const DEVICE_MODEL: &str = "Savings Calculator";

pub const ON_PEAK_RATE: &str = "on_peak_rate";
pub const OFF_PEAK_RATE: &str = "off_peak_rate";
pub const EXPORT_RATE: &str = "export_rate";
pub const FUTURE_ON_PEAK_RATE: &str = "future_on_peak_rate";
pub const FUTURE_OFF_PEAK_RATE: &str = "future_off_peak_rate";
pub const FUTURE_EXPORT_RATE: &str = "future_export_rate";
pub const PEAK_SCHEDULE: &str = "peak_schedule";
pub const FUTURE_PEAK_SCHEDULE: &str = "future_peak_schedule";
pub const SCHEDULED_DATE: &str = "scheduled_date";

/// (future key, current key) pairs promoted on the effective date
pub const RATE_PROMOTIONS: [(&str, &str); 3] = [
    (FUTURE_ON_PEAK_RATE, ON_PEAK_RATE),
    (FUTURE_OFF_PEAK_RATE, OFF_PEAK_RATE),
    (FUTURE_EXPORT_RATE, EXPORT_RATE),
];

/// Unit label for rates in minor currency units
pub const CENTS_PER_KWH: &str = "c/kWh";

/// Minor units per major currency unit
pub const MINOR_PER_MAJOR: f64 = 100.0;
