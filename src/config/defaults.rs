use super::*;

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/solar_savings.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            time_zone: "UTC".to_string(),
            currency: "USD".to_string(),
            schedules: BTreeMap::new(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            hour: 0,
            minute: 0,
            second: 1,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            entries_file: "/data/solar_savings_entries.json".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            host: HostConfig::default(),
            scheduler: SchedulerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}
