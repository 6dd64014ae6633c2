use std::env;
use std::io;
use std::path::Path;

use chrono::{Duration, FixedOffset, NaiveTime};
use log::LevelFilter;
use prediction_contest_core::CutoffRules;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

macro_rules! from_environment {
    ($config:expr, $($key:expr, $name:tt),*$(,)?) => {{
        $(
            {
                if let Ok(value) = env::var($key) {
                    if let Ok(value) = value.parse() {
                        $config.$name = value;
                    }
                }
            }
        )*
    }};
}

macro_rules! from_environment_error {
    ($config:expr, $($key:expr, $name:tt),*$(,)?) => {{
        $(
            let value = env::var($key).map_err(|_| ConfigError::MissingField($key))?;
            $config.$name = value.parse().map_err(|_| ConfigError::MissingField($key))?;
        )*
    }};
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub database: Database,
    pub loglevel: LevelFilter,
    #[serde(default)]
    pub rules: Rules,
}

impl Config {
    pub async fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let mut file = File::open(path).await?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;

        Ok(toml::from_slice(&buf)?)
    }

    /// Creates a complete [`Config`] instance from the environment. The contest rules fall
    /// back to their defaults.
    pub fn from_environment() -> Result<Self, ConfigError> {
        let mut this = Self::default();

        from_environment_error!(this, "PC_LOGLEVEL", loglevel);

        this.database = Database::from_environment()?;
        this.rules = this.rules.with_environment();

        Ok(this)
    }

    pub fn with_environment(mut self) -> Self {
        from_environment!(self, "PC_LOGLEVEL", loglevel);
        self.database = self.database.with_environment();
        self.rules = self.rules.with_environment();

        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: Database::default(),
            loglevel: LevelFilter::Info,
            rules: Rules::default(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Database {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub prefix: String,
}

impl Database {
    pub fn connect_string(&self) -> String {
        format!(
            "{}://{}:{}@{}:{}/{}?ssl-mode=DISABLED",
            self.driver, self.user, self.password, self.host, self.port, self.database
        )
    }

    pub fn from_environment() -> Result<Self, ConfigError> {
        let mut this = Self::default();

        from_environment_error!(
            this,
            "PC_DB_DRIVER",
            driver,
            "PC_DB_HOST",
            host,
            "PC_DB_PORT",
            port,
            "PC_DB_USER",
            user,
            "PC_DB_PASSWORD",
            password,
            "PC_DB_DATABASE",
            database,
            "PC_DB_PREFIX",
            prefix,
        );

        Ok(this)
    }

    pub fn with_environment(mut self) -> Self {
        from_environment!(
            self,
            "PC_DB_DRIVER",
            driver,
            "PC_DB_HOST",
            host,
            "PC_DB_PORT",
            port,
            "PC_DB_USER",
            user,
            "PC_DB_PASSWORD",
            password,
            "PC_DB_DATABASE",
            database,
            "PC_DB_PREFIX",
            prefix,
        );

        self
    }
}

// Keeps the password out of the startup log.
impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Timing rules of the contest. Offsets and durations are given in minutes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Minutes east of UTC of the timezone partitioning match days.
    pub match_day_offset: i32,
    pub lead_time: i64,
    /// Minutes east of UTC of the timezone of the daily cutoff.
    pub daily_cutoff_offset: i32,
    pub daily_cutoff_time: NaiveTime,
    pub opening_window: i64,
    pub reminder_lead: i64,
}

impl Rules {
    pub fn with_environment(mut self) -> Self {
        from_environment!(
            self,
            "PC_RULES_MATCH_DAY_OFFSET",
            match_day_offset,
            "PC_RULES_LEAD_TIME",
            lead_time,
            "PC_RULES_DAILY_CUTOFF_OFFSET",
            daily_cutoff_offset,
            "PC_RULES_DAILY_CUTOFF_TIME",
            daily_cutoff_time,
            "PC_RULES_OPENING_WINDOW",
            opening_window,
            "PC_RULES_REMINDER_LEAD",
            reminder_lead,
        );

        self
    }

    /// Converts the configured values into [`CutoffRules`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] if an offset is a day or more away from UTC or a
    /// duration is negative.
    pub fn cutoff_rules(&self) -> Result<CutoffRules, ConfigError> {
        Ok(CutoffRules {
            match_day_offset: offset(self.match_day_offset, "rules.match_day_offset")?,
            lead_time: minutes(self.lead_time, "rules.lead_time")?,
            daily_cutoff_offset: offset(self.daily_cutoff_offset, "rules.daily_cutoff_offset")?,
            daily_cutoff_time: self.daily_cutoff_time,
            opening_window: minutes(self.opening_window, "rules.opening_window")?,
            reminder_lead: minutes(self.reminder_lead, "rules.reminder_lead")?,
        })
    }
}

impl Default for Rules {
    fn default() -> Self {
        let rules = CutoffRules::default();

        Self {
            match_day_offset: rules.match_day_offset.local_minus_utc() / 60,
            lead_time: rules.lead_time.num_minutes(),
            daily_cutoff_offset: rules.daily_cutoff_offset.local_minus_utc() / 60,
            daily_cutoff_time: rules.daily_cutoff_time,
            opening_window: rules.opening_window.num_minutes(),
            reminder_lead: rules.reminder_lead.num_minutes(),
        }
    }
}

fn offset(minutes: i32, field: &'static str) -> Result<FixedOffset, ConfigError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or(ConfigError::InvalidField(field))
}

fn minutes(value: i64, field: &'static str) -> Result<Duration, ConfigError> {
    if value < 0 {
        return Err(ConfigError::InvalidField(field));
    }

    Ok(Duration::minutes(value))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("missing config field: {0}")]
    MissingField(&'static str),
    #[error("invalid config field: {0}")]
    InvalidField(&'static str),
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveTime};
    use log::LevelFilter;
    use prediction_contest_core::CutoffRules;

    use super::{Config, ConfigError, Rules};

    #[test]
    fn test_config_parse() {
        let input = r#"
            loglevel = "debug"

            [database]
            driver = "mysql"
            host = "127.0.0.1"
            port = 3306
            user = "contest"
            password = "secret"
            database = "contest"
            prefix = "pc_"

            [rules]
            lead_time = 240
            daily_cutoff_time = "18:30:00"
        "#;

        let config: Config = toml::from_str(input).unwrap();
        assert_eq!(config.loglevel, LevelFilter::Debug);
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.prefix, "pc_");
        assert!(!format!("{:?}", config.database).contains("secret"));

        let rules = config.rules.cutoff_rules().unwrap();
        assert_eq!(rules.lead_time, Duration::hours(4));
        assert_eq!(rules.daily_cutoff_time, NaiveTime::from_hms_opt(18, 30, 0).unwrap());
        assert_eq!(rules.match_day_offset.local_minus_utc(), 345 * 60);
        assert_eq!(rules.opening_window, Duration::hours(24));
    }

    #[test]
    fn test_rules_default() {
        assert_eq!(
            Rules::default().cutoff_rules().unwrap(),
            CutoffRules::default()
        );

        let rules = Rules::default();
        assert_eq!(rules.match_day_offset, 345);
        assert_eq!(rules.daily_cutoff_offset, -360);
        assert_eq!(rules.lead_time, 360);
    }

    #[test]
    fn test_rules_invalid() {
        let rules = Rules {
            match_day_offset: 24 * 60,
            ..Default::default()
        };
        assert!(matches!(
            rules.cutoff_rules(),
            Err(ConfigError::InvalidField("rules.match_day_offset"))
        ));

        let rules = Rules {
            lead_time: -1,
            ..Default::default()
        };
        assert!(rules.cutoff_rules().is_err());
    }
}
