use std::fmt;
use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Region used when the configuration does not name one.
pub const DEFAULT_AWS_REGION: &str = "eu-west-1";

/// Service configuration. Immutable after load; shared by handle down the
/// supervision hierarchy.
///
/// Durations are humantime strings on the wire ("20s", "1m", "2h").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How often the manager re-expands the configured group patterns.
    #[serde(with = "humantime_duration")]
    pub group_refresh_frequency: Duration,
    /// How often each group supervisor re-enumerates its streams.
    #[serde(with = "humantime_duration")]
    pub stream_refresh_frequency: Duration,
    /// Cadence of the counter reports emitted by every component.
    #[serde(with = "humantime_duration")]
    pub report_frequency: Duration,
    /// Streams whose last event is older than this are not worth tailing.
    #[serde(with = "humantime_duration")]
    pub stream_event_horizon: Duration,
    /// Poll interval for streams that are not hot.
    #[serde(with = "humantime_duration")]
    pub stream_event_refresh_frequency: Duration,
    /// Streams with an event newer than this poll faster. Zero disables hot
    /// mode.
    #[serde(with = "humantime_duration")]
    pub hot_stream_event_horizon: Duration,
    /// Poll interval for hot streams. Must be set when hot mode is enabled.
    #[serde(with = "humantime_duration")]
    pub hot_stream_event_refresh_frequency: Duration,

    pub aws_region: String,
    /// Bucket for the persistent cursor registry. Empty selects the
    /// in-memory registry.
    pub s3_bucket_name: String,
    pub s3_key_prefix: String,

    pub prospectors: Vec<Prospector>,

    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group_refresh_frequency: Duration::from_secs(60),
            stream_refresh_frequency: Duration::from_secs(20),
            report_frequency: Duration::from_secs(60),
            stream_event_horizon: Duration::from_secs(600),
            stream_event_refresh_frequency: Duration::from_secs(5),
            hot_stream_event_horizon: Duration::ZERO,
            hot_stream_event_refresh_frequency: Duration::ZERO,
            aws_region: DEFAULT_AWS_REGION.to_string(),
            s3_bucket_name: String::new(),
            s3_key_prefix: String::new(),
            prospectors: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// A configured unit linking group patterns to an id and a multiline policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prospector {
    pub id: String,
    /// Plain group names, or prefixes with a trailing `*` wildcard.
    #[serde(default)]
    pub groupnames: Vec<String>,
    #[serde(default)]
    pub multiline: Option<Multiline>,
}

/// Multi-line stitching settings for one prospector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Multiline {
    pub pattern: String,
    #[serde(default)]
    pub negate: bool,
    #[serde(rename = "match")]
    pub match_mode: MatchMode,
}

/// Whether the boundary line belongs before or after the flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Before,
    After,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, config::FileFormat::Yaml));
            }
        }

        // Override with environment variables (CLOUDTAIL_AWS_REGION,
        // CLOUDTAIL_S3_BUCKET_NAME, CLOUDTAIL_LOGGING__LEVEL, ...)
        builder = builder.add_source(
            Environment::with_prefix("CLOUDTAIL")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// True when hot-stream polling is enabled.
    #[must_use]
    pub fn hot_streams_enabled(&self) -> bool {
        self.hot_stream_event_horizon > Duration::ZERO
    }

    /// Validate configuration at startup (fail fast on misconfigurations)
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // tickers need a positive period
        let frequencies = [
            ("group_refresh_frequency", self.group_refresh_frequency),
            ("stream_refresh_frequency", self.stream_refresh_frequency),
            ("report_frequency", self.report_frequency),
            (
                "stream_event_refresh_frequency",
                self.stream_event_refresh_frequency,
            ),
        ];
        for (name, frequency) in frequencies {
            if frequency == Duration::ZERO {
                errors.push(format!("{name} must be greater than 0"));
            }
        }

        if self.hot_stream_event_horizon > Duration::ZERO
            && self.hot_stream_event_refresh_frequency == Duration::ZERO
        {
            errors.push(format!(
                "hot_stream_event_refresh_frequency can not be zero while hot_stream_event_horizon={}",
                humantime::format_duration(self.hot_stream_event_horizon)
            ));
        }

        for prospector in &self.prospectors {
            if prospector.id.is_empty() {
                errors.push("prospector id must not be empty".to_string());
            }
            if let Some(multiline) = &prospector.multiline {
                if let Err(e) = regex::Regex::new(&multiline.pattern) {
                    errors.push(format!(
                        "prospector {}: invalid multiline pattern: {e}",
                        prospector.id
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "settings: s3_bucket_name={}|s3_key_prefix={}|aws_region={}\
             |group_refresh_frequency={}|stream_refresh_frequency={}|report_frequency={}\
             |stream_event_horizon={}|stream_event_refresh_frequency={}\
             |hot_stream_event_horizon={}|hot_stream_event_refresh_frequency={}",
            self.s3_bucket_name,
            self.s3_key_prefix,
            self.aws_region,
            humantime::format_duration(self.group_refresh_frequency),
            humantime::format_duration(self.stream_refresh_frequency),
            humantime::format_duration(self.report_frequency),
            humantime::format_duration(self.stream_event_horizon),
            humantime::format_duration(self.stream_event_refresh_frequency),
            humantime::format_duration(self.hot_stream_event_horizon),
            humantime::format_duration(self.hot_stream_event_refresh_frequency),
        )
    }
}

/// Serde adapter for humantime duration strings.
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
