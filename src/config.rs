use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default backend base URL when neither the CLI nor saved prefs name one
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

/// Scale applied to the wire format's loss field before display.
///
/// Backend versions disagree on the fixed-point scale, so this is a setting
/// rather than something inferred from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossScale {
    /// `value / 1000` (mtr split format, loss in thousandths of a percent)
    #[default]
    Thousandths,
    /// `round(value / 100) / 10`, one decimal place
    Tenths,
}

impl LossScale {
    /// Render a raw loss field as a percentage string.
    ///
    /// Non-numeric input is passed through untouched.
    pub fn format(&self, raw: &str) -> String {
        let Ok(value) = raw.parse::<i64>() else {
            return raw.to_string();
        };
        let value = value as f64;
        let pct = match self {
            Self::Thousandths => value / 1000.0,
            Self::Tenths => (value / 100.0).round() / 10.0,
        };
        format!("{}%", pct)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Thousandths => "thousandths",
            Self::Tenths => "tenths",
        }
    }
}

impl std::str::FromStr for LossScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "thousandths" | "1000" => Ok(Self::Thousandths),
            "tenths" | "100" => Ok(Self::Tenths),
            other => Err(format!(
                "Unknown loss scale: {}. Use thousandths or tenths",
                other
            )),
        }
    }
}

/// Runtime configuration derived from CLI args and saved preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend base URL, e.g. http://host:5000
    pub server: String,
    /// Time allowed to get a response (status + headers) back
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Maximum gap between two successful body reads
    #[serde(with = "duration_serde")]
    pub read_timeout: Duration,
    /// Highest hop index kept in the hop table
    pub max_hops: u8,
    /// Loss field scale
    pub loss_scale: LossScale,
    /// Spinner tick period
    #[serde(with = "duration_serde")]
    pub tick_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            max_hops: 30,
            loss_scale: LossScale::Thousandths,
            tick_interval: Duration::from_millis(200),
        }
    }
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
