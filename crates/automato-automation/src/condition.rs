//! Trigger conditions
//!
//! A trigger instance compiles its arguments into a [`Condition`] once, when
//! the instance is registered. Evaluating the condition never fails; problems
//! are logged and count as "not met".

use automato_core::EndpointRegistry;
use chrono::{DateTime, Datelike, Local, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Deserializer};
use tracing::{debug, trace, warn};

use crate::expr::Expression;

/// Compiled instance arguments
#[derive(Debug, Clone)]
pub enum Condition {
    /// Every expression must be truthy, checked in order
    Expressions(Vec<Expression>),
    /// Local time of day and weekday
    Time(TimeWindow),
}

impl Condition {
    pub async fn evaluate(&self, endpoints: &EndpointRegistry, now: DateTime<Utc>) -> bool {
        match self {
            Condition::Expressions(expressions) => {
                for expression in expressions {
                    match expression.evaluate(endpoints).await {
                        Ok(value) if value.is_truthy() => {
                            trace!(expression = %expression, %value, "Expression met");
                        }
                        Ok(value) => {
                            debug!(expression = %expression, %value, "Expression not met");
                            return false;
                        }
                        Err(e) => {
                            warn!(expression = %expression, error = %e, "Expression failed");
                            return false;
                        }
                    }
                }
                true
            }
            Condition::Time(window) => window.contains(&now.with_timezone(&Local)),
        }
    }
}

/// `after`/`before`/`weekday` window
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeWindow {
    /// Inclusive lower bound
    #[serde(default, deserialize_with = "deserialize_time")]
    pub after: Option<NaiveTime>,

    /// Exclusive upper bound
    #[serde(default, deserialize_with = "deserialize_time")]
    pub before: Option<NaiveTime>,

    /// Empty means every day
    #[serde(default)]
    pub weekday: Vec<WeekdaySpec>,
}

impl TimeWindow {
    pub fn contains<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        let current_time = now.time();
        let current_weekday = now.weekday();

        if !self.weekday.is_empty()
            && !self
                .weekday
                .iter()
                .any(|w| Weekday::from(*w) == current_weekday)
        {
            trace!(?current_weekday, "Weekday doesn't match");
            return false;
        }

        if let Some(after) = self.after {
            if current_time < after {
                trace!(?current_time, ?after, "Current time is before 'after'");
                return false;
            }
        }

        if let Some(before) = self.before {
            if current_time >= before {
                trace!(?current_time, ?before, "Current time is at or after 'before'");
                return false;
            }
        }

        true
    }
}

/// `HH:MM` or `HH:MM:SS`
fn deserialize_time<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    NaiveTime::parse_from_str(&text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&text, "%H:%M"))
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("invalid time '{}'", text)))
}

/// Weekday specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekdaySpec {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl From<WeekdaySpec> for Weekday {
    fn from(w: WeekdaySpec) -> Self {
        match w {
            WeekdaySpec::Mon => Weekday::Mon,
            WeekdaySpec::Tue => Weekday::Tue,
            WeekdaySpec::Wed => Weekday::Wed,
            WeekdaySpec::Thu => Weekday::Thu,
            WeekdaySpec::Fri => Weekday::Fri,
            WeekdaySpec::Sat => Weekday::Sat,
            WeekdaySpec::Sun => Weekday::Sun,
        }
    }
}
