//! Durations in configuration files.
//!
//! Values may be humantime strings (`"6s"`, `"500ms"`, `"1m30s"`) or a plain,
//! non-negative number of seconds (`6`, `2.5`). They are written back as
//! humantime strings.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serializer};
use std::{fmt, time::Duration};

fn humanize(value: Duration) -> String {
    humantime::format_duration(value).to_string()
}

/// Reads either representation into a `Duration`
struct SecondsOrHuman;

impl<'de> Visitor<'de> for SecondsOrHuman {
    type Value = Duration;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("seconds as a number, or a duration string such as '6s' or '15m'")
    }

    fn visit_u64<E: de::Error>(self, seconds: u64) -> Result<Duration, E> {
        Ok(Duration::from_secs(seconds))
    }

    fn visit_i64<E: de::Error>(self, seconds: i64) -> Result<Duration, E> {
        match u64::try_from(seconds) {
            Ok(seconds) => self.visit_u64(seconds),
            Err(_) => Err(E::custom(format!("duration must not be negative, got {seconds}"))),
        }
    }

    fn visit_f64<E: de::Error>(self, seconds: f64) -> Result<Duration, E> {
        Duration::try_from_secs_f64(seconds)
            .map_err(|e| E::custom(format!("duration {seconds} is out of range: {e}")))
    }

    fn visit_str<E: de::Error>(self, text: &str) -> Result<Duration, E> {
        humantime::parse_duration(text.trim())
            .map_err(|e| E::custom(format!("cannot parse duration '{text}': {e}")))
    }
}

/// `#[serde(with = "duration")]` for `Duration` fields
pub mod duration {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humanize(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        deserializer.deserialize_any(SecondsOrHuman)
    }
}

/// `#[serde(with = "option_duration")]` for optional durations; pair with `skip_serializing_if`
pub mod option_duration {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapped(#[serde(with = "super::duration")] Duration);

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(&humanize(*value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(value)| value))
    }
}
