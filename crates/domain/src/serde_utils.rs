//! Serialization helpers for config durations
//!
//! Every duration in Bulwark configuration files is written in milliseconds.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serde adapter for `Duration` as milliseconds (u64)
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use bulwark_domain::serde_utils::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_millis")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::{Deserialize, Deserializer, Duration, Serializer};

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serde adapter for `Option<Duration>` as optional milliseconds
///
/// Use together with `#[serde(default)]` so a missing key reads as `None`.
pub mod option_duration_millis {
    use super::{Deserialize, Deserializer, Duration, Serializer};

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer
                .serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
