//! Typed domain models decoded from native completion payloads.

pub mod eligibility;
pub mod offerings;
pub mod product;
pub mod purchase;
pub mod purchaser_info;

pub use eligibility::{IntroEligibility, IntroEligibilityStatus};
pub use offerings::{Offering, Offerings, Package, PackageType};
pub use product::{IntroPrice, Product};
pub use purchase::{PurchaseFailure, PurchaseResult};
pub use purchaser_info::{EntitlementInfo, EntitlementInfos, PeriodType, PurchaserInfo, Store};

/// Reads an explicit `null` the same as a missing field.
pub(crate) mod nullable {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
    }
}

/// Serde adapters for millisecond-epoch timestamps.
pub(crate) mod millis {
    use std::collections::HashMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use time::OffsetDateTime;

    fn from_millis<E: serde::de::Error>(millis: f64) -> Result<OffsetDateTime, E> {
        let nanos = (millis * 1_000_000.0).round() as i128;
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|err| E::custom(format!("timestamp {millis} out of range: {err}")))
    }

    fn to_millis(value: &OffsetDateTime) -> i64 {
        (value.unix_timestamp_nanos() / 1_000_000) as i64
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<OffsetDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            value.as_ref().map(to_millis).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<OffsetDateTime>, D::Error> {
            Option::<f64>::deserialize(deserializer)?
                .map(from_millis::<D::Error>)
                .transpose()
        }
    }

    pub mod map {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &HashMap<String, Option<OffsetDateTime>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            value
                .iter()
                .map(|(key, date)| (key, date.as_ref().map(to_millis)))
                .collect::<HashMap<_, _>>()
                .serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<HashMap<String, Option<OffsetDateTime>>, D::Error> {
            Option::<HashMap<String, Option<f64>>>::deserialize(deserializer)?
                .unwrap_or_default()
                .into_iter()
                .map(|(key, millis)| -> Result<_, D::Error> {
                    Ok((key, millis.map(from_millis::<D::Error>).transpose()?))
                })
                .collect()
        }
    }
}
