use crate::service::calculator;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// Decimal out as a plain JSON number
pub fn serialize<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    // Parsing the decimal text gives the nearest double, so cents print as entered.
    let number = value
        .to_string()
        .parse::<f64>()
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_f64(number)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    calculator::coerce(&raw).map_err(serde::de::Error::custom)
}

/// Keeps an explicit `null` distinguishable from an absent field.
pub fn deserialize_some<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::str::FromStr;

    #[derive(Serialize, Deserialize)]
    struct Holder {
        #[serde(serialize_with = "serialize", deserialize_with = "deserialize")]
        amount: BigDecimal,
    }

    #[test]
    fn amounts_serialize_as_numbers() {
        let holder = Holder {
            amount: BigDecimal::from_str("1234.50").unwrap(),
        };
        let json = serde_json::to_value(&holder).unwrap();
        assert_eq!(json["amount"], serde_json::json!(1234.5));
    }

    #[test]
    fn rounded_cents_serialize_without_float_noise() {
        for (raw, expected) in [
            ("0.30", "0.3"),
            ("0.35", "0.35"),
            ("0.57", "0.57"),
            ("1234.10", "1234.1"),
            ("-0.07", "-0.07"),
        ] {
            let holder = Holder {
                amount: BigDecimal::from_str(raw).unwrap(),
            };
            assert_eq!(
                serde_json::to_string(&holder).unwrap(),
                format!("{{\"amount\":{}}}", expected)
            );
        }
    }

    #[test]
    fn amounts_deserialize_from_formatted_strings() {
        let holder: Holder = serde_json::from_str(r#"{"amount": "1 234,50"}"#).unwrap();
        assert_eq!(holder.amount, BigDecimal::from_str("1234.50").unwrap());
    }
}
