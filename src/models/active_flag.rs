//! Wire format of the active flag.
//!
//! Records carry the flag as a `bool`, but stored data and the frontend use the
//! string literals `"true"` / `"false"`. Serialization always emits the string;
//! deserialization accepts either the string literal or a JSON boolean.

use serde::de::{self, Unexpected};
use serde::{Deserialize, Deserializer, Serializer};

const TRUE: &str = "true";
const FALSE: &str = "false";

#[derive(Deserialize)]
#[serde(untagged)]
enum WireFlag {
    Bool(bool),
    Text(String),
}

impl WireFlag {
    fn into_bool<E: de::Error>(self) -> Result<bool, E> {
        match self {
            WireFlag::Bool(value) => Ok(value),
            WireFlag::Text(text) => parse(&text)
                .ok_or_else(|| E::invalid_value(Unexpected::Str(&text), &"\"true\" or \"false\"")),
        }
    }
}

/// Render the flag the way it is stored.
pub fn as_str(value: bool) -> &'static str {
    if value {
        TRUE
    } else {
        FALSE
    }
}

/// Parse a stored flag literal.
pub fn parse(text: &str) -> Option<bool> {
    match text {
        TRUE => Some(true),
        FALSE => Some(false),
        _ => None,
    }
}

pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(as_str(*value))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    WireFlag::deserialize(deserializer)?.into_bool()
}

/// Variant for optional request fields; pair with `#[serde(default)]`.
pub mod option {
    use super::WireFlag;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<bool>, D::Error> {
        Option::<WireFlag>::deserialize(deserializer)?
            .map(WireFlag::into_bool)
            .transpose()
    }
}
