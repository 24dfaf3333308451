use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, Postgres, Type};

static KYRGYZ_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^| +)(?:\( *)?(?:(?:\+?996|0) *(?:- *)?)?(?:\( *)?(\d{3})(?: *\))? *(?:- *)?((?:\d *(?:- *)?){6})(?: +|$)",
    )
    .expect("phone number regex is valid")
});
static NON_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9]+").expect("non-digit regex is valid"));

/// Phone number validation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneNumberError {
    #[error("wrong phone number format: {0}")]
    InvalidFormat(String),
}

impl PhoneNumberError {
    /// Message code for the localizer
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) => "exception:wrong-phone-number-format",
        }
    }
}

/// A phone number stored as text
///
/// Accepts either a plain JSON string or `{"Number": "..."}` and always
/// serializes back to the plain string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PhoneNumber {
    number: String,
}

impl PhoneNumber {
    /// Normalize `number` to its digits, optionally checking the local format first
    pub fn new(number: &str, validate: bool) -> Result<Self, PhoneNumberError> {
        if validate && !Self::is_valid(number) {
            return Err(PhoneNumberError::InvalidFormat(number.to_string()));
        }
        Ok(Self {
            number: Self::digits(number),
        })
    }

    /// Whether `number` looks like a Kyrgyz mobile or landline number
    pub fn is_valid(number: &str) -> bool {
        KYRGYZ_NUMBER.is_match(number)
    }

    pub fn as_str(&self) -> &str {
        &self.number
    }

    pub fn into_inner(self) -> String {
        self.number
    }

    fn digits(number: &str) -> String {
        NON_DIGITS.replace_all(number, "").into_owned()
    }

    /// Collapse a `{"Number": ...}` payload value to its digits string
    ///
    /// Any other value is returned unchanged.
    pub fn coerce_value(value: Value) -> Value {
        if let Some(Value::String(number)) = value.get("Number") {
            return Value::String(Self::digits(number));
        }
        value
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.number)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.number
    }
}

impl Serialize for PhoneNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.number)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PhoneNumberRepr {
    Plain(String),
    Object {
        #[serde(rename = "Number")]
        number: String,
    },
}

impl<'de> Deserialize<'de> for PhoneNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number = match PhoneNumberRepr::deserialize(deserializer)? {
            PhoneNumberRepr::Plain(number) | PhoneNumberRepr::Object { number } => number,
        };
        Ok(Self { number })
    }
}

impl Type<Postgres> for PhoneNumber {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl Encode<'_, Postgres> for PhoneNumber {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <String as Encode<Postgres>>::encode_by_ref(&self.number, buf)
    }
}

impl<'r> Decode<'r, Postgres> for PhoneNumber {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let number = <String as Decode<Postgres>>::decode(value)?;
        Ok(Self { number })
    }
}
