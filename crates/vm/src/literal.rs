//! Literal values and their types.
//!
//! Literals display in their on-chain text form (`5u64`, `true`, `12field`,
//! `aleo1...`) and parse back from it. When the expected type is known, the
//! type suffix may be omitted (`5` parses as `5u64` for a `u64` input).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::VmError;

/// Decimal modulus of the base field; field literals must be below it.
const FIELD_MODULUS: &str =
    "8444461749428370424248824938781546531375899335154063827935233455917409239041";

/// Decimal modulus of the scalar field; scalar literals must be below it.
const SCALAR_MODULUS: &str =
    "2111115437357092606062206234695386632838870926408408195193685246394721360383";

const ADDRESS_PREFIX: &str = "aleo1";
const ADDRESS_LENGTH: usize = 63;

/// The type of a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralType {
    Address,
    Boolean,
    Field,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    Scalar,
    String,
}

impl LiteralType {
    const ALL: [LiteralType; 15] = [
        Self::Address,
        Self::Boolean,
        Self::Field,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::I128,
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::U128,
        Self::Scalar,
        Self::String,
    ];

    /// Type name as written in programs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::Boolean => "boolean",
            Self::Field => "field",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U128 => "u128",
            Self::Scalar => "scalar",
            Self::String => "string",
        }
    }

    /// Stable tag used by the canonical byte encoding.
    fn tag(&self) -> u8 {
        match self {
            Self::Address => 0,
            Self::Boolean => 1,
            Self::Field => 2,
            Self::I8 => 3,
            Self::I16 => 4,
            Self::I32 => 5,
            Self::I64 => 6,
            Self::I128 => 7,
            Self::U8 => 8,
            Self::U16 => 9,
            Self::U32 => 10,
            Self::U64 => 11,
            Self::U128 => 12,
            Self::Scalar => 13,
            Self::String => 14,
        }
    }

    /// Suffix-carrying numeric types, longest suffix first so `u128` is not
    /// mistaken for `u8` followed by junk.
    fn suffixed() -> impl Iterator<Item = LiteralType> {
        [
            Self::Scalar,
            Self::Field,
            Self::I128,
            Self::U128,
            Self::I16,
            Self::I32,
            Self::I64,
            Self::U16,
            Self::U32,
            Self::U64,
            Self::I8,
            Self::U8,
        ]
        .into_iter()
    }
}

impl fmt::Display for LiteralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LiteralType {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name() == s)
            .ok_or_else(|| VmError::UnknownType(s.to_string()))
    }
}

impl Serialize for LiteralType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for LiteralType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Address(String),
    Boolean(bool),
    /// Canonical decimal digits, no leading zeros.
    Field(String),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    /// Canonical decimal digits, no leading zeros.
    Scalar(String),
    String(String),
}

macro_rules! integer_arith {
    ($self:ident, $other:ident, $op:ident, $name:literal, $($variant:ident),+) => {
        match ($self, $other) {
            $(
                (Literal::$variant(a), Literal::$variant(b)) => a
                    .$op(*b)
                    .map(Literal::$variant)
                    .ok_or_else(|| VmError::Arithmetic(format!("{} overflow: {} {} {}", $name, $self, $name, $other))),
            )+
            _ => Err(VmError::TypeMismatch {
                expected: $self.literal_type().to_string(),
                actual: $other.literal_type().to_string(),
            }),
        }
    };
}

impl Literal {
    /// The type of this literal.
    pub fn literal_type(&self) -> LiteralType {
        match self {
            Self::Address(_) => LiteralType::Address,
            Self::Boolean(_) => LiteralType::Boolean,
            Self::Field(_) => LiteralType::Field,
            Self::I8(_) => LiteralType::I8,
            Self::I16(_) => LiteralType::I16,
            Self::I32(_) => LiteralType::I32,
            Self::I64(_) => LiteralType::I64,
            Self::I128(_) => LiteralType::I128,
            Self::U8(_) => LiteralType::U8,
            Self::U16(_) => LiteralType::U16,
            Self::U32(_) => LiteralType::U32,
            Self::U64(_) => LiteralType::U64,
            Self::U128(_) => LiteralType::U128,
            Self::Scalar(_) => LiteralType::Scalar,
            Self::String(_) => LiteralType::String,
        }
    }

    /// Parse a literal whose type is known from context.
    ///
    /// The text may carry the type suffix or omit it; a suffix naming a
    /// different type is an error.
    pub fn parse_as(ty: LiteralType, text: &str) -> Result<Self, VmError> {
        let text = text.trim();
        let invalid = || VmError::InvalidLiteral {
            ty: ty.name().to_string(),
            text: text.to_string(),
        };
        let body = match ty {
            LiteralType::Address | LiteralType::Boolean | LiteralType::String => text,
            _ => text.strip_suffix(ty.name()).unwrap_or(text),
        };
        let literal = match ty {
            LiteralType::Address => {
                let valid = body.len() == ADDRESS_LENGTH
                    && body.starts_with(ADDRESS_PREFIX)
                    && body
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
                if !valid {
                    return Err(invalid());
                }
                Self::Address(body.to_string())
            }
            LiteralType::Boolean => match body {
                "true" => Self::Boolean(true),
                "false" => Self::Boolean(false),
                _ => return Err(invalid()),
            },
            LiteralType::Field => Self::Field(canonical_digits(body, FIELD_MODULUS).ok_or_else(invalid)?),
            LiteralType::Scalar => {
                Self::Scalar(canonical_digits(body, SCALAR_MODULUS).ok_or_else(invalid)?)
            }
            LiteralType::I8 => Self::I8(body.parse().map_err(|_| invalid())?),
            LiteralType::I16 => Self::I16(body.parse().map_err(|_| invalid())?),
            LiteralType::I32 => Self::I32(body.parse().map_err(|_| invalid())?),
            LiteralType::I64 => Self::I64(body.parse().map_err(|_| invalid())?),
            LiteralType::I128 => Self::I128(body.parse().map_err(|_| invalid())?),
            LiteralType::U8 => Self::U8(parse_unsigned(body).ok_or_else(invalid)?),
            LiteralType::U16 => Self::U16(parse_unsigned(body).ok_or_else(invalid)?),
            LiteralType::U32 => Self::U32(parse_unsigned(body).ok_or_else(invalid)?),
            LiteralType::U64 => Self::U64(parse_unsigned(body).ok_or_else(invalid)?),
            LiteralType::U128 => Self::U128(parse_unsigned(body).ok_or_else(invalid)?),
            LiteralType::String => {
                let inner = body
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap_or(body);
                Self::String(inner.to_string())
            }
        };
        Ok(literal)
    }

    /// Canonical byte encoding: type tag followed by the value.
    ///
    /// Integers are little endian, booleans one byte, textual forms are
    /// length-prefixed UTF-8.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.literal_type().tag()];
        match self {
            Self::Boolean(b) => out.push(u8::from(*b)),
            Self::I8(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::I128(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::U8(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::U128(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::Address(s) | Self::Field(s) | Self::Scalar(s) | Self::String(s) => {
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
        }
        out
    }

    /// Checked addition of two integers of the same type.
    pub fn checked_add(&self, other: &Literal) -> Result<Literal, VmError> {
        integer_arith!(self, other, checked_add, "+", I8, I16, I32, I64, I128, U8, U16, U32, U64, U128)
    }

    /// Checked subtraction of two integers of the same type.
    pub fn checked_sub(&self, other: &Literal) -> Result<Literal, VmError> {
        integer_arith!(self, other, checked_sub, "-", I8, I16, I32, I64, I128, U8, U16, U32, U64, U128)
    }
}

/// Normalize a decimal string and check it is below `modulus`.
fn canonical_digits(text: &str, modulus: &str) -> Option<String> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let trimmed = text.trim_start_matches('0');
    let digits = if trimmed.is_empty() { "0" } else { trimmed };
    let below = digits.len() < modulus.len() || (digits.len() == modulus.len() && digits < modulus);
    below.then(|| digits.to_string())
}

/// Unsigned integers reject an explicit sign, which `str::parse` would accept.
fn parse_unsigned<T: FromStr>(text: &str) -> Option<T> {
    if text.starts_with('+') {
        return None;
    }
    text.parse().ok()
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(a) => f.write_str(a),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Field(v) => write!(f, "{}field", v),
            Self::Scalar(v) => write!(f, "{}scalar", v),
            Self::I8(v) => write!(f, "{}i8", v),
            Self::I16(v) => write!(f, "{}i16", v),
            Self::I32(v) => write!(f, "{}i32", v),
            Self::I64(v) => write!(f, "{}i64", v),
            Self::I128(v) => write!(f, "{}i128", v),
            Self::U8(v) => write!(f, "{}u8", v),
            Self::U16(v) => write!(f, "{}u16", v),
            Self::U32(v) => write!(f, "{}u32", v),
            Self::U64(v) => write!(f, "{}u64", v),
            Self::U128(v) => write!(f, "{}u128", v),
            Self::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl FromStr for Literal {
    type Err = VmError;

    /// Parse a self-describing literal, inferring the type from its form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "true" || s == "false" {
            return Self::parse_as(LiteralType::Boolean, s);
        }
        if s.starts_with(ADDRESS_PREFIX) {
            return Self::parse_as(LiteralType::Address, s);
        }
        if s.starts_with('"') {
            return Self::parse_as(LiteralType::String, s);
        }
        let ty = LiteralType::suffixed()
            .find(|ty| s.ends_with(ty.name()))
            .ok_or_else(|| VmError::InvalidLiteral {
                ty: "literal".to_string(),
                text: s.to_string(),
            })?;
        Self::parse_as(ty, s)
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Literal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "aleo1rhgdu77hgyqd3xjj8ucu3jj9r2krwz6mnzyd80gncr5fxcwlh5rsvzp9px";

    #[test]
    fn test_parse_with_and_without_suffix() {
        assert_eq!(Literal::parse_as(LiteralType::U64, "5").unwrap(), Literal::U64(5));
        assert_eq!(Literal::parse_as(LiteralType::U64, "5u64").unwrap(), Literal::U64(5));
        assert!(Literal::parse_as(LiteralType::U64, "5u32").is_err());
        assert!(Literal::parse_as(LiteralType::U8, "256").is_err());
        assert!(Literal::parse_as(LiteralType::U8, "-1").is_err());
        assert!(Literal::parse_as(LiteralType::U8, "+1").is_err());
        assert_eq!(Literal::parse_as(LiteralType::I8, "-128").unwrap(), Literal::I8(-128));
    }

    #[test]
    fn test_self_describing_parse() {
        assert_eq!("7u128".parse::<Literal>().unwrap(), Literal::U128(7));
        assert_eq!("7u8".parse::<Literal>().unwrap(), Literal::U8(7));
        assert_eq!("true".parse::<Literal>().unwrap(), Literal::Boolean(true));
        assert_eq!(
            "007field".parse::<Literal>().unwrap(),
            Literal::Field("7".to_string())
        );
        assert_eq!(
            ADDRESS.parse::<Literal>().unwrap(),
            Literal::Address(ADDRESS.to_string())
        );
        assert!("12".parse::<Literal>().is_err());
    }

    #[test]
    fn test_field_range() {
        assert!(Literal::parse_as(LiteralType::Field, FIELD_MODULUS).is_err());
        let below = "8444461749428370424248824938781546531375899335154063827935233455917409239040";
        assert!(Literal::parse_as(LiteralType::Field, below).is_ok());
        assert!(Literal::parse_as(LiteralType::Field, "12a").is_err());
    }

    #[test]
    fn test_address_validation() {
        assert!(Literal::parse_as(LiteralType::Address, ADDRESS).is_ok());
        assert!(Literal::parse_as(LiteralType::Address, "aleo1short").is_err());
        assert!(Literal::parse_as(LiteralType::Address, &ADDRESS.to_uppercase()).is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["5u64", "-3i32", "true", "42field", "9scalar", "\"hi\"", ADDRESS] {
            let literal: Literal = text.parse().unwrap();
            assert_eq!(literal.to_string(), text);
        }
    }

    #[test]
    fn test_bytes_distinguish_types() {
        assert_ne!(Literal::U8(1).to_bytes(), Literal::I8(1).to_bytes());
        assert_ne!(
            Literal::Field("1".into()).to_bytes(),
            Literal::Scalar("1".into()).to_bytes()
        );
        assert_eq!(Literal::U64(9).to_bytes(), Literal::U64(9).to_bytes());
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(
            Literal::U64(5).checked_add(&Literal::U64(6)).unwrap(),
            Literal::U64(11)
        );
        assert!(matches!(
            Literal::U64(5).checked_sub(&Literal::U64(6)),
            Err(VmError::Arithmetic(_))
        ));
        assert!(matches!(
            Literal::U64(5).checked_add(&Literal::U32(6)),
            Err(VmError::TypeMismatch { .. })
        ));
    }
}
