//! Plaintext values: literals and structs.
//!
//! Mapping keys and values, finalize inputs and future arguments are all
//! plaintexts. A struct plaintext keeps its members in declaration order;
//! the order is part of its canonical byte encoding and therefore of every
//! key and value id derived from it.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::identifier::Identifier;
use crate::literal::{Literal, LiteralType};
use crate::VmError;

/// The declared type of a plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlaintextType {
    Literal(LiteralType),
    /// A struct declared by the enclosing program.
    Struct(Identifier),
}

impl fmt::Display for PlaintextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(ty) => write!(f, "{}", ty),
            Self::Struct(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for PlaintextType {
    type Err = VmError;

    /// Literal type names take precedence over struct names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<LiteralType>() {
            Ok(ty) => Ok(Self::Literal(ty)),
            Err(_) => Identifier::new(s)
                .map(Self::Struct)
                .map_err(|_| VmError::UnknownType(s.to_string())),
        }
    }
}

impl Serialize for PlaintextType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PlaintextType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A member of a struct declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructMember {
    pub name: Identifier,
    #[serde(rename = "type")]
    pub ty: PlaintextType,
}

/// A struct declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructType {
    pub name: Identifier,
    pub members: Vec<StructMember>,
}

/// A plaintext value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Plaintext {
    Literal(Literal),
    /// Members in declaration order.
    Struct(Vec<(Identifier, Plaintext)>),
}

impl Plaintext {
    /// Convert a client-supplied JSON value into a plaintext of type `ty`.
    ///
    /// Literals may be given as JSON strings (`"5u64"` or `"5"`) or numbers.
    /// Structs must be JSON objects naming exactly the declared members.
    ///
    /// # Errors
    ///
    /// Returns [`VmError`] if the value does not fit the type, or names a
    /// struct missing from `structs`.
    pub fn from_json(
        value: &serde_json::Value,
        ty: &PlaintextType,
        structs: &[StructType],
    ) -> Result<Self, VmError> {
        match ty {
            PlaintextType::Literal(literal_type) => {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(VmError::InvalidPlaintext(format!(
                            "expected {} literal, got {}",
                            literal_type, other
                        )))
                    }
                };
                Literal::parse_as(*literal_type, &text).map(Self::Literal)
            }
            PlaintextType::Struct(name) => {
                let declaration = structs
                    .iter()
                    .find(|s| &s.name == name)
                    .ok_or_else(|| VmError::UnknownType(name.to_string()))?;
                let object = value.as_object().ok_or_else(|| {
                    VmError::InvalidPlaintext(format!("expected struct {}, got {}", name, value))
                })?;
                if object.len() != declaration.members.len() {
                    return Err(VmError::InvalidPlaintext(format!(
                        "struct {} has {} members, got {}",
                        name,
                        declaration.members.len(),
                        object.len()
                    )));
                }
                let mut members = Vec::with_capacity(declaration.members.len());
                for member in &declaration.members {
                    let raw = object.get(member.name.as_str()).ok_or_else(|| {
                        VmError::InvalidPlaintext(format!(
                            "struct {} is missing member {}",
                            name, member.name
                        ))
                    })?;
                    members.push((
                        member.name.clone(),
                        Self::from_json(raw, &member.ty, structs)?,
                    ));
                }
                Ok(Self::Struct(members))
            }
        }
    }

    /// Shallow type check: literal types must match exactly, any struct
    /// plaintext is accepted for a struct type.
    pub fn matches(&self, ty: &PlaintextType) -> bool {
        match (self, ty) {
            (Self::Literal(literal), PlaintextType::Literal(expected)) => {
                literal.literal_type() == *expected
            }
            (Self::Struct(_), PlaintextType::Struct(_)) => true,
            _ => false,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(literal) => Some(literal),
            Self::Struct(_) => None,
        }
    }

    /// Canonical byte encoding used for key and value ids.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_bytes(&mut out);
        out
    }

    fn write_bytes(&self, out: &mut Vec<u8>) {
        match self {
            Self::Literal(literal) => {
                out.push(0);
                out.extend_from_slice(&literal.to_bytes());
            }
            Self::Struct(members) => {
                out.push(1);
                out.extend_from_slice(&(members.len() as u32).to_le_bytes());
                for (name, value) in members {
                    out.extend_from_slice(&(name.as_str().len() as u32).to_le_bytes());
                    out.extend_from_slice(name.as_str().as_bytes());
                    value.write_bytes(out);
                }
            }
        }
    }
}

impl From<Literal> for Plaintext {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl fmt::Display for Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(literal) => write!(f, "{}", literal),
            Self::Struct(members) => {
                f.write_str("{ ")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_str(" }")
            }
        }
    }
}

impl Serialize for Plaintext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Literal(literal) => literal.serialize(serializer),
            Self::Struct(members) => {
                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (name, value) in members {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Plaintext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PlaintextVisitor)
    }
}

/// Reads a literal string or a struct object, keeping member order as written.
struct PlaintextVisitor;

impl<'de> Visitor<'de> for PlaintextVisitor {
    type Value = Plaintext;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a literal string or a struct object")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Plaintext, E> {
        v.parse::<Literal>()
            .map(Plaintext::Literal)
            .map_err(E::custom)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Plaintext, A::Error> {
        let mut members = Vec::new();
        while let Some((name, value)) = map.next_entry::<Identifier, Plaintext>()? {
            members.push((name, value));
        }
        Ok(Plaintext::Struct(members))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point() -> StructType {
        StructType {
            name: Identifier::new("point").unwrap(),
            members: vec![
                StructMember {
                    name: Identifier::new("x").unwrap(),
                    ty: PlaintextType::Literal(LiteralType::I32),
                },
                StructMember {
                    name: Identifier::new("y").unwrap(),
                    ty: PlaintextType::Literal(LiteralType::I32),
                },
            ],
        }
    }

    #[test]
    fn test_type_parse_prefers_literal() {
        assert_eq!(
            "u64".parse::<PlaintextType>().unwrap(),
            PlaintextType::Literal(LiteralType::U64)
        );
        assert_eq!(
            "point".parse::<PlaintextType>().unwrap(),
            PlaintextType::Struct(Identifier::new("point").unwrap())
        );
        assert!("9lives".parse::<PlaintextType>().is_err());
    }

    #[test]
    fn test_from_json_literal() {
        let ty = PlaintextType::Literal(LiteralType::U64);
        assert_eq!(
            Plaintext::from_json(&json!("5u64"), &ty, &[]).unwrap(),
            Plaintext::Literal(Literal::U64(5))
        );
        assert_eq!(
            Plaintext::from_json(&json!(5), &ty, &[]).unwrap(),
            Plaintext::Literal(Literal::U64(5))
        );
        assert!(Plaintext::from_json(&json!("-5"), &ty, &[]).is_err());
        assert!(Plaintext::from_json(&json!([1]), &ty, &[]).is_err());
    }

    #[test]
    fn test_from_json_struct_uses_declared_order() {
        let ty = PlaintextType::Struct(Identifier::new("point").unwrap());
        let value = Plaintext::from_json(&json!({"y": "2", "x": "1"}), &ty, &[point()]).unwrap();
        assert_eq!(value.to_string(), "{ x: 1i32, y: 2i32 }");

        assert!(Plaintext::from_json(&json!({"x": "1"}), &ty, &[point()]).is_err());
        assert!(Plaintext::from_json(&json!({"x": "1", "z": "2"}), &ty, &[point()]).is_err());
        assert!(Plaintext::from_json(&json!({"x": "1", "y": "2"}), &ty, &[]).is_err());
    }

    #[test]
    fn test_serde_keeps_member_order() {
        let value: Plaintext = serde_json::from_str(r#"{"b": "1u8", "a": "2u8"}"#).unwrap();
        match &value {
            Plaintext::Struct(members) => {
                assert_eq!(members[0].0.as_str(), "b");
                assert_eq!(members[1].0.as_str(), "a");
            }
            other => panic!("expected struct, got {:?}", other),
        }
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"b":"1u8","a":"2u8"}"#);
    }

    #[test]
    fn test_bytes_depend_on_member_order() {
        let a = Plaintext::Struct(vec![
            (Identifier::new("x").unwrap(), Literal::U8(1).into()),
            (Identifier::new("y").unwrap(), Literal::U8(2).into()),
        ]);
        let b = Plaintext::Struct(vec![
            (Identifier::new("y").unwrap(), Literal::U8(2).into()),
            (Identifier::new("x").unwrap(), Literal::U8(1).into()),
        ]);
        assert_ne!(a.to_bytes(), b.to_bytes());
    }
}
