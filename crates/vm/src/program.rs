//! Program definitions.
//!
//! A [`Program`] declares structs, mappings and functions. Each function has
//! a stream of ordinary instructions, executed off-chain and proven, and an
//! optional finalize scope whose [`Command`]s run on-chain against mapping
//! storage. Only the instructions that matter for finalization are modeled
//! precisely: external `call`s, which produce transitions and futures, and
//! the `async` instruction that hands futures to the finalize scope.
//!
//! Programs are stored as JSON. Registers, operands, mapping references and
//! finalize input types use their textual program syntax inside the JSON:
//!
//! ```json
//! {
//!   "id": "token.aleo",
//!   "mappings": [{ "name": "balances", "key": "address", "value": "u64" }],
//!   "functions": [{
//!     "name": "mint",
//!     "instructions": [
//!       { "async": { "function": "mint", "operands": ["r0", "r1"], "destinations": ["r2"] } }
//!     ],
//!     "finalize": {
//!       "inputs": [
//!         { "register": "r0", "type": "address.public" },
//!         { "register": "r1", "type": "u64.public" }
//!       ],
//!       "commands": [
//!         { "get_or_use": { "mapping": "balances", "key": "r0", "default": "0u64", "destination": "r2" } },
//!         { "add": { "first": "r2", "second": "r1", "destination": "r3" } },
//!         { "set": { "value": "r3", "mapping": "balances", "key": "r0" } }
//!       ]
//!     }
//!   }]
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::identifier::{Identifier, Locator, ProgramId};
use crate::literal::Literal;
use crate::plaintext::{PlaintextType, StructType};
use crate::VmError;

/// A program definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    #[serde(default)]
    pub structs: Vec<StructType>,
    /// Mappings in declaration order.
    #[serde(default)]
    pub mappings: Vec<Mapping>,
    #[serde(default)]
    pub functions: Vec<Function>,
}

impl Program {
    /// Decode a program from its stored JSON definition.
    pub fn from_json(definition: &str) -> Result<Self, VmError> {
        serde_json::from_str(definition).map_err(|e| VmError::Definition(e.to_string()))
    }

    /// Encode the program as its stored JSON definition.
    pub fn to_json(&self) -> Result<String, VmError> {
        serde_json::to_string(self).map_err(|e| VmError::Definition(e.to_string()))
    }

    pub fn mapping(&self, name: &Identifier) -> Option<&Mapping> {
        self.mappings.iter().find(|m| &m.name == name)
    }

    pub fn function(&self, name: &Identifier) -> Option<&Function> {
        self.functions.iter().find(|f| &f.name == name)
    }

    pub fn struct_type(&self, name: &Identifier) -> Option<&StructType> {
        self.structs.iter().find(|s| &s.name == name)
    }
}

/// A mapping declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub name: Identifier,
    pub key: PlaintextType,
    pub value: PlaintextType,
}

/// A function and its optional finalize scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: Identifier,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub finalize: Option<Finalize>,
}

/// A register index, written `r<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(pub u64);

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl FromStr for Register {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('r')
            .filter(|digits| !digits.starts_with('+'))
            .and_then(|digits| digits.parse().ok())
            .map(Self)
            .ok_or_else(|| VmError::Syntax(format!("invalid register {}", s)))
    }
}

/// An instruction or command operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Literal(Literal),
    /// `block.height`, the height of the block being finalized.
    BlockHeight,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(register) => write!(f, "{}", register),
            Self::Literal(literal) => write!(f, "{}", literal),
            Self::BlockHeight => f.write_str("block.height"),
        }
    }
}

impl FromStr for Operand {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "block.height" {
            return Ok(Self::BlockHeight);
        }
        if let Ok(register) = s.parse::<Register>() {
            return Ok(Self::Register(register));
        }
        s.parse::<Literal>().map(Self::Literal)
    }
}

/// A mapping named by a finalize command: one of the program's own, or
/// another program's (read-only).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MappingRef {
    Local(Identifier),
    External(Locator),
}

impl fmt::Display for MappingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(name) => write!(f, "{}", name),
            Self::External(locator) => write!(f, "{}", locator),
        }
    }
}

impl FromStr for MappingRef {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('/') {
            s.parse().map(Self::External)
        } else {
            Identifier::new(s).map(Self::Local)
        }
    }
}

/// The declared type of a finalize input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeType {
    /// Written `<type>.public`.
    Plaintext(PlaintextType),
    /// Written `<program>/<function>.future`.
    Future(Locator),
}

impl fmt::Display for FinalizeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plaintext(ty) => write!(f, "{}.public", ty),
            Self::Future(locator) => write!(f, "{}.future", locator),
        }
    }
}

impl FromStr for FinalizeType {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(locator) = s.strip_suffix(".future") {
            return locator.parse().map(Self::Future);
        }
        let ty = s.strip_suffix(".public").unwrap_or(s);
        ty.parse().map(Self::Plaintext)
    }
}

macro_rules! serde_via_str {
    ($($ty:ty),+) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }

            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(serde::de::Error::custom)
                }
            }
        )+
    };
}

serde_via_str!(Register, Operand, MappingRef, FinalizeType);

/// A non-finalize instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    /// Call into another program's function. When the callee has a finalize
    /// scope, the last destination holds the future it returns.
    Call {
        target: Locator,
        #[serde(default)]
        operands: Vec<Operand>,
        #[serde(default)]
        destinations: Vec<Register>,
    },
    /// Bundle operands into the future of this function's own finalize
    /// scope. Operand `i` becomes finalize input `i`.
    Async {
        function: Identifier,
        #[serde(default)]
        operands: Vec<Operand>,
        #[serde(default)]
        destinations: Vec<Register>,
    },
    /// Any other instruction; opaque to finalization.
    Other {
        opcode: String,
        #[serde(default)]
        operands: Vec<Operand>,
        #[serde(default)]
        destinations: Vec<Register>,
    },
}

/// A finalize scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalize {
    pub inputs: Vec<FinalizeInput>,
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl Finalize {
    /// Other programs' mappings read by this scope.
    pub fn external_mappings(&self) -> impl Iterator<Item = &Locator> + '_ {
        self.commands.iter().filter_map(|command| match command {
            Command::Get { mapping, .. }
            | Command::GetOrUse { mapping, .. }
            | Command::Contains { mapping, .. } => match mapping {
                MappingRef::External(locator) => Some(locator),
                MappingRef::Local(_) => None,
            },
            _ => None,
        })
    }
}

/// A finalize input declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeInput {
    pub register: Register,
    #[serde(rename = "type")]
    pub ty: FinalizeType,
}

/// A finalize command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Run the finalize scope of the future held in `register`.
    Await { register: Register },
    Get {
        mapping: MappingRef,
        key: Operand,
        destination: Register,
    },
    GetOrUse {
        mapping: MappingRef,
        key: Operand,
        default: Operand,
        destination: Register,
    },
    Contains {
        mapping: MappingRef,
        key: Operand,
        destination: Register,
    },
    Set {
        value: Operand,
        mapping: Identifier,
        key: Operand,
    },
    Remove { mapping: Identifier, key: Operand },
    Add {
        first: Operand,
        second: Operand,
        destination: Register,
    },
    Sub {
        first: Operand,
        second: Operand,
        destination: Register,
    },
    AssertEq { first: Operand, second: Operand },
    AssertNeq { first: Operand, second: Operand },
}

impl Command {
    /// The mapping this command reads or writes, if any.
    pub fn mapping(&self) -> Option<MappingRef> {
        match self {
            Self::Get { mapping, .. }
            | Self::GetOrUse { mapping, .. }
            | Self::Contains { mapping, .. } => Some(mapping.clone()),
            Self::Set { mapping, .. } | Self::Remove { mapping, .. } => {
                Some(MappingRef::Local(mapping.clone()))
            }
            Self::Await { .. }
            | Self::Add { .. }
            | Self::Sub { .. }
            | Self::AssertEq { .. }
            | Self::AssertNeq { .. } => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Await { register } => write!(f, "await {};", register),
            Self::Get {
                mapping,
                key,
                destination,
            } => write!(f, "get {}[{}] into {};", mapping, key, destination),
            Self::GetOrUse {
                mapping,
                key,
                default,
                destination,
            } => write!(
                f,
                "get.or_use {}[{}] {} into {};",
                mapping, key, default, destination
            ),
            Self::Contains {
                mapping,
                key,
                destination,
            } => write!(f, "contains {}[{}] into {};", mapping, key, destination),
            Self::Set {
                value,
                mapping,
                key,
            } => write!(f, "set {} into {}[{}];", value, mapping, key),
            Self::Remove { mapping, key } => write!(f, "remove {}[{}];", mapping, key),
            Self::Add {
                first,
                second,
                destination,
            } => write!(f, "add {} {} into {};", first, second, destination),
            Self::Sub {
                first,
                second,
                destination,
            } => write!(f, "sub {} {} into {};", first, second, destination),
            Self::AssertEq { first, second } => write!(f, "assert.eq {} {};", first, second),
            Self::AssertNeq { first, second } => write!(f, "assert.neq {} {};", first, second),
        }
    }
}
