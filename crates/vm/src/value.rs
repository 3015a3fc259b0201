//! Register values and futures.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identifier::{Identifier, Locator, ProgramId};
use crate::plaintext::Plaintext;

/// A deferred finalize call: the target function and its bound arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Future {
    pub program_id: ProgramId,
    pub function_name: Identifier,
    pub arguments: Vec<Argument>,
}

impl Future {
    pub fn locator(&self) -> Locator {
        Locator::new(self.program_id.clone(), self.function_name.clone())
    }

    /// The argument list as finalize input values.
    pub fn inputs(&self) -> Vec<Value> {
        self.arguments.iter().cloned().map(Value::from).collect()
    }
}

/// An argument bound into a future.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Argument {
    Plaintext(Plaintext),
    Future(Future),
}

/// A value held in a finalize register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Plaintext(Plaintext),
    Future(Future),
}

impl Value {
    pub fn as_plaintext(&self) -> Option<&Plaintext> {
        match self {
            Self::Plaintext(plaintext) => Some(plaintext),
            Self::Future(_) => None,
        }
    }

    pub fn as_future(&self) -> Option<&Future> {
        match self {
            Self::Future(future) => Some(future),
            Self::Plaintext(_) => None,
        }
    }
}

impl From<Argument> for Value {
    fn from(argument: Argument) -> Self {
        match argument {
            Argument::Plaintext(plaintext) => Self::Plaintext(plaintext),
            Argument::Future(future) => Self::Future(future),
        }
    }
}

impl From<Plaintext> for Value {
    fn from(plaintext: Plaintext) -> Self {
        Self::Plaintext(plaintext)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plaintext(plaintext) => write!(f, "{}", plaintext),
            Self::Future(future) => write!(f, "{}.future", future.locator()),
        }
    }
}
