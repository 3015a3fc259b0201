//! Confirmed block model.
//!
//! A [`Block`] carries its confirmed transactions in order. Each
//! [`ConfirmedTransaction`] pairs the transaction with the finalize
//! operations consensus expects it to produce. Everything here is plain
//! serde data, so blocks can be replayed from JSON fixtures.

use finalize_common::{Hash256, TransitionId};
use finalize_vm::{FinalizeOperation, FinalizeState, Future, Identifier, Program, ProgramId};
use serde::{Deserialize, Serialize};

/// A confirmed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u32,
    pub hash: Hash256,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub seed: Hash256,
    #[serde(default)]
    pub transactions: Vec<ConfirmedTransaction>,
}

impl Block {
    /// The context every finalize scope of this block runs with.
    pub fn finalize_state(&self) -> FinalizeState {
        FinalizeState {
            height: self.height,
            timestamp: self.timestamp,
            seed: self.seed,
        }
    }
}

/// A transaction together with its consensus outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfirmedTransaction {
    AcceptedDeploy {
        transaction: Transaction,
        finalize: Vec<FinalizeOperation>,
    },
    AcceptedExecute {
        transaction: Transaction,
        finalize: Vec<FinalizeOperation>,
    },
    /// The deployment was rejected; `transaction` is its fee transaction.
    RejectedDeploy {
        transaction: Transaction,
        rejected: Rejected,
        finalize: Vec<FinalizeOperation>,
    },
    /// The execution was rejected; `transaction` is its fee transaction.
    RejectedExecute {
        transaction: Transaction,
        rejected: Rejected,
        finalize: Vec<FinalizeOperation>,
    },
}

impl ConfirmedTransaction {
    /// The operations consensus recorded for this transaction.
    pub fn expected(&self) -> &[FinalizeOperation] {
        match self {
            Self::AcceptedDeploy { finalize, .. }
            | Self::AcceptedExecute { finalize, .. }
            | Self::RejectedDeploy { finalize, .. }
            | Self::RejectedExecute { finalize, .. } => finalize,
        }
    }

    pub fn transaction(&self) -> &Transaction {
        match self {
            Self::AcceptedDeploy { transaction, .. }
            | Self::AcceptedExecute { transaction, .. }
            | Self::RejectedDeploy { transaction, .. }
            | Self::RejectedExecute { transaction, .. } => transaction,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            Self::AcceptedDeploy { .. } | Self::AcceptedExecute { .. }
        )
    }
}

/// The rejected part of a rejected transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejected {
    Deployment(Deployment),
    Execution(Execution),
}

/// A transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transaction {
    Deploy {
        id: Hash256,
        deployment: Deployment,
        fee: Fee,
    },
    Execute {
        id: Hash256,
        execution: Execution,
        #[serde(default)]
        fee: Option<Fee>,
    },
    /// Fee-only transaction standing in for a rejected one.
    Fee { id: Hash256, fee: Fee },
}

impl Transaction {
    pub fn id(&self) -> &Hash256 {
        match self {
            Self::Deploy { id, .. } | Self::Execute { id, .. } | Self::Fee { id, .. } => id,
        }
    }

    pub fn fee(&self) -> Option<&Fee> {
        match self {
            Self::Deploy { fee, .. } | Self::Fee { fee, .. } => Some(fee),
            Self::Execute { fee, .. } => fee.as_ref(),
        }
    }
}

/// A program deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub program: Program,
}

/// The transitions of an execution, innermost calls first and the
/// outermost transition last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub transitions: Vec<Transition>,
}

impl Execution {
    pub fn transition_ids(&self) -> Vec<TransitionId> {
        self.transitions.iter().map(|t| t.id).collect()
    }

    /// Position of the transition with the given id.
    pub fn position(&self, id: &TransitionId) -> Option<usize> {
        self.transitions.iter().position(|t| &t.id == id)
    }
}

/// A fee payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub transition: Transition,
}

/// One proven function call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub program_id: ProgramId,
    pub function_name: Identifier,
    #[serde(default)]
    pub outputs: Vec<TransitionOutput>,
}

impl Transition {
    pub fn is_public_fee(&self) -> bool {
        finalize_common::protocol::is_public_fee(
            self.program_id.as_str(),
            self.function_name.as_str(),
        )
    }
}

/// A transition output. Only future outputs matter to finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionOutput {
    Future {
        #[serde(default)]
        future: Option<Future>,
    },
    /// Records, ciphertexts and other outputs.
    #[serde(other)]
    Other,
}
