//! Finalize previews.
//!
//! A preview runs one finalize scope with client-supplied inputs against
//! the latest finalized state and reports the mapping updates it would
//! make. Previews run on fresh mapping caches with state change suppressed,
//! and load programs through an overlay of the shared program cache, so they
//! never affect shared caches or storage. Awaited futures execute
//! eagerly, attributed to a zero transition id.

use finalize_common::{Hash256, KeyId, MappingId, ValueId};
use finalize_vm::{
    FinalizeCaches, FinalizeExecutor, FinalizeRequest, FinalizeState, FinalizeType, Identifier,
    Locator, MappingCache, MappingOperation, Plaintext, Program, ProgramId, Value,
};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use crate::cache;
use crate::error::FinalizeError;
use crate::programs::ProgramCache;
use crate::store::FinalizeStore;

/// Preview failures. All but [`PreviewError::Fatal`] are client errors.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("program {0} not found")]
    ProgramNotFound(ProgramId),

    #[error("function {0} not found")]
    FunctionNotFound(Locator),

    #[error("function {0} has no finalize scope")]
    NoFinalizer(Locator),

    #[error("inputs must be a JSON array")]
    InputsNotArray,

    #[error("expected {expected} inputs, got {actual}")]
    InputCount { expected: usize, actual: usize },

    #[error("invalid input #{index}: {reason}")]
    InvalidInput { index: usize, reason: String },

    #[error("input #{index} has unsupported type {ty}")]
    UnsupportedInputType { index: usize, ty: FinalizeType },

    #[error("execute error: {cause}, instruction \"{instruction}\"")]
    Execution { instruction: String, cause: String },

    #[error(transparent)]
    Fatal(#[from] FinalizeError),
}

/// A mapping update a preview run would make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewUpdate {
    pub mapping_id: MappingId,
    pub key_id: KeyId,
    pub value_id: ValueId,
    pub program_id: ProgramId,
    pub mapping: Identifier,
    pub key: Plaintext,
    pub value: Plaintext,
}

/// Converts client JSON inputs into finalize input values.
///
/// `inputs` must be an array with one entry per finalize input. Plaintext
/// inputs accept what [`Plaintext::from_json`] accepts; future inputs are
/// not supported.
pub fn parse_preview_inputs(
    program: &Program,
    function: &Identifier,
    inputs: &serde_json::Value,
) -> Result<Vec<Value>, PreviewError> {
    let locator = Locator::new(program.id.clone(), function.clone());
    let declaration = program
        .function(function)
        .ok_or_else(|| PreviewError::FunctionNotFound(locator.clone()))?;
    let finalize = declaration
        .finalize
        .as_ref()
        .ok_or(PreviewError::NoFinalizer(locator))?;
    let raw = inputs.as_array().ok_or(PreviewError::InputsNotArray)?;
    if raw.len() != finalize.inputs.len() {
        return Err(PreviewError::InputCount {
            expected: finalize.inputs.len(),
            actual: raw.len(),
        });
    }

    finalize
        .inputs
        .iter()
        .zip(raw)
        .enumerate()
        .map(|(index, (input, value))| match &input.ty {
            FinalizeType::Plaintext(ty) => Plaintext::from_json(value, ty, &program.structs)
                .map(Value::Plaintext)
                .map_err(|err| PreviewError::InvalidInput {
                    index,
                    reason: err.to_string(),
                }),
            ty @ FinalizeType::Future(_) => Err(PreviewError::UnsupportedInputType {
                index,
                ty: ty.clone(),
            }),
        })
        .collect()
}

/// Runs a preview of `program_id/function` with JSON `inputs`.
///
/// Runs against the latest finalized block's context, or a zero context
/// before the first block.
pub async fn preview_finalize<S, E>(
    store: &S,
    programs: &ProgramCache,
    executor: &E,
    program_id: &ProgramId,
    function: &Identifier,
    inputs: &serde_json::Value,
) -> Result<Vec<PreviewUpdate>, PreviewError>
where
    S: FinalizeStore + ?Sized,
    E: FinalizeExecutor + ?Sized,
{
    let programs = &programs.overlay();
    let program = match programs.load(store, program_id).await {
        Ok(program) => program,
        Err(FinalizeError::ProgramNotFound(id)) => return Err(PreviewError::ProgramNotFound(id)),
        Err(err) => return Err(err.into()),
    };
    let inputs = parse_preview_inputs(&program, function, inputs)?;

    let state = match store.latest_block().await? {
        Some(block) => FinalizeState {
            height: block.height,
            timestamp: block.timestamp,
            seed: block.seed,
        },
        None => FinalizeState {
            height: 0,
            timestamp: 0,
            seed: Hash256::ZERO,
        },
    };

    let mut shared = MappingCache::new();
    let mut local = MappingCache::new();
    cache::warm_program(store, programs, &mut shared, &program).await?;

    debug!(program = %program_id, function = %function, height = state.height, "Running preview");
    let rejected = HashSet::new();
    let operations = executor
        .execute(
            FinalizeRequest {
                state: &state,
                programs,
                program: &program,
                function,
                order: &[Hash256::ZERO],
                rejected: &rejected,
                inputs,
                allow_state_change: false,
                execute_await_eagerly: true,
            },
            FinalizeCaches::with_local(&mut shared, &mut local),
        )
        .map_err(|err| PreviewError::Execution {
            instruction: err.instruction,
            cause: err.cause,
        })?;

    operations
        .into_iter()
        .map(|operation| match operation {
            MappingOperation::UpdateKeyValue {
                mapping_id,
                key_id,
                value_id,
                program_id,
                mapping,
                key,
                value,
                ..
            } => Ok(PreviewUpdate {
                mapping_id,
                key_id,
                value_id,
                program_id,
                mapping,
                key,
                value,
            }),
            other => Err(PreviewError::Fatal(FinalizeError::PreviewModeViolation(
                other.kind(),
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = r#"{
        "id": "points.aleo",
        "structs": [{ "name": "point", "members": [
            { "name": "x", "type": "i32" },
            { "name": "y", "type": "i32" }
        ]}],
        "mappings": [{ "name": "origin", "key": "u8", "value": "point" }],
        "functions": [
            { "name": "place", "finalize": {
                "inputs": [
                    { "register": "r0", "type": "u8.public" },
                    { "register": "r1", "type": "point.public" }
                ],
                "commands": [{ "set": { "value": "r1", "mapping": "origin", "key": "r0" } }]
            }},
            { "name": "chain", "finalize": {
                "inputs": [{ "register": "r0", "type": "other.aleo/f.future" }],
                "commands": [{ "await": { "register": "r0" } }]
            }},
            { "name": "offchain" }
        ]
    }"#;

    fn program() -> Program {
        Program::from_json(PROGRAM).unwrap()
    }

    fn name(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    #[test]
    fn test_parse_struct_and_literal_inputs() {
        let inputs = parse_preview_inputs(
            &program(),
            &name("place"),
            &serde_json::json!(["3u8", { "x": "1i32", "y": -2 }]),
        )
        .unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].to_string(), "3u8");
        assert!(matches!(inputs[1], Value::Plaintext(Plaintext::Struct(_))));
    }

    #[test]
    fn test_invalid_input_reports_index() {
        let err = parse_preview_inputs(
            &program(),
            &name("place"),
            &serde_json::json!(["3u8", { "x": "1i32" }]),
        )
        .unwrap_err();
        assert!(matches!(err, PreviewError::InvalidInput { index: 1, .. }));

        let err = parse_preview_inputs(&program(), &name("place"), &serde_json::json!(["300", {}]))
            .unwrap_err();
        assert!(matches!(err, PreviewError::InvalidInput { index: 0, .. }));
    }

    #[test]
    fn test_shape_errors() {
        let program = program();
        assert!(matches!(
            parse_preview_inputs(&program, &name("place"), &serde_json::json!({})),
            Err(PreviewError::InputsNotArray)
        ));
        assert!(matches!(
            parse_preview_inputs(&program, &name("place"), &serde_json::json!(["1u8"])),
            Err(PreviewError::InputCount {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            parse_preview_inputs(&program, &name("missing"), &serde_json::json!([])),
            Err(PreviewError::FunctionNotFound(_))
        ));
        assert!(matches!(
            parse_preview_inputs(&program, &name("offchain"), &serde_json::json!([])),
            Err(PreviewError::NoFinalizer(_))
        ));
        assert!(matches!(
            parse_preview_inputs(&program, &name("chain"), &serde_json::json!([{}])),
            Err(PreviewError::UnsupportedInputType { index: 0, .. })
        ));
    }
}
