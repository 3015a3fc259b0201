//! Reference finalize interpreter.
//!
//! Executes the command set modeled by [`Command`]. Registers hold
//! [`Value`]s; mapping reads go through [`FinalizeCaches`] and mapping
//! writes are both recorded as [`MappingOperation`]s and written back to
//! the caches so later commands and later transactions observe them.
//!
//! `await` runs the awaited future's scope in place. Outside eager mode the
//! scope is attributed to the next id of the async order; the root scope
//! takes the first.

use finalize_common::{Hash256, TransitionId};
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::cache::{FinalizeCaches, MappingEntry};
use crate::executor::{ExecuteError, FinalizeExecutor, FinalizeRequest};
use crate::identifier::{Identifier, ProgramId};
use crate::ids;
use crate::literal::Literal;
use crate::operation::MappingOperation;
use crate::plaintext::Plaintext;
use crate::program::{Command, FinalizeType, Mapping, MappingRef, Operand, Program, Register};
use crate::value::Value;
use crate::VmError;

/// The reference [`FinalizeExecutor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }
}

impl FinalizeExecutor for Interpreter {
    fn execute(
        &self,
        mut request: FinalizeRequest<'_>,
        caches: FinalizeCaches<'_>,
    ) -> Result<Vec<MappingOperation>, ExecuteError> {
        let root = match request.order.first() {
            Some(id) => *id,
            None if request.execute_await_eagerly => Hash256::ZERO,
            None => {
                return Err(ExecuteError::new(
                    Hash256::ZERO,
                    format!("finalize {}/{}", request.program.id, request.function),
                    "empty async order",
                ))
            }
        };
        if request.rejected.contains(&root) {
            return Ok(Vec::new());
        }
        let inputs = std::mem::take(&mut request.inputs);
        let program = request.program;
        let function = request.function;
        let mut run = Run {
            request: &request,
            caches,
            root,
            next: 1,
            operations: Vec::new(),
        };
        run.scope(program, function, inputs, root)?;
        Ok(run.operations)
    }
}

/// Failure inside one scope, before it is attributed to a command.
enum Fault {
    Cause(String),
    /// Already attributed by an awaited scope.
    Nested(ExecuteError),
}

impl From<String> for Fault {
    fn from(cause: String) -> Self {
        Self::Cause(cause)
    }
}

impl From<VmError> for Fault {
    fn from(err: VmError) -> Self {
        Self::Cause(err.to_string())
    }
}

struct Run<'r, 'a, 'c> {
    request: &'r FinalizeRequest<'a>,
    caches: FinalizeCaches<'c>,
    root: TransitionId,
    next: usize,
    operations: Vec<MappingOperation>,
}

type Registers = HashMap<Register, Value>;

impl Run<'_, '_, '_> {
    fn scope(
        &mut self,
        program: &Program,
        function_name: &Identifier,
        inputs: Vec<Value>,
        transition_id: TransitionId,
    ) -> Result<(), ExecuteError> {
        let header = format!("finalize {}/{}", program.id, function_name);
        let function = program.function(function_name).ok_or_else(|| {
            ExecuteError::new(transition_id, header.clone(), "function not found")
        })?;
        let finalize = function.finalize.as_ref().ok_or_else(|| {
            ExecuteError::new(transition_id, header.clone(), "function has no finalize scope")
        })?;
        if inputs.len() != finalize.inputs.len() {
            return Err(ExecuteError::new(
                transition_id,
                header,
                format!(
                    "expected {} inputs, got {}",
                    finalize.inputs.len(),
                    inputs.len()
                ),
            ));
        }

        let mut registers = Registers::new();
        for (input, value) in finalize.inputs.iter().zip(inputs) {
            if !input_matches(&input.ty, &value) {
                return Err(ExecuteError::new(
                    transition_id,
                    format!("input {} as {};", input.register, input.ty),
                    format!("expected {}, got {}", input.ty, value),
                ));
            }
            registers.insert(input.register, value);
        }

        debug!(
            program = %program.id,
            function = %function_name,
            transition = %transition_id,
            "Executing finalize scope"
        );

        for command in &finalize.commands {
            trace!(command = %command, "Executing command");
            self.command(program, command, &mut registers)
                .map_err(|fault| match fault {
                    Fault::Cause(cause) => {
                        ExecuteError::new(transition_id, command.to_string(), cause)
                    }
                    Fault::Nested(err) => err,
                })?;
        }
        Ok(())
    }

    fn command(
        &mut self,
        program: &Program,
        command: &Command,
        registers: &mut Registers,
    ) -> Result<(), Fault> {
        match command {
            Command::Await { register } => {
                let future = match registers.get(register) {
                    Some(Value::Future(future)) => future.clone(),
                    Some(other) => {
                        return Err(format!("{} holds {}, not a future", register, other).into())
                    }
                    None => return Err(format!("register {} is not set", register).into()),
                };
                let transition_id = self.next_transition()?;
                if self.request.rejected.contains(&transition_id) {
                    return Ok(());
                }
                let callee = self
                    .request
                    .programs
                    .program(&future.program_id)
                    .ok_or_else(|| format!("program {} not found", future.program_id))?;
                self.scope(
                    &callee,
                    &future.function_name,
                    future.inputs(),
                    transition_id,
                )
                .map_err(Fault::Nested)
            }
            Command::Get {
                mapping,
                key,
                destination,
            } => {
                let (program_id, mapping) = self.resolve_mapping(program, mapping)?;
                let key = self.plaintext(key, registers)?;
                let entry = self
                    .lookup(&program_id, &mapping, &key)?
                    .ok_or_else(|| format!("key {} not found in mapping {}/{}", key, program_id, mapping.name))?;
                registers.insert(*destination, Value::Plaintext(entry.value));
                Ok(())
            }
            Command::GetOrUse {
                mapping,
                key,
                default,
                destination,
            } => {
                let (program_id, mapping) = self.resolve_mapping(program, mapping)?;
                let key = self.plaintext(key, registers)?;
                let value = match self.lookup(&program_id, &mapping, &key)? {
                    Some(entry) => entry.value,
                    None => self.plaintext(default, registers)?,
                };
                registers.insert(*destination, Value::Plaintext(value));
                Ok(())
            }
            Command::Contains {
                mapping,
                key,
                destination,
            } => {
                let (program_id, mapping) = self.resolve_mapping(program, mapping)?;
                let key = self.plaintext(key, registers)?;
                let found = self.lookup(&program_id, &mapping, &key)?.is_some();
                registers.insert(
                    *destination,
                    Value::Plaintext(Literal::Boolean(found).into()),
                );
                Ok(())
            }
            Command::Set {
                value,
                mapping,
                key,
            } => {
                let (program_id, mapping) =
                    self.resolve_mapping(program, &MappingRef::Local(mapping.clone()))?;
                let key = self.plaintext(key, registers)?;
                let value = self.plaintext(value, registers)?;
                if !value.matches(&mapping.value) {
                    return Err(format!(
                        "value {} does not match mapping value type {}",
                        value, mapping.value
                    )
                    .into());
                }
                self.write(program_id, mapping, key, value)
            }
            Command::Remove { .. } => Err("remove is not supported".to_string().into()),
            Command::Add {
                first,
                second,
                destination,
            } => {
                let result = self
                    .literal(first, registers)?
                    .checked_add(&self.literal(second, registers)?)?;
                registers.insert(*destination, Value::Plaintext(result.into()));
                Ok(())
            }
            Command::Sub {
                first,
                second,
                destination,
            } => {
                let result = self
                    .literal(first, registers)?
                    .checked_sub(&self.literal(second, registers)?)?;
                registers.insert(*destination, Value::Plaintext(result.into()));
                Ok(())
            }
            Command::AssertEq { first, second } => {
                let (a, b) = (self.operand(first, registers)?, self.operand(second, registers)?);
                if a != b {
                    return Err(format!("assertion failed: {} != {}", a, b).into());
                }
                Ok(())
            }
            Command::AssertNeq { first, second } => {
                let (a, b) = (self.operand(first, registers)?, self.operand(second, registers)?);
                if a == b {
                    return Err(format!("assertion failed: {} == {}", a, b).into());
                }
                Ok(())
            }
        }
    }

    fn next_transition(&mut self) -> Result<TransitionId, Fault> {
        if self.request.execute_await_eagerly {
            return Ok(self.root);
        }
        let id = self
            .request
            .order
            .get(self.next)
            .copied()
            .ok_or_else(|| "async order exhausted".to_string())?;
        self.next += 1;
        Ok(id)
    }

    fn resolve_mapping(
        &self,
        program: &Program,
        mapping: &MappingRef,
    ) -> Result<(ProgramId, Mapping), Fault> {
        match mapping {
            MappingRef::Local(name) => program
                .mapping(name)
                .map(|m| (program.id.clone(), m.clone()))
                .ok_or_else(|| format!("mapping {}/{} not declared", program.id, name).into()),
            MappingRef::External(locator) => {
                let owner = self
                    .request
                    .programs
                    .program(&locator.program)
                    .ok_or_else(|| format!("program {} not found", locator.program))?;
                owner
                    .mapping(&locator.resource)
                    .map(|m| (owner.id.clone(), m.clone()))
                    .ok_or_else(|| format!("mapping {} not declared", locator).into())
            }
        }
    }

    fn lookup(
        &self,
        program_id: &ProgramId,
        mapping: &Mapping,
        key: &Plaintext,
    ) -> Result<Option<MappingEntry>, Fault> {
        if !key.matches(&mapping.key) {
            return Err(format!(
                "key {} does not match mapping key type {}",
                key, mapping.key
            )
            .into());
        }
        let mapping_id = ids::mapping_id(program_id, &mapping.name);
        if !self.caches.contains_mapping(&mapping_id) {
            return Err(format!("mapping {}/{} not found", program_id, mapping.name).into());
        }
        let key_id = ids::key_id(program_id, &mapping.name, key);
        Ok(self.caches.get(&mapping_id, &key_id).cloned())
    }

    fn write(
        &mut self,
        program_id: ProgramId,
        mapping: Mapping,
        key: Plaintext,
        value: Plaintext,
    ) -> Result<(), Fault> {
        if !key.matches(&mapping.key) {
            return Err(format!(
                "key {} does not match mapping key type {}",
                key, mapping.key
            )
            .into());
        }
        let mapping_id = ids::mapping_id(&program_id, &mapping.name);
        if !self.caches.contains_mapping(&mapping_id) {
            return Err(format!("mapping {}/{} not found", program_id, mapping.name).into());
        }
        let key_id = ids::key_id(&program_id, &mapping.name, &key);
        let value_id = ids::value_id(&key_id, &value);
        self.caches.write(
            mapping_id,
            key_id,
            MappingEntry {
                key: key.clone(),
                value: value.clone(),
            },
            self.request.allow_state_change,
        );
        self.operations.push(MappingOperation::UpdateKeyValue {
            mapping_id,
            key_id,
            value_id,
            program_id,
            mapping: mapping.name,
            key,
            value,
            height: self.request.state.height,
            from_transaction: true,
        });
        Ok(())
    }

    fn operand(&self, operand: &Operand, registers: &Registers) -> Result<Value, Fault> {
        match operand {
            Operand::Register(register) => registers
                .get(register)
                .cloned()
                .ok_or_else(|| format!("register {} is not set", register).into()),
            Operand::Literal(literal) => Ok(Value::Plaintext(literal.clone().into())),
            Operand::BlockHeight => Ok(Value::Plaintext(
                Literal::U32(self.request.state.height).into(),
            )),
        }
    }

    fn plaintext(&self, operand: &Operand, registers: &Registers) -> Result<Plaintext, Fault> {
        match self.operand(operand, registers)? {
            Value::Plaintext(plaintext) => Ok(plaintext),
            Value::Future(_) => Err(format!("{} is a future, expected a plaintext", operand).into()),
        }
    }

    fn literal(&self, operand: &Operand, registers: &Registers) -> Result<Literal, Fault> {
        match self.plaintext(operand, registers)? {
            Plaintext::Literal(literal) => Ok(literal),
            Plaintext::Struct(_) => Err(format!("{} is a struct, expected a literal", operand).into()),
        }
    }
}

fn input_matches(ty: &FinalizeType, value: &Value) -> bool {
    match (ty, value) {
        (FinalizeType::Plaintext(ty), Value::Plaintext(plaintext)) => plaintext.matches(ty),
        (FinalizeType::Future(locator), Value::Future(future)) => {
            future.program_id == locator.program && future.function_name == locator.resource
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MappingCache;
    use crate::executor::{FinalizeState, ProgramLookup};
    use crate::value::{Argument, Future};
    use std::collections::HashSet;
    use std::sync::Arc;

    const ADDRESS: &str = "aleo1rhgdu77hgyqd3xjj8ucu3jj9r2krwz6mnzyd80gncr5fxcwlh5rsvzp9px";

    const COUNTER: &str = r#"{
        "id": "counter.aleo",
        "mappings": [{ "name": "counts", "key": "address", "value": "u64" }],
        "functions": [
            {
                "name": "bump",
                "finalize": {
                    "inputs": [
                        { "register": "r0", "type": "address.public" },
                        { "register": "r1", "type": "u64.public" }
                    ],
                    "commands": [
                        { "get_or_use": { "mapping": "counts", "key": "r0", "default": "0u64", "destination": "r2" } },
                        { "add": { "first": "r2", "second": "r1", "destination": "r3" } },
                        { "set": { "value": "r3", "mapping": "counts", "key": "r0" } }
                    ]
                }
            },
            {
                "name": "drain",
                "finalize": {
                    "inputs": [{ "register": "r0", "type": "address.public" }],
                    "commands": [
                        { "get": { "mapping": "counts", "key": "r0", "destination": "r1" } },
                        { "sub": { "first": "r1", "second": "1u64", "destination": "r2" } },
                        { "set": { "value": "r2", "mapping": "counts", "key": "r0" } }
                    ]
                }
            },
            {
                "name": "clear",
                "finalize": {
                    "inputs": [{ "register": "r0", "type": "address.public" }],
                    "commands": [{ "remove": { "mapping": "counts", "key": "r0" } }]
                }
            }
        ]
    }"#;

    const OUTER: &str = r#"{
        "id": "outer.aleo",
        "functions": [{
            "name": "main",
            "finalize": {
                "inputs": [{ "register": "r0", "type": "counter.aleo/drain.future" }],
                "commands": [{ "await": { "register": "r0" } }]
            }
        }]
    }"#;

    struct Programs(HashMap<ProgramId, Arc<Program>>);

    impl ProgramLookup for Programs {
        fn program(&self, id: &ProgramId) -> Option<Arc<Program>> {
            self.0.get(id).cloned()
        }
    }

    fn programs() -> Programs {
        let mut map = HashMap::new();
        for text in [COUNTER, OUTER] {
            let program = Program::from_json(text).unwrap();
            map.insert(program.id.clone(), Arc::new(program));
        }
        Programs(map)
    }

    fn state() -> FinalizeState {
        FinalizeState {
            height: 7,
            timestamp: 1_700_000_000,
            seed: Hash256::hash(b"seed"),
        }
    }

    fn address() -> Plaintext {
        Plaintext::Literal(ADDRESS.parse().unwrap())
    }

    fn counts_id() -> finalize_common::MappingId {
        ids::mapping_id(
            &ProgramId::new("counter.aleo").unwrap(),
            &Identifier::new("counts").unwrap(),
        )
    }

    fn run(
        programs: &Programs,
        program: &str,
        function: &str,
        order: &[TransitionId],
        inputs: Vec<Value>,
        caches: FinalizeCaches<'_>,
        allow_state_change: bool,
    ) -> Result<Vec<MappingOperation>, ExecuteError> {
        let program = programs.program(&ProgramId::new(program).unwrap()).unwrap();
        let function = Identifier::new(function).unwrap();
        let state = state();
        let rejected = HashSet::new();
        Interpreter.execute(
            FinalizeRequest {
                state: &state,
                programs,
                program: &program,
                function: &function,
                order,
                rejected: &rejected,
                inputs,
                allow_state_change,
                execute_await_eagerly: false,
            },
            caches,
        )
    }

    #[test]
    fn test_bump_writes_shared_cache() {
        let programs = programs();
        let mut shared = MappingCache::new();
        shared.initialize_mapping(counts_id());
        let tid = Hash256::hash(b"t0");

        let ops = run(
            &programs,
            "counter.aleo",
            "bump",
            &[tid],
            vec![address().into(), Plaintext::from(Literal::U64(5)).into()],
            FinalizeCaches::shared(&mut shared),
            true,
        )
        .unwrap();

        assert_eq!(ops.len(), 1);
        match &ops[0] {
            MappingOperation::UpdateKeyValue {
                value,
                height,
                from_transaction,
                ..
            } => {
                assert_eq!(value, &Plaintext::from(Literal::U64(5)));
                assert_eq!(*height, 7);
                assert!(*from_transaction);
            }
            other => panic!("unexpected operation {:?}", other),
        }
        assert_eq!(shared.get(&counts_id()).unwrap().len(), 1);
    }

    #[test]
    fn test_suppressed_state_change_keeps_shared_clean() {
        let programs = programs();
        let mut shared = MappingCache::new();
        shared.initialize_mapping(counts_id());
        let mut local = MappingCache::new();

        let ops = run(
            &programs,
            "counter.aleo",
            "bump",
            &[Hash256::hash(b"t0")],
            vec![address().into(), Plaintext::from(Literal::U64(5)).into()],
            FinalizeCaches::with_local(&mut shared, &mut local),
            false,
        )
        .unwrap();

        assert_eq!(ops.len(), 1);
        assert!(shared.get(&counts_id()).unwrap().is_empty());
        assert_eq!(local.get(&counts_id()).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_key_reports_command() {
        let programs = programs();
        let mut shared = MappingCache::new();
        shared.initialize_mapping(counts_id());
        let tid = Hash256::hash(b"t0");

        let err = run(
            &programs,
            "counter.aleo",
            "drain",
            &[tid],
            vec![address().into()],
            FinalizeCaches::shared(&mut shared),
            true,
        )
        .unwrap_err();

        assert_eq!(err.transition_id, tid);
        assert_eq!(err.instruction, "get counts[r0] into r1;");
        assert!(err.cause.contains("not found"));
    }

    #[test]
    fn test_awaited_failure_is_attributed_to_awaited_transition() {
        let programs = programs();
        let mut shared = MappingCache::new();
        shared.initialize_mapping(counts_id());
        let key_id = ids::key_id(
            &ProgramId::new("counter.aleo").unwrap(),
            &Identifier::new("counts").unwrap(),
            &address(),
        );
        shared.upsert(
            counts_id(),
            key_id,
            MappingEntry {
                key: address(),
                value: Literal::U64(0).into(),
            },
        );
        let future = Future {
            program_id: ProgramId::new("counter.aleo").unwrap(),
            function_name: Identifier::new("drain").unwrap(),
            arguments: vec![Argument::Plaintext(address())],
        };
        let outer_id = Hash256::hash(b"outer");
        let inner_id = Hash256::hash(b"inner");

        let err = run(
            &programs,
            "outer.aleo",
            "main",
            &[outer_id, inner_id],
            vec![Value::Future(future)],
            FinalizeCaches::shared(&mut shared),
            true,
        )
        .unwrap_err();

        assert_eq!(err.transition_id, inner_id);
        assert_eq!(err.instruction, "sub r1 1u64 into r2;");
        assert!(err.cause.contains("overflow"));
    }

    #[test]
    fn test_exhausted_order_is_an_error() {
        let programs = programs();
        let mut shared = MappingCache::new();
        shared.initialize_mapping(counts_id());
        let future = Future {
            program_id: ProgramId::new("counter.aleo").unwrap(),
            function_name: Identifier::new("drain").unwrap(),
            arguments: vec![Argument::Plaintext(address())],
        };
        let outer_id = Hash256::hash(b"outer");

        let err = run(
            &programs,
            "outer.aleo",
            "main",
            &[outer_id],
            vec![Value::Future(future)],
            FinalizeCaches::shared(&mut shared),
            true,
        )
        .unwrap_err();
        assert_eq!(err.transition_id, outer_id);
        assert_eq!(err.instruction, "await r0;");
    }

    #[test]
    fn test_remove_is_unsupported() {
        let programs = programs();
        let mut shared = MappingCache::new();
        shared.initialize_mapping(counts_id());
        let err = run(
            &programs,
            "counter.aleo",
            "clear",
            &[Hash256::hash(b"t0")],
            vec![address().into()],
            FinalizeCaches::shared(&mut shared),
            true,
        )
        .unwrap_err();
        assert_eq!(err.cause, "remove is not supported");
    }

    #[test]
    fn test_unloaded_mapping_and_bad_input() {
        let programs = programs();
        let mut shared = MappingCache::new();
        let err = run(
            &programs,
            "counter.aleo",
            "bump",
            &[Hash256::hash(b"t0")],
            vec![address().into(), Plaintext::from(Literal::U64(5)).into()],
            FinalizeCaches::shared(&mut shared),
            true,
        )
        .unwrap_err();
        assert!(err.cause.contains("mapping counter.aleo/counts not found"));

        let err = run(
            &programs,
            "counter.aleo",
            "bump",
            &[Hash256::hash(b"t0")],
            vec![address().into(), Plaintext::from(Literal::U32(5)).into()],
            FinalizeCaches::shared(&mut shared),
            true,
        )
        .unwrap_err();
        assert_eq!(err.instruction, "input r1 as u64.public;");
    }

    #[test]
    fn test_eager_await_uses_root_id() {
        let programs = programs();
        let mut shared = MappingCache::new();
        shared.initialize_mapping(counts_id());
        let mut local = MappingCache::new();
        let program = programs.program(&ProgramId::new("outer.aleo").unwrap()).unwrap();
        let function = Identifier::new("main").unwrap();
        let state = state();
        let rejected = HashSet::new();
        let future = Future {
            program_id: ProgramId::new("counter.aleo").unwrap(),
            function_name: Identifier::new("drain").unwrap(),
            arguments: vec![Argument::Plaintext(address())],
        };

        let err = Interpreter
            .execute(
                FinalizeRequest {
                    state: &state,
                    programs: &programs,
                    program: &program,
                    function: &function,
                    order: &[Hash256::ZERO],
                    rejected: &rejected,
                    inputs: vec![Value::Future(future)],
                    allow_state_change: false,
                    execute_await_eagerly: true,
                },
                FinalizeCaches::with_local(&mut shared, &mut local),
            )
            .unwrap_err();
        assert!(err.transition_id.is_zero());
        assert_eq!(err.instruction, "get counts[r0] into r1;");
    }
}
