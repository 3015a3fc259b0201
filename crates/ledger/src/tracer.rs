//! Async order tracing.
//!
//! The order in which an execution's finalize scopes run is decided by the
//! `await` commands of the finalize bodies, not by the transition list. The
//! tracer follows each future from the `call` that produced it, through the
//! `async` instruction that hands it to the finalize scope, to the `await`
//! that runs it, and emits transition ids in the order the scopes execute:
//! the root first, then every awaited scope depth-first.

use finalize_common::TransitionId;
use finalize_vm::{Command, Identifier, Instruction, Operand, Program, ProgramId, Register};
use std::collections::HashMap;
use tracing::debug;

use crate::call_graph::{self, CallGraph, NodeId};
use crate::error::{FinalizeError, Result};
use crate::programs::ProgramCache;
use crate::store::FinalizeStore;

/// Builds the async order of an execution of `program/function`.
///
/// `transition_ids` lists the execution's transitions, root last. Loads
/// every reachable program into `programs` as a side effect.
///
/// # Errors
///
/// Any mismatch between the static call graph and the transaction is a
/// [`FinalizeError::CallGraph`]; a missing program or function is reported
/// as such.
pub async fn build_async_order<S>(
    store: &S,
    programs: &ProgramCache,
    program: &Program,
    function: &Identifier,
    transition_ids: &[TransitionId],
) -> Result<(CallGraph, Vec<TransitionId>)>
where
    S: FinalizeStore + ?Sized,
{
    call_graph::load_reachable(store, programs, &program.id, function).await?;
    let mut graph = call_graph::build_call_graph(programs, program, function)?;
    graph.bind(transition_ids)?;
    let order = trace_order(programs, &graph, program, function, transition_ids)?;
    debug!(
        program = %program.id,
        function = %function,
        transitions = transition_ids.len(),
        scopes = order.len(),
        "Traced async order"
    );
    Ok((graph, order))
}

/// Walks a bound call graph. Pure: identical inputs give identical orders.
pub fn trace_order(
    programs: &ProgramCache,
    graph: &CallGraph,
    program: &Program,
    function: &Identifier,
    transition_ids: &[TransitionId],
) -> Result<Vec<TransitionId>> {
    let root = transition_ids
        .get(graph.root_index())
        .copied()
        .ok_or_else(|| FinalizeError::CallGraph("no root transition".to_string()))?;
    let mut order = vec![root];
    Tracer { programs, graph }.scope(program, function, graph.root_calls(), &mut order)?;
    Ok(order)
}

struct Tracer<'a> {
    programs: &'a ProgramCache,
    graph: &'a CallGraph,
}

impl Tracer<'_> {
    fn scope(
        &self,
        program: &Program,
        function_name: &Identifier,
        calls: &[NodeId],
        order: &mut Vec<TransitionId>,
    ) -> Result<()> {
        let function = program
            .function(function_name)
            .ok_or_else(|| FinalizeError::FunctionNotFound {
                program: program.id.to_string(),
                function: function_name.to_string(),
            })?;
        let Some(finalize) = &function.finalize else {
            return Ok(());
        };

        // Future registers, then finalize input positions, to call nodes.
        let mut futures: HashMap<Register, NodeId> = HashMap::new();
        let mut inputs: HashMap<usize, NodeId> = HashMap::new();
        let mut next_call = 0;
        for instruction in &function.instructions {
            match instruction {
                Instruction::Call {
                    target,
                    destinations,
                    ..
                } => {
                    let node_id = *calls.get(next_call).ok_or_else(|| {
                        FinalizeError::CallGraph(format!("unexpected call to {}", target))
                    })?;
                    next_call += 1;
                    let node = self.graph.node(node_id);
                    if &node.target != target {
                        return Err(FinalizeError::CallGraph(format!(
                            "call to {} recorded as {}",
                            target, node.target
                        )));
                    }
                    if !self.has_finalize(&node.target.program, &node.target.resource)? {
                        continue;
                    }
                    let destination = destinations.last().ok_or_else(|| {
                        FinalizeError::CallGraph(format!("call to {} has no future", target))
                    })?;
                    futures.insert(*destination, node_id);
                }
                Instruction::Async { operands, .. } => {
                    for (position, operand) in operands.iter().enumerate() {
                        if let Operand::Register(register) = operand {
                            if let Some(node_id) = futures.get(register) {
                                inputs.insert(position, *node_id);
                            }
                        }
                    }
                }
                Instruction::Other { .. } => {}
            }
        }

        for command in &finalize.commands {
            let Command::Await { register } = command else {
                continue;
            };
            let node_id = finalize
                .inputs
                .iter()
                .position(|input| &input.register == register)
                .and_then(|position| inputs.get(&position))
                .copied()
                .ok_or_else(|| {
                    FinalizeError::CallGraph(format!(
                        "await {} in {}/{} resolves to no call",
                        register, program.id, function_name
                    ))
                })?;
            let node = self.graph.node(node_id);
            let transition_id = node.transition_id.ok_or_else(|| {
                FinalizeError::CallGraph(format!("call to {} is not bound", node.target))
            })?;
            order.push(transition_id);

            let callee = self
                .programs
                .get(&node.target.program)
                .ok_or_else(|| FinalizeError::ProgramNotFound(node.target.program.clone()))?;
            self.scope(&callee, &node.target.resource, &node.calls, order)?;
        }
        Ok(())
    }

    fn has_finalize(
        &self,
        program_id: &ProgramId,
        function: &Identifier,
    ) -> Result<bool> {
        let program = self
            .programs
            .get(program_id)
            .ok_or_else(|| FinalizeError::ProgramNotFound(program_id.clone()))?;
        let function = program
            .function(function)
            .ok_or_else(|| FinalizeError::FunctionNotFound {
                program: program_id.to_string(),
                function: function.to_string(),
            })?;
        Ok(function.finalize.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_graph::build_call_graph;
    use finalize_common::Hash256;

    const LEAF: &str = r#"{
        "id": "leaf.aleo",
        "functions": [
            { "name": "a", "finalize": { "inputs": [] } },
            { "name": "b", "finalize": { "inputs": [] } },
            { "name": "plain" }
        ]
    }"#;

    fn top(awaits: &[&str]) -> Program {
        let commands: Vec<serde_json::Value> = awaits
            .iter()
            .map(|r| serde_json::json!({ "await": { "register": r } }))
            .collect();
        let json = serde_json::json!({
            "id": "top.aleo",
            "functions": [{
                "name": "main",
                "instructions": [
                    { "call": { "target": "leaf.aleo/plain", "destinations": ["r4"] } },
                    { "call": { "target": "leaf.aleo/a", "destinations": ["r5"] } },
                    { "call": { "target": "leaf.aleo/b", "operands": ["r0"], "destinations": ["r2", "r6"] } },
                    { "async": { "function": "main", "operands": ["r5", "r6"], "destinations": ["r7"] } }
                ],
                "finalize": {
                    "inputs": [
                        { "register": "r0", "type": "leaf.aleo/a.future" },
                        { "register": "r1", "type": "leaf.aleo/b.future" }
                    ],
                    "commands": commands
                }
            }]
        });
        Program::from_json(&json.to_string()).unwrap()
    }

    fn trace(awaits: &[&str]) -> Result<Vec<TransitionId>> {
        let programs = ProgramCache::new();
        programs.insert(Program::from_json(LEAF).unwrap());
        let top = programs.insert(top(awaits));
        let main = Identifier::new("main").unwrap();
        let mut graph = build_call_graph(&programs, &top, &main)?;
        graph.bind(&ids())?;
        trace_order(&programs, &graph, &top, &main, &ids())
    }

    /// plain, a, b, main
    fn ids() -> Vec<TransitionId> {
        (0u8..4).map(|i| Hash256::hash(&[i])).collect()
    }

    #[test]
    fn test_await_order_follows_finalize_body() {
        let ids = ids();
        assert_eq!(trace(&["r1", "r0"]).unwrap(), vec![ids[3], ids[2], ids[1]]);
        assert_eq!(trace(&["r0", "r1"]).unwrap(), vec![ids[3], ids[1], ids[2]]);
    }

    #[test]
    fn test_tracing_is_deterministic() {
        assert_eq!(trace(&["r1", "r0"]).unwrap(), trace(&["r1", "r0"]).unwrap());
    }

    #[test]
    fn test_unresolved_await_is_structural() {
        let err = trace(&["r3"]).unwrap_err();
        assert!(matches!(err, FinalizeError::CallGraph(_)));
    }
}
