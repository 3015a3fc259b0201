//! Static call graphs.
//!
//! Executing a function produces one transition per function call: every
//! external `call` it makes, recursively, plus its own. Transitions are
//! listed callee-first, so numbering the call tree in post-order yields each
//! call's position in the transaction's transition list. The root function
//! always comes last.
//!
//! Nodes live in an arena and refer to their children by [`NodeId`].

use finalize_common::TransitionId;
use finalize_vm::{Identifier, Instruction, Locator, Program, ProgramId};
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::trace;

use crate::error::{FinalizeError, Result};
use crate::programs::ProgramCache;
use crate::store::FinalizeStore;

/// Deepest call nesting accepted when building a graph.
pub const MAX_CALL_DEPTH: usize = 32;

/// Index of a node in its [`CallGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One external call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallNode {
    /// The called function.
    pub target: Locator,
    /// Position of this call's transition in the transition list.
    pub index: usize,
    /// Calls made by the callee, in instruction order.
    pub calls: Vec<NodeId>,
    /// The concrete transition, once bound to a transaction.
    pub transition_id: Option<TransitionId>,
}

/// The calls made by one root function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallGraph {
    pub root: Locator,
    nodes: Vec<CallNode>,
    calls: Vec<NodeId>,
}

impl CallGraph {
    pub fn node(&self, id: NodeId) -> &CallNode {
        &self.nodes[id.0]
    }

    /// Calls made directly by the root function.
    pub fn root_calls(&self) -> &[NodeId] {
        &self.calls
    }

    /// Number of external calls, excluding the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Transitions an execution of the root function produces.
    pub fn transition_count(&self) -> usize {
        self.nodes.len() + 1
    }

    /// Position of the root transition.
    pub fn root_index(&self) -> usize {
        self.nodes.len()
    }

    /// Every program the root function may reach, the root's included.
    pub fn programs(&self) -> BTreeSet<&ProgramId> {
        std::iter::once(&self.root.program)
            .chain(self.nodes.iter().map(|node| &node.target.program))
            .collect()
    }

    /// Binds transition ids by position.
    ///
    /// # Errors
    ///
    /// [`FinalizeError::CallGraph`] unless there is exactly one id per
    /// transition.
    pub fn bind(&mut self, transition_ids: &[TransitionId]) -> Result<()> {
        if transition_ids.len() != self.transition_count() {
            return Err(FinalizeError::CallGraph(format!(
                "{} makes {} calls, transaction has {} transitions",
                self.root,
                self.nodes.len(),
                transition_ids.len()
            )));
        }
        for node in &mut self.nodes {
            let id = transition_ids.get(node.index).ok_or_else(|| {
                FinalizeError::CallGraph(format!("call index {} out of range", node.index))
            })?;
            node.transition_id = Some(*id);
        }
        Ok(())
    }
}

/// Loads every program the function may call into `programs`.
pub async fn load_reachable<S>(
    store: &S,
    programs: &ProgramCache,
    program: &ProgramId,
    function: &Identifier,
) -> Result<()>
where
    S: FinalizeStore + ?Sized,
{
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([Locator::new(program.clone(), function.clone())]);
    while let Some(locator) = queue.pop_front() {
        if !seen.insert(locator.clone()) {
            continue;
        }
        let program = programs.load(store, &locator.program).await?;
        let function = program.function(&locator.resource).ok_or_else(|| {
            FinalizeError::FunctionNotFound {
                program: locator.program.to_string(),
                function: locator.resource.to_string(),
            }
        })?;
        for instruction in &function.instructions {
            if let Instruction::Call { target, .. } = instruction {
                queue.push_back(target.clone());
            }
        }
    }
    Ok(())
}

/// Builds the static call graph of `program/function`.
///
/// Every callee must already be in `programs`; see [`load_reachable`].
pub fn build_call_graph(
    programs: &ProgramCache,
    program: &Program,
    function: &Identifier,
) -> Result<CallGraph> {
    let mut builder = Builder {
        programs,
        nodes: Vec::new(),
    };
    let calls = builder.calls(program, function, 0)?;
    trace!(
        program = %program.id,
        function = %function,
        calls = builder.nodes.len(),
        "Built call graph"
    );
    Ok(CallGraph {
        root: Locator::new(program.id.clone(), function.clone()),
        nodes: builder.nodes,
        calls,
    })
}

struct Builder<'a> {
    programs: &'a ProgramCache,
    nodes: Vec<CallNode>,
}

impl Builder<'_> {
    /// Adds the calls of `program/function`, numbering callees before
    /// their caller.
    fn calls(
        &mut self,
        program: &Program,
        function: &Identifier,
        depth: usize,
    ) -> Result<Vec<NodeId>> {
        if depth > MAX_CALL_DEPTH {
            return Err(FinalizeError::CallGraph(format!(
                "call depth exceeds {} at {}/{}",
                MAX_CALL_DEPTH, program.id, function
            )));
        }
        let body = program
            .function(function)
            .ok_or_else(|| FinalizeError::FunctionNotFound {
                program: program.id.to_string(),
                function: function.to_string(),
            })?;

        let mut calls = Vec::new();
        for instruction in &body.instructions {
            let Instruction::Call { target, .. } = instruction else {
                continue;
            };
            let callee = self
                .programs
                .get(&target.program)
                .ok_or_else(|| FinalizeError::ProgramNotFound(target.program.clone()))?;
            let nested = self.calls(&callee, &target.resource, depth + 1)?;
            let id = NodeId(self.nodes.len());
            self.nodes.push(CallNode {
                target: target.clone(),
                index: id.0,
                calls: nested,
                transition_id: None,
            });
            calls.push(id);
        }
        Ok(calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finalize_common::Hash256;

    fn program(json: serde_json::Value) -> Program {
        Program::from_json(&json.to_string()).unwrap()
    }

    fn call(target: &str) -> serde_json::Value {
        serde_json::json!({ "call": { "target": target, "destinations": ["r9"] } })
    }

    fn cache() -> ProgramCache {
        let cache = ProgramCache::new();
        cache.insert(program(serde_json::json!({
            "id": "leaf.aleo",
            "functions": [{ "name": "a" }, { "name": "b" }]
        })));
        cache.insert(program(serde_json::json!({
            "id": "mid.aleo",
            "functions": [{ "name": "m", "instructions": [call("leaf.aleo/a"), call("leaf.aleo/b")] }]
        })));
        cache.insert(program(serde_json::json!({
            "id": "top.aleo",
            "functions": [{ "name": "main", "instructions": [
                call("mid.aleo/m"),
                { "other": { "opcode": "add", "operands": ["r0", "r1"], "destinations": ["r2"] } },
                call("leaf.aleo/a")
            ] }]
        })));
        cache
    }

    #[test]
    fn test_post_order_indices() {
        let programs = cache();
        let top = programs.get(&ProgramId::new("top.aleo").unwrap()).unwrap();
        let graph = build_call_graph(&programs, &top, &Identifier::new("main").unwrap()).unwrap();

        // leaf/a, leaf/b, mid/m, leaf/a, top/main
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.root_index(), 4);
        let roots = graph.root_calls();
        assert_eq!(roots.len(), 2);
        let mid = graph.node(roots[0]);
        assert_eq!(mid.target.to_string(), "mid.aleo/m");
        assert_eq!(mid.index, 2);
        let inner: Vec<usize> = mid.calls.iter().map(|id| graph.node(*id).index).collect();
        assert_eq!(inner, vec![0, 1]);
        assert_eq!(graph.node(roots[1]).index, 3);
        assert_eq!(graph.programs().len(), 3);
    }

    #[test]
    fn test_bind_requires_matching_count() {
        let programs = cache();
        let top = programs.get(&ProgramId::new("top.aleo").unwrap()).unwrap();
        let mut graph =
            build_call_graph(&programs, &top, &Identifier::new("main").unwrap()).unwrap();

        let ids: Vec<TransitionId> = (0u8..4).map(|i| Hash256::hash(&[i])).collect();
        assert!(matches!(graph.bind(&ids), Err(FinalizeError::CallGraph(_))));

        let ids: Vec<TransitionId> = (0u8..5).map(|i| Hash256::hash(&[i])).collect();
        graph.bind(&ids).unwrap();
        let mid = graph.node(graph.root_calls()[0]);
        assert_eq!(mid.transition_id, Some(ids[2]));
    }

    #[test]
    fn test_missing_callee_program() {
        let programs = ProgramCache::new();
        let top = programs.insert(program(serde_json::json!({
            "id": "top.aleo",
            "functions": [{ "name": "main", "instructions": [call("gone.aleo/f")] }]
        })));
        let err = build_call_graph(&programs, &top, &Identifier::new("main").unwrap()).unwrap_err();
        assert!(matches!(err, FinalizeError::ProgramNotFound(_)));
    }

    /// `c0.aleo/f` calls `c1.aleo/f` and so on; the last link calls nothing.
    fn chain(links: usize) -> ProgramCache {
        let programs = ProgramCache::new();
        for i in 0..links {
            let instructions: Vec<_> = if i + 1 < links {
                vec![call(&format!("c{}.aleo/f", i + 1))]
            } else {
                Vec::new()
            };
            programs.insert(program(serde_json::json!({
                "id": format!("c{}.aleo", i),
                "functions": [{ "name": "f", "instructions": instructions }]
            })));
        }
        programs
    }

    #[test]
    fn test_call_depth_limit() {
        let f = Identifier::new("f").unwrap();
        let root = ProgramId::new("c0.aleo").unwrap();

        let programs = chain(MAX_CALL_DEPTH + 1);
        let top = programs.get(&root).unwrap();
        let graph = build_call_graph(&programs, &top, &f).unwrap();
        assert_eq!(graph.len(), MAX_CALL_DEPTH);

        let programs = chain(MAX_CALL_DEPTH + 2);
        let top = programs.get(&root).unwrap();
        let err = build_call_graph(&programs, &top, &f).unwrap_err();
        assert!(matches!(err, FinalizeError::CallGraph(ref msg) if msg.contains("call depth")));

        // Recursion is cut off by the same limit.
        let programs = ProgramCache::new();
        let top = programs.insert(program(serde_json::json!({
            "id": "loop.aleo",
            "functions": [{ "name": "f", "instructions": [call("loop.aleo/f")] }]
        })));
        assert!(matches!(
            build_call_graph(&programs, &top, &f),
            Err(FinalizeError::CallGraph(_))
        ));
    }
}
