//! Process-wide program cache.

use finalize_vm::{Program, ProgramId, ProgramLookup};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{FinalizeError, Result};
use crate::store::FinalizeStore;

type Programs = Arc<RwLock<HashMap<ProgramId, Arc<Program>>>>;

/// Loaded program definitions, shared across blocks.
///
/// Programs are immutable once deployed, so entries are never invalidated.
/// An [overlay](ProgramCache::overlay) reads through to its parent but keeps
/// what it loads to itself.
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: Programs,
    parent: Option<Programs>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that sees every program cached here, while programs it
    /// loads or inserts stay out of this cache.
    pub fn overlay(&self) -> Self {
        Self {
            programs: Programs::default(),
            parent: Some(Arc::clone(&self.programs)),
        }
    }

    /// Returns a program, loading it from the store on first use.
    ///
    /// # Errors
    ///
    /// [`FinalizeError::ProgramNotFound`] if the program is not deployed.
    pub async fn load<S>(&self, store: &S, id: &ProgramId) -> Result<Arc<Program>>
    where
        S: FinalizeStore + ?Sized,
    {
        if let Some(program) = self.get(id) {
            return Ok(program);
        }
        let program = store
            .get_program(id)
            .await?
            .ok_or_else(|| FinalizeError::ProgramNotFound(id.clone()))?;
        Ok(self.insert(program))
    }

    /// Adds a program, keeping any copy already cached.
    pub fn insert(&self, program: Program) -> Arc<Program> {
        let mut programs = self.programs.write();
        Arc::clone(
            programs
                .entry(program.id.clone())
                .or_insert_with(|| Arc::new(program)),
        )
    }

    pub fn get(&self, id: &ProgramId) -> Option<Arc<Program>> {
        if let Some(program) = self.programs.read().get(id) {
            return Some(Arc::clone(program));
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.read().get(id).cloned())
    }

    /// Number of programs held by this cache, excluding its parent's.
    pub fn len(&self) -> usize {
        self.programs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.read().is_empty()
    }
}

impl ProgramLookup for ProgramCache {
    fn program(&self, id: &ProgramId) -> Option<Arc<Program>> {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(id: &str) -> Program {
        Program::from_json(&format!(r#"{{ "id": "{}" }}"#, id)).unwrap()
    }

    #[test]
    fn test_overlay_reads_through_without_writing_back() {
        let shared = ProgramCache::new();
        shared.insert(program("token.aleo"));

        let overlay = shared.overlay();
        assert!(overlay.get(&ProgramId::new("token.aleo").unwrap()).is_some());
        assert!(overlay.is_empty());

        overlay.insert(program("relay.aleo"));
        assert!(overlay.get(&ProgramId::new("relay.aleo").unwrap()).is_some());
        assert!(shared.get(&ProgramId::new("relay.aleo").unwrap()).is_none());
        assert_eq!(shared.len(), 1);
    }
}
