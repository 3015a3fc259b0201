//! Lazy population of the mapping cache.
//!
//! Finalize execution is synchronous and reads mappings only through the
//! cache, so every mapping a run may touch is loaded from storage up front.
//! A mapping that was never initialized stays absent, and the executor
//! reports it as not found.

use finalize_common::MappingId;
use finalize_vm::{ids, MappingCache, Program, ProgramId};
use std::collections::BTreeSet;
use tracing::trace;

use crate::error::Result;
use crate::programs::ProgramCache;
use crate::store::FinalizeStore;

/// Loads a mapping's committed contents on first use.
///
/// Returns `false` if the mapping does not exist in storage.
pub async fn ensure_mapping<S>(
    store: &S,
    cache: &mut MappingCache,
    mapping_id: &MappingId,
) -> Result<bool>
where
    S: FinalizeStore + ?Sized,
{
    if cache.contains_mapping(mapping_id) {
        return Ok(true);
    }
    match store.load_mapping(mapping_id).await? {
        Some(entries) => {
            trace!(mapping = %mapping_id, keys = entries.len(), "Cached mapping");
            cache.insert_mapping(*mapping_id, entries);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Loads every mapping `program` declares or reads from other programs.
///
/// Owners of external mappings are loaded into `programs` as well.
pub async fn warm_program<S>(
    store: &S,
    programs: &ProgramCache,
    cache: &mut MappingCache,
    program: &Program,
) -> Result<()>
where
    S: FinalizeStore + ?Sized,
{
    for mapping in &program.mappings {
        ensure_mapping(store, cache, &ids::mapping_id(&program.id, &mapping.name)).await?;
    }
    let external: BTreeSet<_> = program
        .functions
        .iter()
        .filter_map(|function| function.finalize.as_ref())
        .flat_map(|finalize| finalize.external_mappings())
        .map(|locator| (locator.program.clone(), locator.resource.clone()))
        .collect();
    for (owner, mapping) in external {
        programs.load(store, &owner).await?;
        ensure_mapping(store, cache, &ids::mapping_id(&owner, &mapping)).await?;
    }
    Ok(())
}

/// [`warm_program`] for each listed program.
pub async fn warm_programs<'a, S, I>(
    store: &S,
    programs: &ProgramCache,
    cache: &mut MappingCache,
    program_ids: I,
) -> Result<()>
where
    S: FinalizeStore + ?Sized,
    I: IntoIterator<Item = &'a ProgramId>,
{
    for id in program_ids {
        let program = programs.load(store, id).await?;
        warm_program(store, programs, cache, &program).await?;
    }
    Ok(())
}
