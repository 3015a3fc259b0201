//! The native credits program.
//!
//! Fee transitions target `credits.aleo`. Only the public fee has a
//! finalizer: it debits the payer's `account` balance. `transfer_public`
//! moves public balance between accounts. The program and its
//! mappings exist from genesis, so they are installed directly instead of
//! through a deployment.

use finalize_common::protocol::{
    CREDITS_ACCOUNT_MAPPING, CREDITS_PROGRAM_ID, FEE_PRIVATE_FUNCTION, FEE_PUBLIC_FUNCTION,
    TRANSFER_PUBLIC_FUNCTION,
};
use finalize_vm::{ids, Program, VmError};
use tracing::info;

use crate::error::Result;
use crate::store::FinalizeStore;

/// Builds the credits program definition.
pub fn credits_program() -> std::result::Result<Program, VmError> {
    let definition = serde_json::json!({
        "id": CREDITS_PROGRAM_ID,
        "mappings": [{ "name": CREDITS_ACCOUNT_MAPPING, "key": "address", "value": "u64" }],
        "functions": [
            {
                "name": FEE_PUBLIC_FUNCTION,
                "instructions": [
                    { "async": { "function": FEE_PUBLIC_FUNCTION, "operands": ["r0", "r1"], "destinations": ["r2"] } }
                ],
                "finalize": {
                    "inputs": [
                        { "register": "r0", "type": "address.public" },
                        { "register": "r1", "type": "u64.public" }
                    ],
                    "commands": [
                        { "get_or_use": { "mapping": CREDITS_ACCOUNT_MAPPING, "key": "r0", "default": "0u64", "destination": "r2" } },
                        { "sub": { "first": "r2", "second": "r1", "destination": "r3" } },
                        { "set": { "value": "r3", "mapping": CREDITS_ACCOUNT_MAPPING, "key": "r0" } }
                    ]
                }
            },
            { "name": FEE_PRIVATE_FUNCTION },
            {
                "name": TRANSFER_PUBLIC_FUNCTION,
                "instructions": [
                    { "async": { "function": TRANSFER_PUBLIC_FUNCTION, "operands": ["r0", "r1", "r2"], "destinations": ["r3"] } }
                ],
                "finalize": {
                    "inputs": [
                        { "register": "r0", "type": "address.public" },
                        { "register": "r1", "type": "address.public" },
                        { "register": "r2", "type": "u64.public" }
                    ],
                    "commands": [
                        { "get": { "mapping": CREDITS_ACCOUNT_MAPPING, "key": "r0", "destination": "r3" } },
                        { "sub": { "first": "r3", "second": "r2", "destination": "r4" } },
                        { "set": { "value": "r4", "mapping": CREDITS_ACCOUNT_MAPPING, "key": "r0" } },
                        { "get_or_use": { "mapping": CREDITS_ACCOUNT_MAPPING, "key": "r1", "default": "0u64", "destination": "r5" } },
                        { "add": { "first": "r5", "second": "r2", "destination": "r6" } },
                        { "set": { "value": "r6", "mapping": CREDITS_ACCOUNT_MAPPING, "key": "r1" } }
                    ]
                }
            }
        ]
    });
    Program::from_json(&definition.to_string())
}

/// Installs a builtin program: initializes its mappings and stores the
/// definition, skipping whatever already exists.
pub async fn init_builtin_program<S>(store: &S, program: &Program) -> Result<()>
where
    S: FinalizeStore + ?Sized,
{
    for mapping in &program.mappings {
        let mapping_id = ids::mapping_id(&program.id, &mapping.name);
        if store
            .initialize_builtin_mapping(&mapping_id, &program.id, &mapping.name)
            .await?
        {
            info!(program = %program.id, mapping = %mapping.name, "Initialized builtin mapping");
        }
    }
    if store.get_program(&program.id).await?.is_none() {
        store.save_builtin_program(program).await?;
        info!(program = %program.id, "Stored builtin program");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finalize_vm::Identifier;

    #[test]
    fn test_credits_program_shape() {
        let program = credits_program().unwrap();
        assert_eq!(program.id.as_str(), "credits.aleo");
        assert_eq!(program.mappings.len(), 1);
        let fee_public = program
            .function(&Identifier::new("fee_public").unwrap())
            .unwrap();
        assert_eq!(fee_public.finalize.as_ref().unwrap().inputs.len(), 2);
        let fee_private = program
            .function(&Identifier::new("fee_private").unwrap())
            .unwrap();
        assert!(fee_private.finalize.is_none());
        let transfer = program
            .function(&Identifier::new("transfer_public").unwrap())
            .unwrap();
        assert_eq!(transfer.finalize.as_ref().unwrap().commands.len(), 6);
    }
}
