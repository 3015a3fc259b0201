#![allow(dead_code)]

use finalize_common::{Hash256, TransitionId};
use finalize_db::Database;
use finalize_ledger::{
    builtin, Block, ConfirmedTransaction, Deployment, Execution, Fee, FinalizeStore, Rejected,
    Transaction, Transition, TransitionOutput,
};
use finalize_vm::{
    ids, Argument, FinalizeOperation, Future, Identifier, MappingOperation, Plaintext, Program,
    ProgramId,
};

pub const PAYER: &str = "aleo1rhgdu77hgyqd3xjj8ucu3jj9r2krwz6mnzyd80gncr5fxcwlh5rsvzp9px";
pub const HOLDER: &str = "aleo1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq3ljyzc";

pub const TOKEN: &str = r#"{
    "id": "token.aleo",
    "mappings": [
        { "name": "balances", "key": "address", "value": "u64" },
        { "name": "supply", "key": "u8", "value": "u64" }
    ],
    "functions": [
        {
            "name": "mint",
            "instructions": [
                { "async": { "function": "mint", "operands": ["r0", "r1"], "destinations": ["r2"] } }
            ],
            "finalize": {
                "inputs": [
                    { "register": "r0", "type": "address.public" },
                    { "register": "r1", "type": "u64.public" }
                ],
                "commands": [
                    { "get_or_use": { "mapping": "balances", "key": "r0", "default": "0u64", "destination": "r2" } },
                    { "add": { "first": "r2", "second": "r1", "destination": "r3" } },
                    { "set": { "value": "r3", "mapping": "balances", "key": "r0" } }
                ]
            }
        },
        {
            "name": "burn",
            "instructions": [
                { "async": { "function": "burn", "operands": ["r0", "r1"], "destinations": ["r2"] } }
            ],
            "finalize": {
                "inputs": [
                    { "register": "r0", "type": "address.public" },
                    { "register": "r1", "type": "u64.public" }
                ],
                "commands": [
                    { "get": { "mapping": "balances", "key": "r0", "destination": "r2" } },
                    { "sub": { "first": "r2", "second": "r1", "destination": "r3" } },
                    { "set": { "value": "r3", "mapping": "balances", "key": "r0" } }
                ]
            }
        }
    ]
}"#;

/// `swap` mints then burns through token.aleo, but its finalizer awaits the
/// burn first.
pub const RELAY: &str = r#"{
    "id": "relay.aleo",
    "functions": [{
        "name": "swap",
        "instructions": [
            { "call": { "target": "token.aleo/mint", "operands": ["r0", "r1"], "destinations": ["r2"] } },
            { "call": { "target": "token.aleo/burn", "operands": ["r0", "r1"], "destinations": ["r3"] } },
            { "async": { "function": "swap", "operands": ["r2", "r3"], "destinations": ["r4"] } }
        ],
        "finalize": {
            "inputs": [
                { "register": "r0", "type": "token.aleo/mint.future" },
                { "register": "r1", "type": "token.aleo/burn.future" }
            ],
            "commands": [
                { "await": { "register": "r1" } },
                { "await": { "register": "r0" } }
            ]
        }
    }]
}"#;

pub fn program(json: &str) -> Program {
    Program::from_json(json).expect("program")
}

pub fn name(s: &str) -> Identifier {
    Identifier::new(s).expect("identifier")
}

pub fn program_id(s: &str) -> ProgramId {
    ProgramId::new(s).expect("program id")
}

pub fn literal(text: &str) -> Plaintext {
    Plaintext::Literal(text.parse().expect("literal"))
}

pub fn tid(label: &str) -> TransitionId {
    Hash256::hash(label.as_bytes())
}

/// An in-memory store with the credits program installed.
pub async fn setup() -> Database {
    let db = Database::open_in_memory().expect("open db");
    let credits = builtin::credits_program().expect("credits program");
    builtin::init_builtin_program(&db, &credits)
        .await
        .expect("init credits");
    db
}

/// Sets a public credits balance outside of any transaction.
pub async fn fund(db: &Database, address: &str, amount: u64) {
    let program = program_id("credits.aleo");
    let mapping = name("account");
    let key = literal(address);
    let value = literal(&format!("{}u64", amount));
    let key_id = ids::key_id(&program, &mapping, &key);
    let op = MappingOperation::UpdateKeyValue {
        mapping_id: ids::mapping_id(&program, &mapping),
        key_id,
        value_id: ids::value_id(&key_id, &value),
        program_id: program,
        mapping,
        key,
        value,
        height: 0,
        from_transaction: false,
    };
    db.commit(&[op], None).await.expect("fund account");
}

pub fn future(program: &str, function: &str, arguments: Vec<Argument>) -> Future {
    Future {
        program_id: program_id(program),
        function_name: name(function),
        arguments,
    }
}

pub fn args(literals: &[&str]) -> Vec<Argument> {
    literals
        .iter()
        .map(|text| Argument::Plaintext(literal(text)))
        .collect()
}

pub fn transition(label: &str, future: Future) -> Transition {
    Transition {
        id: tid(label),
        program_id: future.program_id.clone(),
        function_name: future.function_name.clone(),
        outputs: vec![TransitionOutput::Future {
            future: Some(future),
        }],
    }
}

pub fn fee_public(label: &str, payer: &str, amount: u64) -> Fee {
    Fee {
        transition: transition(
            label,
            future(
                "credits.aleo",
                "fee_public",
                args(&[payer, &format!("{}u64", amount)]),
            ),
        ),
    }
}

/// A private fee; its finalize scope is never run.
pub fn fee_private(label: &str) -> Fee {
    Fee {
        transition: Transition {
            id: tid(label),
            program_id: program_id("credits.aleo"),
            function_name: name("fee_private"),
            outputs: vec![TransitionOutput::Other],
        },
    }
}

/// An execution calling `program/function` directly, with no nested calls.
pub fn single_call(label: &str, program: &str, function: &str, inputs: &[&str]) -> Execution {
    Execution {
        transitions: vec![transition(label, future(program, function, args(inputs)))],
    }
}

/// A `relay.aleo/swap` execution of `amount` for `holder`.
pub fn swap(label: &str, holder: &str, amount: u64) -> Execution {
    let amount = format!("{}u64", amount);
    let mint = future("token.aleo", "mint", args(&[holder, &amount]));
    let burn = future("token.aleo", "burn", args(&[holder, &amount]));
    Execution {
        transitions: vec![
            transition(&format!("{}/mint", label), mint.clone()),
            transition(&format!("{}/burn", label), burn.clone()),
            transition(
                label,
                future(
                    "relay.aleo",
                    "swap",
                    vec![Argument::Future(mint), Argument::Future(burn)],
                ),
            ),
        ],
    }
}

pub fn update(program: &str, mapping: &str, key: &str, value: &str) -> FinalizeOperation {
    let program = program_id(program);
    let mapping = name(mapping);
    let key_id = ids::key_id(&program, &mapping, &literal(key));
    FinalizeOperation::UpdateKeyValue {
        mapping_id: ids::mapping_id(&program, &mapping),
        key_id,
        value_id: ids::value_id(&key_id, &literal(value)),
    }
}

pub fn balance(address: &str, amount: u64) -> FinalizeOperation {
    update("token.aleo", "balances", address, &format!("{}u64", amount))
}

pub fn credits(address: &str, amount: u64) -> FinalizeOperation {
    update("credits.aleo", "account", address, &format!("{}u64", amount))
}

pub fn initialize(program: &str, mapping: &str) -> FinalizeOperation {
    FinalizeOperation::InitializeMapping {
        mapping_id: ids::mapping_id(&program_id(program), &name(mapping)),
    }
}

pub fn accepted_deploy(
    label: &str,
    json: &str,
    fee: Fee,
    finalize: Vec<FinalizeOperation>,
) -> ConfirmedTransaction {
    ConfirmedTransaction::AcceptedDeploy {
        transaction: Transaction::Deploy {
            id: tid(label),
            deployment: Deployment {
                program: program(json),
            },
            fee,
        },
        finalize,
    }
}

pub fn accepted_execute(
    label: &str,
    execution: Execution,
    fee: Option<Fee>,
    finalize: Vec<FinalizeOperation>,
) -> ConfirmedTransaction {
    ConfirmedTransaction::AcceptedExecute {
        transaction: Transaction::Execute {
            id: tid(label),
            execution,
            fee,
        },
        finalize,
    }
}

pub fn rejected_execute(
    label: &str,
    execution: Execution,
    fee: Fee,
    finalize: Vec<FinalizeOperation>,
) -> ConfirmedTransaction {
    ConfirmedTransaction::RejectedExecute {
        transaction: Transaction::Fee { id: tid(label), fee },
        rejected: Rejected::Execution(execution),
        finalize,
    }
}

pub fn block(height: u32, transactions: Vec<ConfirmedTransaction>) -> Block {
    Block {
        height,
        hash: Hash256::hash(format!("block {}", height).as_bytes()),
        timestamp: 1_700_000_000 + i64::from(height),
        seed: Hash256::hash(format!("seed {}", height).as_bytes()),
        transactions,
    }
}
