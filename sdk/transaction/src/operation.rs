//! Ledger operations.
//!
//! On the wire each operation is a flat object keyed by a numeric `type`
//! and a body named after the operation:
//!
//! ```text
//! {"type": 7, "pay_coin": {"dest_address": "...", "amount": 0, "input": "..."}}
//! ```

use serde::{Deserialize, Serialize};

use crate::contract::ContractCall;
use crate::error::TransactionError;

pub const OP_CREATE_ACCOUNT: u8 = 1;
pub const OP_ISSUE_ASSET: u8 = 2;
pub const OP_PAYMENT: u8 = 3;
pub const OP_PAY_COIN: u8 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "OperationWire", try_from = "OperationWire")]
pub enum Operation {
    CreateAccount(CreateAccount),
    IssueAsset(IssueAsset),
    Payment(Payment),
    PayCoin(PayCoin),
}

impl Operation {
    pub fn type_code(&self) -> u8 {
        match self {
            Operation::CreateAccount(_) => OP_CREATE_ACCOUNT,
            Operation::IssueAsset(_) => OP_ISSUE_ASSET,
            Operation::Payment(_) => OP_PAYMENT,
            Operation::PayCoin(_) => OP_PAY_COIN,
        }
    }

    /// A `pay_coin` carrying a contract call to `contract`.
    pub fn contract_call(contract: &str, call: &ContractCall) -> Result<Self, TransactionError> {
        Ok(Operation::PayCoin(PayCoin {
            source_address: String::new(),
            dest_address: contract.to_string(),
            amount: 0,
            input: call.to_input()?,
        }))
    }

    /// Fund a new account with `init_balance`.
    pub fn create_account(dest_address: &str, init_balance: u64) -> Self {
        Operation::CreateAccount(CreateAccount {
            dest_address: dest_address.to_string(),
            init_balance,
            contract: None,
            privilege: Privilege::signer(),
        })
    }

    /// Create a contract account; the ledger assigns its address.
    pub fn deploy_contract(payload: &str) -> Self {
        Operation::CreateAccount(CreateAccount {
            dest_address: String::new(),
            init_balance: 0,
            contract: Some(ContractPayload {
                payload: payload.to_string(),
            }),
            privilege: Privilege::contract(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccount {
    #[serde(default)]
    pub dest_address: String,
    #[serde(default)]
    pub init_balance: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<ContractPayload>,
    #[serde(rename = "priv")]
    pub privilege: Privilege,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractPayload {
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    pub master_weight: u64,
    pub thresholds: Thresholds,
}

impl Privilege {
    /// A normal account signing with its own key.
    pub fn signer() -> Self {
        Self {
            master_weight: 1,
            thresholds: Thresholds {
                tx_threshold: "1".into(),
            },
        }
    }

    /// A contract account, which has no signing key.
    pub fn contract() -> Self {
        Self {
            master_weight: 0,
            thresholds: Thresholds {
                tx_threshold: "1".into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub tx_threshold: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueAsset {
    pub amount: u64,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub dest_address: String,
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayCoin {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_address: String,
    pub dest_address: String,
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub input: String,
}

#[derive(Serialize, Deserialize)]
struct OperationWire {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    create_account: Option<CreateAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issue_asset: Option<IssueAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payment: Option<Payment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pay_coin: Option<PayCoin>,
}

impl From<Operation> for OperationWire {
    fn from(op: Operation) -> Self {
        let mut wire = OperationWire {
            kind: op.type_code(),
            create_account: None,
            issue_asset: None,
            payment: None,
            pay_coin: None,
        };
        match op {
            Operation::CreateAccount(body) => wire.create_account = Some(body),
            Operation::IssueAsset(body) => wire.issue_asset = Some(body),
            Operation::Payment(body) => wire.payment = Some(body),
            Operation::PayCoin(body) => wire.pay_coin = Some(body),
        }
        wire
    }
}

impl TryFrom<OperationWire> for Operation {
    type Error = TransactionError;

    fn try_from(wire: OperationWire) -> Result<Self, Self::Error> {
        let missing = TransactionError::MissingBody(wire.kind);
        match wire.kind {
            OP_CREATE_ACCOUNT => wire.create_account.map(Operation::CreateAccount).ok_or(missing),
            OP_ISSUE_ASSET => wire.issue_asset.map(Operation::IssueAsset).ok_or(missing),
            OP_PAYMENT => wire.payment.map(Operation::Payment).ok_or(missing),
            OP_PAY_COIN => wire.pay_coin.map(Operation::PayCoin).ok_or(missing),
            other => Err(TransactionError::UnknownOperation(other)),
        }
    }
}
