//! `Account` — a small sample aggregate used across the runtime tests.

use chrono::{DateTime, Utc};
use chronicle_core::aggregate::{Aggregate, Operation, OperationInput};
use chronicle_core::error::DetailsError;
use serde_json::{Value, json};
use thiserror::Error;

/// Domain failures raised by [`Account`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    /// `open` was called twice.
    #[error("account is already open")]
    AlreadyOpen,

    /// A withdrawal exceeded the balance.
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Balance at the time of the call.
        balance: i64,
        /// Requested amount.
        requested: i64,
    },

    /// A recorded argument did not decode.
    #[error(transparent)]
    Details(#[from] DetailsError),
}

/// A bank-style account.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Account {
    /// Owner, set by `open`.
    pub owner: Option<String>,
    /// Display name, set by `rename`.
    pub name: Option<String>,
    /// Current balance.
    pub balance: i64,
    /// Memos attached to deposits, in order.
    pub memos: Vec<String>,
    /// Every `withdraw` call, including rejected ones.
    pub withdrawal_attempts: u32,
    /// Logical time of `open`.
    pub opened_at: Option<DateTime<Utc>>,
    /// Logical time of the latest `rename`.
    pub renamed_at: Option<DateTime<Utc>>,
}

impl Account {
    fn open(&mut self, input: &OperationInput<'_>) -> Result<(), AccountError> {
        if self.owner.is_some() {
            return Err(AccountError::AlreadyOpen);
        }
        self.owner = Some(input.arg("owner")?);
        self.opened_at = Some(input.at());
        Ok(())
    }

    fn rename(&mut self, input: &OperationInput<'_>) -> Result<(), AccountError> {
        self.name = Some(input.arg("name")?);
        self.renamed_at = Some(input.at());
        Ok(())
    }

    fn deposit(&mut self, input: &OperationInput<'_>) -> Result<(), AccountError> {
        let amount: i64 = input.arg("amount")?;
        if let Some(memo) = input.opt_arg::<String>("memo")? {
            self.memos.push(memo);
        }
        self.balance += amount;
        Ok(())
    }

    // The attempt counter is bumped before the balance check, so a rejected
    // withdrawal still leaves a trace in memory.
    fn withdraw(&mut self, input: &OperationInput<'_>) -> Result<(), AccountError> {
        let amount: i64 = input.arg("amount")?;
        self.withdrawal_attempts += 1;
        if amount > self.balance {
            return Err(AccountError::InsufficientFunds {
                balance: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    fn balance(&self, _input: &OperationInput<'_>) -> Result<Value, AccountError> {
        Ok(json!(self.balance))
    }

    fn can_withdraw(&self, input: &OperationInput<'_>) -> Result<Value, AccountError> {
        let amount: i64 = input.arg("amount")?;
        Ok(json!(amount <= self.balance))
    }

    fn summary(&self, _input: &OperationInput<'_>) -> Result<Value, AccountError> {
        Ok(json!({
            "owner": self.owner,
            "name": self.name,
            "balance": self.balance,
        }))
    }
}

static ACCOUNT_OPERATIONS: [Operation<Account>; 7] = [
    Operation::command("open", &["owner"], Account::open),
    Operation::command("rename", &["name"], Account::rename),
    Operation::command("deposit", &["amount"], Account::deposit),
    Operation::command("withdraw", &["amount"], Account::withdraw),
    Operation::query("balance", &[], Account::balance),
    Operation::query("can_withdraw", &["amount"], Account::can_withdraw),
    Operation::query("summary", &[], Account::summary),
];

impl Aggregate for Account {
    const AGGREGATE_TYPE: &'static str = "Account";
    type Error = AccountError;

    fn operations() -> &'static [Operation<Self>] {
        &ACCOUNT_OPERATIONS
    }
}
