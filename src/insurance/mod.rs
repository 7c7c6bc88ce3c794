//! Insurance Ledger
//!
//! Policy issuance under a premium cap, credit accrual on airline-fault
//! delays, and two-step credit withdrawal.

pub mod ledger;
pub mod policy;

pub use ledger::{InsuranceLedger, SettledPolicy, StagedSettlement, TransferSink, Withdrawal};
pub use policy::{Policy, PolicyKey, Settlement};
