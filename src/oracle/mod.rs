//! Ledger oracle: payload canonicalization, the gateway client, the relay
//! state machine, and the self-healing monitor sweep.

pub mod ledger;
pub mod monitor;
pub mod payload;
pub mod relay;

pub use ledger::{Credential, JsonRpcLedger, Ledger, LedgerError, ReceiptOutcome, SignedTx};
pub use monitor::RelayMonitor;
pub use payload::{SignalTxPayload, metrics_digest, signal_digest};
pub use relay::{RelayOutcome, SignalRelay};
