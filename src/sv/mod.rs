pub mod console;
pub mod issuance;
pub mod ledger;

pub use console::Console;
pub use issuance::{IssuanceLog, IssueForm, Issuer};
pub use ledger::Ledger;
