//! Local storage: the identity ledger (SQLite) and the credential file.

pub mod credentials;
pub mod ledger;

pub use credentials::CredentialStore;
pub use ledger::Ledger;
