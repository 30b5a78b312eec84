//! Account lifecycle and scope-based authorization
//!
//! An account starts out reserved: it owns its primary address but cannot
//! log in. Consuming an activation token makes it active and provisions its
//! system labels. Authenticated callers then read and update accounts through
//! an [`Identity`], whose token scopes decide what they may touch.

pub mod access;
pub mod activation;
pub mod credentials;
pub mod ids;
pub mod normalize;
pub mod reservation;
pub mod saga;
pub mod scope;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use access::{AccountUpdate, Identity, Target};
pub use activation::Activation;
pub use credentials::CredentialManager;
pub use reservation::Reservation;
pub use saga::{LogReconciler, PartialCommit, Reconciler};
pub use scope::Scope;
pub use service::AccountService;
pub use store::{AccountStore, StoreError};
pub use types::{Account, AccountId, AccountStatus, AccountView, AccountWithAddresses, Address, Label, Token, TokenType};
