mod fee;
mod key_manager;
mod provider;
mod signer;
mod transactions;

pub use fee::MockFeeEstimator;
pub use key_manager::MockKeyManager;
pub use provider::MockProvider;
pub use signer::MockSigner;
pub use transactions::{funding_tx, spending_tx};
