// core.rs splits ledger responsibilities into submodules: the chain itself,
// derived per-address state, and validation.
pub mod chain;
pub mod state;
pub mod validation;

pub use chain::*;
pub use state::*;
pub use validation::*;
