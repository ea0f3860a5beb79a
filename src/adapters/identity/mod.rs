//! Identity provider adapters.

mod firebase;
mod mock;

pub use firebase::{FirebaseConfig, FirebaseIdentityProvider};
pub use mock::MockIdentityProvider;
