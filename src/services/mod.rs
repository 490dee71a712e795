//! Clients for the external services Codepad talks to besides the file store.

pub mod assistant;
pub mod auth;
pub mod execute;

pub use assistant::Assistant;
pub use auth::{AuthUser, FirebaseAuth};
pub use execute::{CodeRunner, RunOutput};
