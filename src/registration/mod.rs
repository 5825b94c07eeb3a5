//! Registration dialog: username, then password, then referral code.
//!
//! Progress is held per user in the [`SessionStore`] between webhook
//! deliveries. The [`RegistrationMachine`] advances it one message at a time
//! and writes the finished record to the user store before discarding the
//! session.

pub mod machine;
pub mod prompts;
pub mod sessions;
pub mod state;

pub use machine::RegistrationMachine;
pub use prompts::Prompt;
pub use sessions::{SessionGuard, SessionStore, spawn_sweep_task};
pub use state::{Session, Step, Transition, transition};
