//! In-process repositories used by tests and `storage.backend = "memory"`.
//!
//! Each entity sits behind its own mutex inside an [`Arena`]; the outer map
//! lock is only held long enough to find or insert an entry.

mod arena;
mod session;
mod user;
mod verification;

pub use session::InMemorySessionRepository;
pub use user::InMemoryUserRepository;
pub use verification::InMemoryVerificationTokenRepository;
