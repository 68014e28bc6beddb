mod session;
mod user;
mod verification;

pub use session::PostgresSessionRepository;
pub use user::PostgresUserRepository;
pub use verification::PostgresVerificationTokenRepository;
