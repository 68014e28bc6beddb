pub mod memory;
pub mod postgres;

pub use memory::InMemorySessionRepository;
pub use memory::InMemoryUserRepository;
pub use memory::InMemoryVerificationTokenRepository;
pub use postgres::PostgresSessionRepository;
pub use postgres::PostgresUserRepository;
pub use postgres::PostgresVerificationTokenRepository;
