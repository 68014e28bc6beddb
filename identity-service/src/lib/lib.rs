pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;

pub use domain::auth;
pub use domain::credential;
pub use domain::session;
pub use domain::user;
pub use domain::verification;
pub use outbound::repositories;
