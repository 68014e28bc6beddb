pub mod auth;
pub mod credential;
pub mod session;
pub mod user;
pub mod verification;
