pub mod admin;
pub mod auth;
pub mod intake;
pub mod orders;
