//! OWASP Top 10 workshop servers: A01, A02 and A03, vulnerable and secure.

pub mod access_control;
pub mod authentication;
pub mod config;
pub mod crypto;
pub mod crypto_failure;
pub mod db;
pub mod entities;
pub mod error;
pub mod extract;
pub mod injection;
pub mod logging;
pub mod server;

pub use server::{build_router, prepare, Lesson};
