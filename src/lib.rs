//! Sign-up, sign-in and a protected "who am I" endpoint over a Postgres
//! user table, with either stateless tokens or server-side sessions as
//! the proof of identity.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod state;
pub mod users;
