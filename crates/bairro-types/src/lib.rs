//! Wire types shared by the Bairro server and its HTTP client.

pub mod api;
pub mod error;
pub mod models;
