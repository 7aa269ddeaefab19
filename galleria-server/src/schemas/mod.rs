//! HTTP request / response bodies.
//!
//! Wire names are camelCase. Store records convert into responses via
//! `From`; request bodies are checked with `validator` before use.

pub mod ai;
pub mod catalog;
pub mod config;
pub mod image;
pub mod interaction;
pub mod user;
