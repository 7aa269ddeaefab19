//! HTTP middleware stack: CORS, per-request tracing and the admin guard.

pub mod auth;
pub mod cors;
pub mod trace;
