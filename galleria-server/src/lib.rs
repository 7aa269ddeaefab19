//! galleria-server: wallpaper gallery backend with asynchronous AI generation.

pub mod ai;
pub mod config;
pub mod entities;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod schemas;
pub mod state;
