pub mod chunking;
pub mod config;
pub mod document;
pub mod error;
pub mod gemini;
pub mod index;
pub mod model;
pub mod session;
pub mod store;
pub mod web;
