#![deny(missing_docs)]
//! Anthropic Messages API adapter.
//!
//! Maps the shared wire types to Anthropic's format: the system prompt
//! travels as a top-level field, assistant tool calls become
//! `tool_use` content blocks, tool results become `tool_result`
//! blocks, and image data URIs are decomposed into base64 + media
//! type. The `reasoning_budget` request field maps to the `thinking`
//! parameter.

mod client;
mod mapping;
mod models;
mod streaming;

pub use client::Anthropic;
