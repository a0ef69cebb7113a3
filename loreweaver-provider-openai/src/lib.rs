#![deny(missing_docs)]
//! OpenAI Chat Completions adapter.
//!
//! The shared wire types are already OpenAI-shaped, so mapping is a
//! thin serialisation layer. The same client serves any
//! OpenAI-compatible endpoint via [`OpenAi::compatible`] (configurable
//! base URL + extra headers); [`OpenAi::groq`] and [`OpenAi::zhipu`]
//! are pinned specialisations of that.

mod client;
mod models;
mod streaming;

pub use client::OpenAi;
