//! The OData query engine and secure SQL synthesis pipeline (C1–C4, C7):
//! the core of this crate per spec §1. Everything here is pure/CPU-only —
//! no I/O, no gateway calls — per the concurrency model's suspension-point
//! rule.

pub mod clauses;
pub mod fields;
pub mod filter;
pub mod key_codec;
pub mod key_registry;
pub mod lexer;
pub mod metadata;
pub mod query_builder;
