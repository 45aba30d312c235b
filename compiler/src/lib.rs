// emc — Event Manifest Compiler
//
// Code-generation back end: turns a validated instrumentation schema graph
// into a native header that registers ETW providers and writes events.
// Passes: resolve (identifiers, descriptors) → plan (strategies, layout,
// deduplication, activities) → render (C++ or MC-compatible dialect).

pub mod activity;
pub mod dedup;
pub mod diag;
pub mod error;
pub mod ident;
pub mod layout;
pub mod mangle;
pub mod pass;
pub mod pipeline;
pub mod plan;
pub mod provider_traits;
pub mod render;
pub mod schema;
pub mod strategy;
