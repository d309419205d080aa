//! Cedarbridge code generator.
//!
//! Takes a compiled schema [`model::Model`] and renders one Rust source
//! artifact per non-external type and per protocol version, plus the module
//! files that tie them together. Generated code depends only on
//! `cedarbridge-runtime`.
#![forbid(unsafe_code)]

pub mod core_package;
pub mod dynamic;
pub mod externals;
pub mod generate;
pub mod method_ref;
pub mod model;
pub mod model_json;
pub mod names;

mod rust_emit;
mod rust_emit_protocols;

pub use generate::{
    generate_model, write_outputs, GenerateError, GenerateErrorKind, GenerateOptions,
    GeneratedOutput, OutputKind,
};
pub use model::{Model, QualifiedName, TypeExpression};
pub use model_json::load_model;
