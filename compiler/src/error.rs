// error.rs — Error taxonomy for schema loading and code generation
//
// `CodegenError` is the internal/schema-invariant class: the upstream
// validator let something through that the back end must not guess around.
// It aborts generation for the offending provider. `LoadError` covers the
// outer boundary (reading and deserializing the schema graph).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    #[error("property '{property}': invalid cardinality: {detail}")]
    InvalidCardinality { property: String, detail: String },

    #[error("property '{property}' references unknown property '{target}'")]
    DanglingReference { property: String, target: String },

    #[error("property '{property}' references '{target}', which is not declared before it")]
    ForwardReference { property: String, target: String },

    #[error("event {event}: unknown {kind} '{name}'")]
    UnknownEntity {
        event: String,
        kind: &'static str,
        name: String,
    },

    #[error("provider '{provider}': duplicate event identity (value {value}, version {version})")]
    DuplicateEvent {
        provider: String,
        value: u16,
        version: u8,
    },

    #[error("provider '{provider}': traits blob of {size} bytes exceeds 65535")]
    TraitsTooLarge { provider: String, size: usize },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid schema: {0}")]
    Json(#[from] serde_json::Error),
}
