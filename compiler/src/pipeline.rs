// pipeline.rs — Compilation state and pass orchestration
//
// Holds every pass artifact in one struct and runs the minimal set of
// passes for a given terminal PassId.
//
// Preconditions: the manifest was deserialized (the schema boundary).
// Postconditions: artifacts of all passes in `required_passes(terminal)` are
//                 populated, or `has_error` is set.
// Failure modes: any pass emitting error-level diagnostics.
// Side effects: calls `on_pass_complete` after each pass; logs pass timing.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::diag::{has_errors, Diagnostic, Location};
use crate::error::LoadError;
use crate::ident::{resolve_provider, SymbolTable};
use crate::pass::{descriptor, required_passes, PassId};
use crate::plan::{build_plan, GenerationPlan};
use crate::render::{render, RenderOptions};
use crate::schema::Manifest;

// ── Provenance ─────────────────────────────────────────────────────────────

/// Build metadata for hermetic builds and cache keys.
///
/// `source_hash` is the SHA-256 of the raw schema text. `schema_fingerprint`
/// is the SHA-256 of `Manifest::canonical_json()`, so it survives
/// whitespace and key-order changes in the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub schema_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

#[derive(Serialize)]
struct BuildInfo<'a> {
    source_hash: String,
    schema_fingerprint: String,
    compiler_version: &'a str,
}

impl Provenance {
    pub fn compute(source: &str, manifest: &Manifest) -> Self {
        Provenance {
            source_hash: sha256(source.as_bytes()),
            schema_fingerprint: sha256(manifest.canonical_json().as_bytes()),
            compiler_version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn source_hash_hex(&self) -> String {
        to_hex(&self.source_hash)
    }

    pub fn schema_fingerprint_hex(&self) -> String {
        to_hex(&self.schema_fingerprint)
    }

    /// `--emit build-info` payload.
    pub fn to_json(&self) -> String {
        let info = BuildInfo {
            source_hash: self.source_hash_hex(),
            schema_fingerprint: self.schema_fingerprint_hex(),
            compiler_version: self.compiler_version,
        };
        let mut text = serde_json::to_string_pretty(&info).unwrap_or_default();
        text.push('\n');
        text
    }
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

fn to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

// ── State ──────────────────────────────────────────────────────────────────

pub struct CompilationState {
    pub manifest: Manifest,
    /// Parallel to `manifest.providers`.
    pub tables: Option<Vec<SymbolTable>>,
    pub plan: Option<GenerationPlan>,
    pub generated: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
    pub provenance: Option<Provenance>,
}

impl CompilationState {
    pub fn new(manifest: Manifest) -> Self {
        CompilationState {
            manifest,
            tables: None,
            plan: None,
            generated: None,
            diagnostics: Vec::new(),
            has_error: false,
            provenance: None,
        }
    }

    /// Deserialize `source` and record its provenance.
    pub fn from_source(source: &str) -> Result<Self, LoadError> {
        let manifest = Manifest::from_json(source)?;
        let provenance = Provenance::compute(source, &manifest);
        let mut state = CompilationState::new(manifest);
        state.provenance = Some(provenance);
        Ok(state)
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// A pass produced error-level diagnostics; they are in
/// `CompilationState::diagnostics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{} pass failed", pass_name(.failing_pass))]
pub struct PipelineError {
    pub failing_pass: PassId,
}

fn pass_name(id: &PassId) -> &'static str {
    descriptor(*id).name
}

// ── Passes ─────────────────────────────────────────────────────────────────

fn resolve_pass(manifest: &Manifest) -> (Option<Vec<SymbolTable>>, Vec<Diagnostic>) {
    let mut tables = Vec::with_capacity(manifest.providers.len());
    let mut diags = Vec::new();
    for provider in &manifest.providers {
        match resolve_provider(provider) {
            Ok(table) => tables.push(table),
            Err(e) => diags.push(Diagnostic::from_error(Location::provider(&provider.name), &e)),
        }
    }
    if diags.is_empty() {
        (Some(tables), diags)
    } else {
        (None, diags)
    }
}

fn finish_pass(
    state: &mut CompilationState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    elapsed: Duration,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_pass_complete(pass_id, &diags);
    let is_err = has_errors(&diags);
    state.diagnostics.extend(diags);
    log::debug!(
        "{} complete, {:.1}ms",
        descriptor(pass_id).name,
        elapsed.as_secs_f64() * 1000.0
    );
    if is_err {
        state.has_error = true;
        return Err(PipelineError {
            failing_pass: pass_id,
        });
    }
    Ok(())
}

/// Run the minimal set of passes to produce `terminal`.
///
/// Per pass: execute, then `on_pass_complete`, then the error check. A pass
/// whose input artifact is missing reports itself as failed.
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    options: &RenderOptions,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    for pass_id in required_passes(terminal) {
        let t = Instant::now();
        match pass_id {
            PassId::Resolve => {
                let (tables, diags) = resolve_pass(&state.manifest);
                state.tables = tables;
                finish_pass(state, pass_id, diags, t.elapsed(), &mut on_pass_complete)?;
            }
            PassId::Plan => {
                let Some(tables) = state.tables.as_deref() else {
                    return Err(PipelineError {
                        failing_pass: pass_id,
                    });
                };
                let result = build_plan(&state.manifest, tables);
                state.plan = result.plan;
                finish_pass(
                    state,
                    pass_id,
                    result.diagnostics,
                    t.elapsed(),
                    &mut on_pass_complete,
                )?;
            }
            PassId::Render => {
                let Some(plan) = &state.plan else {
                    return Err(PipelineError {
                        failing_pass: pass_id,
                    });
                };
                state.generated = Some(render(plan, options));
                finish_pass(state, pass_id, Vec::new(), t.elapsed(), &mut on_pass_complete)?;
            }
        }
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────
