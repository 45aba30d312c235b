// diag.rs — Unified diagnostics model
//
// Shared diagnostic types emitted by the resolve, plan and render passes.
// Errors abort generation of the affected provider; warnings flag heuristic
// results worth a human look and never change output.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::error::CodegenError;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0101`, `W0300`).
///
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // E01xx: resolve
    pub const E0101: DiagCode = DiagCode("E0101"); // unknown entity reference
    pub const E0102: DiagCode = DiagCode("E0102"); // duplicate event identity

    // E02xx: plan
    pub const E0201: DiagCode = DiagCode("E0201"); // invalid cardinality
    pub const E0202: DiagCode = DiagCode("E0202"); // dangling count/length reference
    pub const E0203: DiagCode = DiagCode("E0203"); // forward count/length reference
    pub const E0204: DiagCode = DiagCode("E0204"); // provider traits too large

    // W03xx: heuristics
    pub const W0300: DiagCode = DiagCode("W0300"); // activity with empty symbol
    pub const W0301: DiagCode = DiagCode("W0301"); // activity name already taken
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Location ─────────────────────────────────────────────────────────────

/// Where in the schema graph a diagnostic applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub provider: Option<String>,
    pub event: Option<String>,
}

impl Location {
    pub fn provider(name: impl Into<String>) -> Self {
        Location {
            provider: Some(name.into()),
            event: None,
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.provider, &self.event) {
            (Some(p), Some(e)) => write!(f, "{}::{}", p, e),
            (Some(p), None) => write!(f, "{}", p),
            (None, Some(e)) => write!(f, "{}", e),
            (None, None) => Ok(()),
        }
    }
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub location: Location,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code or hint.
    pub fn new(level: DiagLevel, location: Location, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            location,
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Lift an internal generation error into an error-level diagnostic.
    pub fn from_error(location: Location, err: &CodegenError) -> Self {
        let code = match err {
            CodegenError::UnknownEntity { .. } => codes::E0101,
            CodegenError::DuplicateEvent { .. } => codes::E0102,
            CodegenError::InvalidCardinality { .. } => codes::E0201,
            CodegenError::DanglingReference { .. } => codes::E0202,
            CodegenError::ForwardReference { .. } => codes::E0203,
            CodegenError::TraitsTooLarge { .. } => codes::E0204,
        };
        Diagnostic::new(DiagLevel::Error, location, err.to_string())
            .with_code(code)
            .with_hint("the schema validator should have rejected this manifest")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: ", level, code)?;
        } else {
            write!(f, "{}: ", level)?;
        }
        let location = self.location.to_string();
        if !location.is_empty() {
            write!(f, "{}: ", location)?;
        }
        write!(f, "{}", self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.level == DiagLevel::Error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_message_has_no_location_prefix() {
        let d = Diagnostic::new(DiagLevel::Error, Location::default(), "no providers to plan");
        assert_eq!(format!("{d}"), "error: no providers to plan");
    }

    #[test]
    fn display_with_code_and_location() {
        let d = Diagnostic::new(
            DiagLevel::Warning,
            Location::provider("Contoso").with_event("Foo_Start"),
            "empty activity symbol",
        )
        .with_code(codes::W0300);
        assert_eq!(
            format!("{d}"),
            "warning[W0300]: Contoso::Foo_Start: empty activity symbol"
        );
    }

    #[test]
    fn from_error_maps_codes() {
        let err = CodegenError::ForwardReference {
            property: "Data".into(),
            target: "Size".into(),
        };
        let d = Diagnostic::from_error(Location::provider("P"), &err);
        assert_eq!(d.code, Some(codes::E0203));
        assert_eq!(d.level, DiagLevel::Error);
        assert!(d.hint.is_some());
        assert!(has_errors(&[d]));
    }
}
