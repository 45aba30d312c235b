// pass.rs — Pass descriptors: metadata, upstream edges, artifact IDs
//
// Declares the back end's three passes (schema loading is outside the
// runner), the pass each one consumes, and the artifacts they produce. The
// passes form a chain, so the subset for an --emit target is the chain
// walked back from the target.

// ── Pass and Artifact identifiers ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Resolve,
    Plan,
    Render,
}

/// Machine-readable artifact identifiers. Each maps to a field of
/// `CompilationState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Symbols,   // Vec<SymbolTable>
    Plan,      // GenerationPlan
    Generated, // String
}

// ── Pass descriptor ────────────────────────────────────────────────────────

pub struct PassDescriptor {
    /// Human-readable name for log output.
    pub name: &'static str,
    /// Pass whose output this pass consumes.
    pub input: Option<PassId>,
    pub outputs: &'static [ArtifactId],
    /// Documentation only.
    pub invariants: &'static str,
}

pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Resolve => PassDescriptor {
            name: "resolve",
            input: None,
            outputs: &[ArtifactId::Symbols],
            invariants: "every entity has a stable identifier, every event a descriptor",
        },
        PassId::Plan => PassDescriptor {
            name: "plan",
            input: Some(PassId::Resolve),
            outputs: &[ArtifactId::Plan],
            invariants: "templates deduplicated by suffix, layouts fixed by shape",
        },
        PassId::Render => PassDescriptor {
            name: "render",
            input: Some(PassId::Plan),
            outputs: &[ArtifactId::Generated],
            invariants: "output is a pure function of plan and options",
        },
    }
}

// ── Pass chain ─────────────────────────────────────────────────────────────

pub const ALL_PASSES: [PassId; 3] = [PassId::Resolve, PassId::Plan, PassId::Render];

/// Passes needed to produce `terminal`, in execution order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut chain: Vec<PassId> =
        std::iter::successors(Some(terminal), |&id| descriptor(id).input).collect();
    chain.reverse();
    chain
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_passes_render_includes_all() {
        assert_eq!(
            required_passes(PassId::Render),
            vec![PassId::Resolve, PassId::Plan, PassId::Render]
        );
    }

    #[test]
    fn required_passes_plan_skips_render() {
        assert_eq!(
            required_passes(PassId::Plan),
            vec![PassId::Resolve, PassId::Plan]
        );
    }

    #[test]
    fn resolve_needs_nothing_upstream() {
        assert_eq!(required_passes(PassId::Resolve), vec![PassId::Resolve]);
    }

    #[test]
    fn chain_ends_at_target() {
        for pass in ALL_PASSES {
            let order = required_passes(pass);
            assert_eq!(order.last(), Some(&pass));
            if let Some(upstream) = descriptor(pass).input {
                assert_eq!(order[order.len() - 2], upstream);
            }
        }
    }

    #[test]
    fn every_pass_produces_an_artifact() {
        assert!(ALL_PASSES.iter().all(|&p| !descriptor(p).outputs.is_empty()));
    }
}
