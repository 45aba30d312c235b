// Snapshot tests: lock generated header sections to detect unintended output changes.
//
// Uses the library API (load → resolve → plan → render) directly. Snapshots
// are managed by `insta` and stored under `compiler/tests/snapshots/`.
//
// Run `cargo insta review` after intentional output changes to update baselines.

use std::path::Path;

use emc::pass::PassId;
use emc::pipeline::{run_pipeline, CompilationState};
use emc::render::RenderOptions;

fn render_fixture(name: &str, options: &RenderOptions) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let source = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
    let mut state = CompilationState::from_source(&source).unwrap();
    run_pipeline(&mut state, PassId::Render, options, |_, _| {}).unwrap();
    state.generated.unwrap()
}

/// Everything from the first provider banner on; the runtime and template
/// sections are covered by unit tests.
fn provider_section(header: &str) -> &str {
    let start = header
        .find("// Provider \"")
        .expect("header has no provider section");
    &header[start..]
}

#[test]
fn snapshot_minimal_cxx_provider() {
    let options = RenderOptions {
        non_essentials: false,
        ..RenderOptions::default()
    };
    let header = render_fixture("minimal.json", &options);
    let section = provider_section(&header);
    insta::assert_snapshot!("minimal_cxx_provider", section);
}
