// Dialect equivalence: both renderers read one GenerationPlan, so for the
// same schema they must emit the same template set, the same descriptor
// count per template, and the same set of event wrappers.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use emc::pass::PassId;
use emc::pipeline::{run_pipeline, CompilationState};
use emc::render::{Dialect, RenderOptions};

fn load(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

fn compile(source: &str, dialect: Dialect) -> (String, Vec<(String, usize)>) {
    let mut state = CompilationState::from_source(source).unwrap();
    let options = RenderOptions {
        dialect,
        ..RenderOptions::default()
    };
    run_pipeline(&mut state, PassId::Render, &options, |_, _| {}).unwrap();
    let plan = state.plan.as_ref().unwrap();
    let templates = plan
        .templates
        .iter()
        .map(|t| (t.key.clone(), t.slot_count))
        .collect();
    (state.generated.unwrap(), templates)
}

/// Template key → descriptor array length, from `EMC_*_DEFINED` guards.
fn cxx_templates(out: &str) -> BTreeMap<String, usize> {
    let mut found = BTreeMap::new();
    let mut current: Option<String> = None;
    for line in out.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("#ifndef EMC_") {
            if let Some(name) = rest.strip_suffix("_DEFINED") {
                current = match name {
                    "RUNTIME" => None,
                    "WriteNoPayload" => Some(String::new()),
                    other => other.strip_prefix("Template_").map(str::to_string),
                };
            }
        } else if let Some(rest) = line.strip_prefix("EVENT_DATA_DESCRIPTOR EventData[") {
            if let Some(key) = current.take() {
                let n: usize = rest.trim_end_matches("];").parse().unwrap();
                found.insert(key, n);
            }
        }
    }
    found
}

/// Template key → descriptor array length, from `_ARGCOUNT` defines.
fn mc_templates(out: &str) -> BTreeMap<String, usize> {
    let mut found = BTreeMap::new();
    for line in out.lines() {
        let Some(rest) = line.strip_prefix("#define McTemplateU0") else {
            continue;
        };
        let mut parts = rest.split_whitespace();
        let (Some(name), Some(count)) = (parts.next(), parts.next()) else {
            continue;
        };
        if let Some(key) = name.strip_suffix("_ARGCOUNT") {
            found.insert(key.to_string(), count.parse::<usize>().unwrap() + 1);
        }
    }
    found
}

fn cxx_wrappers(out: &str) -> BTreeSet<String> {
    out.lines()
        .filter_map(|l| l.strip_prefix("inline ULONG EventWrite"))
        .map(|rest| rest.split('(').next().unwrap().to_string())
        .collect()
}

fn mc_wrappers(out: &str) -> BTreeSet<String> {
    out.lines()
        .filter_map(|l| l.strip_prefix("#define EventWrite"))
        .map(|rest| rest.split('(').next().unwrap().to_string())
        .collect()
}

#[test]
fn widgets_same_templates_and_slot_counts() {
    let source = load("widgets.json");
    let (cxx, plan_templates) = compile(&source, Dialect::Cxx);
    let (mc, _) = compile(&source, Dialect::Mc);

    let expected: BTreeMap<String, usize> = plan_templates.into_iter().collect();
    assert_eq!(cxx_templates(&cxx), expected);
    assert_eq!(mc_templates(&mc), expected);
}

#[test]
fn widgets_same_event_wrappers() {
    let source = load("widgets.json");
    let (cxx, _) = compile(&source, Dialect::Cxx);
    let (mc, _) = compile(&source, Dialect::Mc);
    let a = cxx_wrappers(&cxx);
    assert_eq!(a, mc_wrappers(&mc));
    assert!(a.contains("Transfer"));
    assert!(a.contains("GadgetTick"));
    assert!(!a.contains("Reserved"), "not-logged events get no wrapper");
}

#[test]
fn templates_are_shared_across_providers() {
    let source = load("widgets.json");
    let (cxx, templates) = compile(&source, Dialect::Cxx);
    let keys: Vec<&str> = templates.iter().map(|(k, _)| k.as_str()).collect();
    // Heartbeat (UInt64) and GadgetTick (HexInt64) share one shape.
    assert_eq!(keys.iter().filter(|k| **k == "x").count(), 1);
    assert_eq!(cxx.matches("#ifndef EMC_Template_x_DEFINED").count(), 1);
    assert_eq!(cxx.matches("#ifndef EMC_WriteNoPayload_DEFINED").count(), 1);

    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted, "templates are emitted in ordinal key order");
}

#[test]
fn minimal_schema_equivalent() {
    let source = load("minimal.json");
    let (cxx, templates) = compile(&source, Dialect::Cxx);
    let (mc, _) = compile(&source, Dialect::Mc);
    assert_eq!(templates, vec![(String::new(), 1)]);
    assert_eq!(cxx_templates(&cxx), mc_templates(&mc));
}
