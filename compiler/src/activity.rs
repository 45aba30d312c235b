// activity.rs — Start/Stop activity pairing
//
// A Stop event at value V pairs with the Start event at V−1 when both share
// channel, level, task and keyword mask and the Stop carries no payload.
// The helper's name is the longest common prefix of the two event symbols,
// cut back to its last `_` so `Foo_Start` / `Foo_Stop` name `Foo_` rather
// than `Foo_St`. Pairs whose cut names coincide keep their full common
// prefix instead. Naming is a heuristic: an empty or still-duplicated name
// is reported and the pair dropped.
//
// Preconditions: `table` was resolved from `provider`.
// Failure modes: none; misses are not errors.
// Side effects: `log::warn!` for dropped pairs.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::diag::{codes, DiagLevel, Diagnostic, Location};
use crate::ident::SymbolTable;
use crate::schema::{Event, Provider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Stop,
}

fn phase(event: &Event) -> Option<Phase> {
    let opcode = event.opcode.as_deref()?;
    match opcode.strip_prefix("win:").unwrap_or(opcode) {
        "Start" => Some(Phase::Start),
        "Stop" => Some(Phase::Stop),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityPair {
    pub symbol: String,
    /// Event indices within the provider.
    pub start: usize,
    pub stop: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityScan {
    pub pairs: Vec<ActivityPair>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Longest common prefix, on character boundaries.
pub fn common_prefix<'s>(a: &'s str, b: &str) -> &'s str {
    let end = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map(|((i, c), _)| i + c.len_utf8())
        .unwrap_or(0);
    &a[..end]
}

/// Activity name for a start/stop symbol pair.
pub fn activity_symbol(start: &str, stop: &str) -> String {
    let prefix = common_prefix(start, stop);
    if prefix == start || prefix == stop {
        return prefix.to_string();
    }
    match prefix.rfind('_') {
        Some(i) => prefix[..=i].to_string(),
        None => prefix.to_string(),
    }
}

pub fn find_activities(provider: &Provider, table: &SymbolTable) -> ActivityScan {
    // value → (event index, phase); the highest version of a value wins.
    let mut by_value: BTreeMap<u16, (usize, Phase)> = BTreeMap::new();
    for (i, event) in provider.events.iter().enumerate() {
        if event.not_logged {
            continue;
        }
        let Some(p) = phase(event) else { continue };
        match by_value.get(&event.value) {
            Some(&(j, _)) if provider.events[j].version >= event.version => {}
            _ => {
                by_value.insert(event.value, (i, p));
            }
        }
    }

    let mut scan = ActivityScan::default();
    let mut candidates = Vec::new();
    for (&value, &(stop, p)) in &by_value {
        if p != Phase::Stop || value == 0 {
            continue;
        }
        let Some(&(start, Phase::Start)) = by_value.get(&(value - 1)) else {
            continue;
        };
        let a = &table.events[start].descriptor;
        let b = &table.events[stop].descriptor;
        if (a.channel, a.level, a.task, a.keyword) != (b.channel, b.level, b.task, b.keyword) {
            continue;
        }
        if !provider.events[stop].properties().is_empty() {
            continue;
        }

        let start_sym = &table.events[start].symbol;
        let stop_sym = &table.events[stop].symbol;
        let symbol = activity_symbol(start_sym, stop_sym);
        if symbol.is_empty() {
            log::warn!(
                "{}: no common prefix for activity {} / {}",
                table.provider,
                start_sym,
                stop_sym
            );
            scan.diagnostics.push(
                Diagnostic::new(
                    DiagLevel::Warning,
                    Location::provider(&provider.name).with_event(start_sym),
                    format!(
                        "start/stop pair {} / {} has no common name prefix; activity helper skipped",
                        start_sym, stop_sym
                    ),
                )
                .with_code(codes::W0300)
                .with_hint("give the two events symbols sharing a prefix, e.g. Foo_Start / Foo_Stop"),
            );
            continue;
        }
        candidates.push((start, stop, symbol));
    }

    let mut uses: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, _, symbol) in &candidates {
        *uses.entry(symbol.as_str()).or_default() += 1;
    }
    let mut taken = BTreeSet::new();
    for (start, stop, cut) in &candidates {
        let start_sym = &table.events[*start].symbol;
        let stop_sym = &table.events[*stop].symbol;
        let symbol = if uses.get(cut.as_str()).copied().unwrap_or(0) > 1 {
            common_prefix(start_sym, stop_sym).to_string()
        } else {
            cut.clone()
        };
        if !taken.insert(symbol.clone()) {
            log::warn!(
                "{}: activity name {} already taken by an earlier pair",
                table.provider,
                symbol
            );
            scan.diagnostics.push(
                Diagnostic::new(
                    DiagLevel::Warning,
                    Location::provider(&provider.name).with_event(start_sym),
                    format!(
                        "start/stop pair {} / {} would reuse activity name {}; activity helper skipped",
                        start_sym, stop_sym, symbol
                    ),
                )
                .with_code(codes::W0301)
                .with_hint("give each start/stop pair a distinct symbol prefix"),
            );
            continue;
        }
        scan.pairs.push(ActivityPair {
            symbol,
            start: *start,
            stop: *stop,
        });
    }
    scan
}
