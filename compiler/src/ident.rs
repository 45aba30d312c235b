// ident.rs — Stable identifiers for generated symbols
//
// Every schema entity gets a canonical C identifier: the authored symbol when
// there is one, otherwise a per-kind deterministic fallback. All functions
// here are total and pure; there are no counters, so the same entity state
// always yields the same string.
//
// `resolve_provider` also resolves an event's channel/level/task/opcode/
// keyword references into its numeric descriptor, producing the immutable
// `SymbolTable` the plan pass reads.
//
// Failure modes: unknown entity references, duplicate (value, version) pairs.
// Side effects: none.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::CodegenError;
use crate::schema::{Event, Map, MapItem, MapKind, Property, Provider};
use crate::strategy::PropertyStrategy;

// ── Sanitization ────────────────────────────────────────────────────────────

/// Map an arbitrary name onto `[A-Za-z0-9_]+` without a leading digit.
///
/// Each invalid character becomes `_`. A leading run of digits collapses to a
/// single `_` and the result gains a `_` prefix, so `"3rd-party.Event!"`
/// becomes `"__rd_party_Event_"`.
pub fn sanitize(name: &str) -> String {
    let digits = name.chars().take_while(|c| c.is_ascii_digit()).count();
    let mut out = String::with_capacity(name.len() + 1);
    if digits > 0 {
        out.push_str("__");
    }
    for c in name.chars().skip(digits) {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Authored symbol, if present and non-blank. Invalid spellings are sanitized.
fn authored(symbol: Option<&str>) -> Option<String> {
    let symbol = symbol?.trim();
    if symbol.is_empty() {
        None
    } else if is_identifier(symbol) {
        Some(symbol.to_string())
    } else {
        Some(sanitize(symbol))
    }
}

// ── Per-kind resolution ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Channel,
    Level,
    Task,
    Opcode,
    Keyword,
}

impl ValueKind {
    fn tag(self) -> &'static str {
        match self {
            ValueKind::Channel => "CHANNEL",
            ValueKind::Level => "LEVEL",
            ValueKind::Task => "TASK",
            ValueKind::Opcode => "OPCODE",
            ValueKind::Keyword => "KEYWORD",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            ValueKind::Channel => "channel",
            ValueKind::Level => "level",
            ValueKind::Task => "task",
            ValueKind::Opcode => "opcode",
            ValueKind::Keyword => "keyword",
        }
    }
}

pub fn provider_symbol(provider: &Provider) -> String {
    authored(provider.symbol.as_deref()).unwrap_or_else(|| sanitize(&provider.name))
}

/// `{P}_{KIND}_{Name}`; the value stands in for a blank name.
pub fn value_symbol(
    provider: &str,
    kind: ValueKind,
    symbol: Option<&str>,
    name: &str,
    value: u64,
) -> String {
    authored(symbol).unwrap_or_else(|| {
        let stem = if name.trim().is_empty() {
            value.to_string()
        } else {
            name.to_string()
        };
        sanitize(&format!("{}_{}_{}", provider, kind.tag(), stem))
    })
}

pub fn map_symbol(provider: &str, map: &Map) -> String {
    authored(map.symbol.as_deref())
        .unwrap_or_else(|| sanitize(&format!("{}_MAP_{}", provider, map.name)))
}

pub fn map_item_symbol(map: &str, index: usize, item: &MapItem) -> String {
    authored(item.symbol.as_deref()).unwrap_or_else(|| format!("{}{}", map, index))
}

pub fn string_symbol(provider: &str, id: &str, symbol: Option<&str>) -> String {
    authored(symbol).unwrap_or_else(|| sanitize(&format!("{}_MSG_{}", provider, id)))
}

/// The fallback spells out the event's full identity, so anonymous events
/// never collide.
pub fn event_symbol(provider: &str, event: &Event, descriptor: &EventDescriptor) -> String {
    authored(event.symbol.as_deref()).unwrap_or_else(|| {
        format!(
            "{}_EVENT_0x{:x}_{:x}_{:x}_{:x}_{:x}_{:x}_{:x}",
            provider,
            descriptor.id,
            descriptor.version,
            descriptor.channel,
            descriptor.level,
            descriptor.opcode,
            descriptor.task,
            descriptor.keyword
        )
    })
}

/// Parameter identifiers for a template, unique within it.
///
/// A property that takes an implicit length parameter also claims
/// `{name}_Len`, so no declared property can shadow it.
pub fn property_symbols(properties: &[Property], strategies: &[PropertyStrategy]) -> Vec<String> {
    let mut seen = HashSet::new();
    properties
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let with_len = strategies
                .get(i)
                .is_some_and(PropertyStrategy::needs_length_param);
            let taken = |seen: &HashSet<String>, name: &str| {
                seen.contains(name) || (with_len && seen.contains(&format!("{}_Len", name)))
            };
            let mut name = sanitize(p.name());
            while taken(&seen, &name) {
                name = format!("{}_{}", name, i);
            }
            if with_len {
                seen.insert(format!("{}_Len", name));
            }
            seen.insert(name.clone());
            name
        })
        .collect()
}

// ── Symbol table ────────────────────────────────────────────────────────────

/// The 7-field event descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct EventDescriptor {
    pub id: u16,
    pub version: u8,
    pub channel: u8,
    pub level: u8,
    pub opcode: u8,
    pub task: u16,
    pub keyword: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedValue {
    pub symbol: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMap {
    pub symbol: String,
    pub kind: MapKind,
    pub items: Vec<ResolvedValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedString {
    pub symbol: String,
    pub message_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEvent {
    pub symbol: String,
    pub descriptor: EventDescriptor,
}

/// Resolved identifiers for one provider. Parallel to the provider's own
/// collections (index `i` here describes entity `i` there).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolTable {
    pub provider: String,
    pub channels: Vec<ResolvedValue>,
    pub levels: Vec<ResolvedValue>,
    pub tasks: Vec<ResolvedValue>,
    pub opcodes: Vec<ResolvedValue>,
    pub keywords: Vec<ResolvedValue>,
    pub maps: Vec<ResolvedMap>,
    pub strings: Vec<ResolvedString>,
    pub events: Vec<ResolvedEvent>,
}

fn resolve_values<'a>(
    provider: &str,
    kind: ValueKind,
    items: impl Iterator<Item = (&'a str, Option<&'a str>, u64)>,
) -> Vec<ResolvedValue> {
    items
        .map(|(name, symbol, value)| ResolvedValue {
            symbol: value_symbol(provider, kind, symbol, name, value),
            value,
        })
        .collect()
}

struct ValueIndex<'a> {
    kind: ValueKind,
    by_name: HashMap<&'a str, u64>,
}

impl<'a> ValueIndex<'a> {
    fn new(kind: ValueKind, items: impl Iterator<Item = (&'a str, u64)>) -> Self {
        let mut by_name = HashMap::new();
        for (name, value) in items {
            by_name.entry(name).or_insert(value);
        }
        ValueIndex { kind, by_name }
    }

    fn lookup(&self, event: &Event, name: Option<&str>) -> Result<u64, CodegenError> {
        let Some(name) = name else {
            return Ok(0);
        };
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UnknownEntity {
                event: format!("{}v{}", event.value, event.version),
                kind: self.kind.noun(),
                name: name.to_string(),
            })
    }
}

/// Resolve every identifier and event descriptor of one provider.
pub fn resolve_provider(provider: &Provider) -> Result<SymbolTable, CodegenError> {
    let psym = provider_symbol(provider);

    let channels = resolve_values(
        &psym,
        ValueKind::Channel,
        provider
            .channels
            .iter()
            .map(|c| (c.name.as_str(), c.symbol.as_deref(), u64::from(c.value))),
    );
    let levels = resolve_values(
        &psym,
        ValueKind::Level,
        provider
            .levels
            .iter()
            .map(|l| (l.name.as_str(), l.symbol.as_deref(), u64::from(l.value))),
    );
    let tasks = resolve_values(
        &psym,
        ValueKind::Task,
        provider
            .tasks
            .iter()
            .map(|t| (t.name.as_str(), t.symbol.as_deref(), u64::from(t.value))),
    );
    let opcodes = resolve_values(
        &psym,
        ValueKind::Opcode,
        provider
            .opcodes
            .iter()
            .map(|o| (o.name.as_str(), o.symbol.as_deref(), u64::from(o.value))),
    );
    let keywords = resolve_values(
        &psym,
        ValueKind::Keyword,
        provider
            .keywords
            .iter()
            .map(|k| (k.name.as_str(), k.symbol.as_deref(), k.mask)),
    );

    let maps = provider
        .maps
        .iter()
        .map(|m| {
            let symbol = map_symbol(&psym, m);
            let items = m
                .items
                .iter()
                .enumerate()
                .map(|(i, item)| ResolvedValue {
                    symbol: map_item_symbol(&symbol, i, item),
                    value: u64::from(item.value),
                })
                .collect();
            ResolvedMap {
                symbol,
                kind: m.kind,
                items,
            }
        })
        .collect();

    let strings = provider
        .strings
        .iter()
        .map(|s| ResolvedString {
            symbol: string_symbol(&psym, &s.id, s.symbol.as_deref()),
            message_id: s.message_id,
        })
        .collect();

    let channel_index = ValueIndex::new(
        ValueKind::Channel,
        provider
            .channels
            .iter()
            .map(|c| (c.name.as_str(), u64::from(c.value))),
    );
    let level_index = ValueIndex::new(
        ValueKind::Level,
        provider
            .levels
            .iter()
            .map(|l| (l.name.as_str(), u64::from(l.value))),
    );
    let task_index = ValueIndex::new(
        ValueKind::Task,
        provider
            .tasks
            .iter()
            .map(|t| (t.name.as_str(), u64::from(t.value))),
    );
    let opcode_index = ValueIndex::new(
        ValueKind::Opcode,
        provider
            .opcodes
            .iter()
            .map(|o| (o.name.as_str(), u64::from(o.value))),
    );
    let keyword_index = ValueIndex::new(
        ValueKind::Keyword,
        provider.keywords.iter().map(|k| (k.name.as_str(), k.mask)),
    );

    let mut identities = HashSet::new();
    let mut events = Vec::with_capacity(provider.events.len());
    for event in &provider.events {
        if !identities.insert((event.value, event.version)) {
            return Err(CodegenError::DuplicateEvent {
                provider: provider.name.clone(),
                value: event.value,
                version: event.version,
            });
        }
        let mut keyword = 0u64;
        for name in &event.keywords {
            keyword |= keyword_index.lookup(event, Some(name))?;
        }
        // Values were declared with their narrow types, so these casts are lossless.
        let descriptor = EventDescriptor {
            id: event.value,
            version: event.version,
            channel: channel_index.lookup(event, event.channel.as_deref())? as u8,
            level: level_index.lookup(event, event.level.as_deref())? as u8,
            opcode: opcode_index.lookup(event, event.opcode.as_deref())? as u8,
            task: task_index.lookup(event, event.task.as_deref())? as u16,
            keyword,
        };
        events.push(ResolvedEvent {
            symbol: event_symbol(&psym, event, &descriptor),
            descriptor,
        });
    }

    Ok(SymbolTable {
        provider: psym,
        channels,
        levels,
        tasks,
        opcodes,
        keywords,
        maps,
        strings,
        events,
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{InType, Keyword, NamedValue};

    fn provider(events: Vec<Event>) -> Provider {
        Provider {
            name: "Contoso-Widgets".into(),
            guid: "3970f9cf-2c0c-4f11-b1cc-e3a1e9958833".parse().unwrap(),
            control_guid: None,
            symbol: None,
            include_name_in_traits: false,
            include_process_name: false,
            channels: vec![NamedValue {
                name: "Contoso/Operational".into(),
                value: 0x10,
                symbol: None,
            }],
            levels: vec![NamedValue {
                name: "win:Informational".into(),
                value: 4,
                symbol: Some("WINEVENT_LEVEL_INFO".into()),
            }],
            tasks: vec![],
            opcodes: vec![NamedValue {
                name: "win:Start".into(),
                value: 1,
                symbol: None,
            }],
            keywords: vec![
                Keyword {
                    name: "Network".into(),
                    mask: 0x1,
                    symbol: None,
                },
                Keyword {
                    name: "Disk".into(),
                    mask: 0x4,
                    symbol: None,
                },
            ],
            maps: vec![],
            strings: vec![],
            events,
        }
    }

    fn event(value: u16) -> Event {
        Event {
            value,
            version: 0,
            channel: None,
            level: None,
            task: None,
            opcode: None,
            keywords: vec![],
            not_logged: false,
            symbol: None,
            template: None,
        }
    }

    #[test]
    fn sanitize_example() {
        assert_eq!(sanitize("3rd-party.Event!"), "__rd_party_Event_");
    }

    #[test]
    fn sanitize_edge_cases() {
        assert_eq!(sanitize(""), "_");
        assert_eq!(sanitize("   "), "___");
        assert_eq!(sanitize("Already_Valid9"), "Already_Valid9");
        assert_eq!(sanitize("42"), "__");
        assert_eq!(sanitize("ünïcode"), "_n_code");
    }

    #[test]
    fn authored_symbol_verbatim_blank_ignored() {
        let mut p = provider(vec![]);
        p.symbol = Some("CONTOSO".into());
        assert_eq!(provider_symbol(&p), "CONTOSO");
        p.symbol = Some("  ".into());
        assert_eq!(provider_symbol(&p), "Contoso_Widgets");
    }

    #[test]
    fn value_symbol_fallbacks() {
        assert_eq!(
            value_symbol("P", ValueKind::Channel, None, "Contoso/Operational", 16),
            "P_CHANNEL_Contoso_Operational"
        );
        assert_eq!(
            value_symbol("P", ValueKind::Task, None, "", 7),
            "P_TASK_7"
        );
        assert_eq!(
            value_symbol("P", ValueKind::Level, Some("LVL"), "x", 1),
            "LVL"
        );
    }

    #[test]
    fn blank_names_fall_back_to_distinct_values() {
        let a = value_symbol("P", ValueKind::Task, None, "", 7);
        let b = value_symbol("P", ValueKind::Task, None, "  ", 8);
        assert_ne!(a, b);
        assert_eq!(b, "P_TASK_8");
        assert_eq!(string_symbol("P", "1001", None), "P_MSG_1001");
        assert_ne!(string_symbol("P", "1001", None), string_symbol("P", "1002", None));
        assert!(is_identifier(&string_symbol("P", "msg.2", None)));
    }

    #[test]
    fn map_item_fallback_uses_index() {
        let item = MapItem {
            value: 5,
            symbol: None,
            message: None,
        };
        assert_eq!(map_item_symbol("Colors", 2, &item), "Colors2");
    }

    #[test]
    fn event_fallback_encodes_identity() {
        let mut e = event(0x2a);
        e.version = 1;
        e.channel = Some("Contoso/Operational".into());
        e.level = Some("win:Informational".into());
        e.opcode = Some("win:Start".into());
        e.keywords = vec!["Network".into(), "Disk".into()];
        let table = resolve_provider(&provider(vec![e])).unwrap();
        assert_eq!(
            table.events[0].symbol,
            "Contoso_Widgets_EVENT_0x2a_1_10_4_1_0_5"
        );
        assert_eq!(table.events[0].descriptor.keyword, 0x5);
    }

    #[test]
    fn unknown_level_is_an_error() {
        let mut e = event(1);
        e.level = Some("win:Bogus".into());
        let err = resolve_provider(&provider(vec![e])).unwrap_err();
        assert!(matches!(
            err,
            CodegenError::UnknownEntity { kind: "level", .. }
        ));
    }

    #[test]
    fn duplicate_identity_is_an_error() {
        let err = resolve_provider(&provider(vec![event(3), event(3)])).unwrap_err();
        assert!(matches!(err, CodegenError::DuplicateEvent { value: 3, .. }));
    }

    #[test]
    fn property_symbols_unique() {
        let props = vec![
            Property::data("Size", InType::UInt32),
            Property::data("size!", InType::UInt32),
            Property::data("size_", InType::UInt32),
        ];
        let strategies = PropertyStrategy::for_template(&props).unwrap();
        assert_eq!(
            property_symbols(&props, &strategies),
            vec!["Size", "size_", "size__2"]
        );
    }

    #[test]
    fn property_symbols_reserve_length_params() {
        let props = vec![
            Property::data("Name_Len", InType::UInt16),
            Property::data("Name", InType::CountedUnicodeString),
            Property::data("Blob", InType::CountedBinary),
            Property::data("Blob_Len", InType::UInt32),
        ];
        let strategies = PropertyStrategy::for_template(&props).unwrap();
        assert_eq!(
            property_symbols(&props, &strategies),
            vec!["Name_Len", "Name_1", "Blob", "Blob_Len_3"]
        );
    }

    #[test]
    fn plain_properties_keep_len_suffixed_names() {
        let props = vec![
            Property::data("Count_Len", InType::UInt16),
            Property::data("Count", InType::UInt16),
        ];
        let strategies = PropertyStrategy::for_template(&props).unwrap();
        assert_eq!(property_symbols(&props, &strategies), vec!["Count_Len", "Count"]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let p = provider(vec![event(1), event(2)]);
        assert_eq!(resolve_provider(&p).unwrap(), resolve_provider(&p).unwrap());
    }
}
