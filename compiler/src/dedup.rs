// dedup.rs — Template deduplication by mangled signature
//
// Logged events are grouped by their template's mangled suffix. The first
// template seen for a key is canonical; the mangler guarantees structural
// equality for equal keys, so which one wins never changes output. Iteration
// is ordinal by key, independent of input order.
//
// Sets are built per provider and merged for the output file; merging keeps
// the receiver's entry on a key clash.
//
// Failure modes: mangling errors, reported with the offending event index.
// Side effects: none.

use std::collections::BTreeMap;

use crate::error::CodegenError;
use crate::mangle::mangle_template;
use crate::schema::{Event, Property};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSet<'a> {
    by_key: BTreeMap<String, &'a [Property]>,
}

impl<'a> TemplateSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the key was already present (the existing entry stays).
    pub fn insert(&mut self, key: String, properties: &'a [Property]) -> bool {
        match self.by_key.entry(key) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(v) => {
                v.insert(properties);
                true
            }
        }
    }

    pub fn merge(&mut self, other: TemplateSet<'a>) {
        for (key, properties) in other.by_key {
            self.insert(key, properties);
        }
    }

    pub fn get(&self, key: &str) -> Option<&'a [Property]> {
        self.by_key.get(key).copied()
    }

    /// Entries in ordinal key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &'a [Property])> + '_ {
        self.by_key.iter().map(|(k, p)| (k.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Templates of one provider plus each event's key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTemplates<'a> {
    /// Parallel to the provider's events; `None` for events that are not logged.
    pub event_keys: Vec<Option<String>>,
    pub templates: TemplateSet<'a>,
}

/// Group a provider's logged events by template signature.
pub fn provider_templates(events: &[Event]) -> Result<ProviderTemplates<'_>, (usize, CodegenError)> {
    let mut templates = TemplateSet::new();
    let mut event_keys = Vec::with_capacity(events.len());
    for (i, event) in events.iter().enumerate() {
        if event.not_logged {
            event_keys.push(None);
            continue;
        }
        let properties = event.properties();
        let key = mangle_template(properties).map_err(|e| (i, e))?;
        templates.insert(key.clone(), properties);
        event_keys.push(Some(key));
    }
    Ok(ProviderTemplates {
        event_keys,
        templates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cardinality, InType, Template};

    fn event(value: u16, props: Vec<Property>) -> Event {
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
            template: if props.is_empty() {
                None
            } else {
                Some(Template { properties: props })
            },
        }
    }

    #[test]
    fn structurally_equal_templates_share_one_entry() {
        let events = vec![
            event(1, vec![Property::data("Pid", InType::UInt32)]),
            event(2, vec![Property::data("Tid", InType::Int32)]),
        ];
        let pt = provider_templates(&events).unwrap();
        assert_eq!(pt.templates.len(), 1);
        assert_eq!(pt.event_keys, vec![Some("d".into()), Some("d".into())]);
        // First encountered is canonical.
        assert_eq!(pt.templates.get("d").unwrap()[0].name(), "Pid");
    }

    #[test]
    fn keys_iterate_in_ordinal_order() {
        let events = vec![
            event(1, vec![Property::data("X", InType::UInt32)]),
            event(2, vec![]),
            event(
                3,
                vec![
                    Property::data("N", InType::UInt16),
                    Property::data("S", InType::UnicodeString)
                        .with_count(Cardinality::Ref("N".into())),
                ],
            ),
        ];
        let pt = provider_templates(&events).unwrap();
        let keys: Vec<&str> = pt.templates.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["", "d", "hZR0"]);
    }

    #[test]
    fn not_logged_events_are_excluded() {
        let mut hidden = event(1, vec![Property::data("X", InType::Double)]);
        hidden.not_logged = true;
        let events = vec![hidden, event(2, vec![])];
        let pt = provider_templates(&events).unwrap();
        assert_eq!(pt.event_keys[0], None);
        assert_eq!(pt.templates.len(), 1);
        assert!(pt.templates.get("g").is_none());
    }

    #[test]
    fn merge_keeps_receiver_entry() {
        let a = vec![Property::data("First", InType::UInt8)];
        let b = vec![Property::data("Second", InType::Int8)];
        let mut left = TemplateSet::new();
        left.insert("c".into(), &a);
        let mut right = TemplateSet::new();
        right.insert("c".into(), &b);
        right.insert("".into(), &[]);
        left.merge(right);
        assert_eq!(left.len(), 2);
        assert_eq!(left.get("c").unwrap()[0].name(), "First");
    }

    #[test]
    fn mangling_error_reports_event_index() {
        let events = vec![
            event(1, vec![]),
            event(2, vec![Property::data("B", InType::Binary)]),
        ];
        let (index, err) = provider_templates(&events).unwrap_err();
        assert_eq!(index, 1);
        assert!(matches!(err, CodegenError::InvalidCardinality { .. }));
    }
}
