//! Generation plan – the dialect-agnostic output of the back end.
//!
//! `GenerationPlan` is a self-contained, pre-resolved description of
//! everything a renderer emits: resolved symbols, descriptor tuples,
//! enable bits, per-event parameter lists, deduplicated template functions
//! with their descriptor layouts, and activity pairs. Renderers read it and
//! emit text without consulting the schema or re-running any analysis, so
//! the two dialects cannot drift in packing or layout.

use serde::Serialize;

use crate::activity::find_activities;
use crate::dedup::{provider_templates, TemplateSet};
use crate::diag::{Diagnostic, Location};
use crate::error::CodegenError;
use crate::ident::{property_symbols, EventDescriptor, ResolvedMap, ResolvedString, ResolvedValue, SymbolTable};
use crate::layout::{plan_layout, TemplateLayout};
use crate::provider_traits::ProviderTraits;
use crate::schema::{Guid, Manifest, Property, Provider};
use crate::strategy::{ParamSpec, PropertyStrategy};

// ── Top-level ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationPlan {
    pub providers: Vec<ProviderPlan>,
    /// Deduplicated across providers, ordinal by key.
    pub templates: Vec<TemplatePlan>,
}

// ── Templates ──────────────────────────────────────────────────────────────

/// One shared write function. Strategies fold fixed count × fixed length
/// into one length, so every template with a given key plans identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplatePlan {
    /// Mangled suffix; empty for the payload-free template.
    pub key: String,
    pub params: Vec<ParamSpec>,
    pub layout: TemplateLayout,
    /// Descriptor array length, metadata slot included.
    pub slot_count: usize,
}

impl TemplatePlan {
    pub fn from_properties(key: &str, properties: &[Property]) -> Result<Self, CodegenError> {
        let strategies = PropertyStrategy::for_template(properties)?;
        let params = strategies.iter().flat_map(|s| s.params()).collect();
        let layout = plan_layout(&strategies);
        let slot_count = layout.total_slots();
        Ok(TemplatePlan {
            key: key.to_string(),
            params,
            layout,
            slot_count,
        })
    }
}

// ── Providers ──────────────────────────────────────────────────────────────

/// A (level, keyword) pair with its own enablement bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnableBit {
    pub level: u8,
    pub keyword: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderPlan {
    pub name: String,
    pub symbol: String,
    pub guid: Guid,
    pub control_guid: Option<Guid>,
    pub traits: Option<ProviderTraits>,
    pub include_process_name: bool,
    pub channels: Vec<ResolvedValue>,
    pub levels: Vec<ResolvedValue>,
    pub tasks: Vec<ResolvedValue>,
    pub opcodes: Vec<ResolvedValue>,
    pub keywords: Vec<ResolvedValue>,
    pub maps: Vec<ResolvedMap>,
    pub strings: Vec<ResolvedString>,
    pub enable_bits: Vec<EnableBit>,
    pub events: Vec<EventPlan>,
    pub activities: Vec<ActivityPlan>,
}

impl ProviderPlan {
    /// 32-bit words needed to hold the enable bits.
    pub fn enable_words(&self) -> usize {
        self.enable_bits.len().div_ceil(32)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventPlan {
    pub symbol: String,
    pub descriptor: EventDescriptor,
    /// Absent for events that are not logged: they keep a descriptor only.
    pub write: Option<EventWrite>,
}

/// Enablement check and write wrapper of one logged event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventWrite {
    pub enable_bit: usize,
    pub template_key: String,
    pub params: Vec<ParamSpec>,
    /// Property identifiers; parameter names of the wrapper.
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityPlan {
    pub symbol: String,
    /// Indices into `ProviderPlan::events`.
    pub start: usize,
    pub stop: usize,
}

// ── Planning ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct PlanResult {
    pub plan: Option<GenerationPlan>,
    pub diagnostics: Vec<Diagnostic>,
}

fn assign_enable_bits(table: &SymbolTable, logged: impl Iterator<Item = usize>) -> (Vec<EnableBit>, Vec<(usize, usize)>) {
    let mut bits: Vec<EnableBit> = Vec::new();
    let mut by_event = Vec::new();
    for i in logged {
        let d = &table.events[i].descriptor;
        let bit = EnableBit {
            level: d.level,
            keyword: d.keyword,
        };
        let index = match bits.iter().position(|b| *b == bit) {
            Some(index) => index,
            None => {
                bits.push(bit);
                bits.len() - 1
            }
        };
        by_event.push((i, index));
    }
    (bits, by_event)
}

/// Plan one provider. Errors abort the provider; warnings ride along.
pub fn plan_provider<'a>(
    provider: &'a Provider,
    table: &SymbolTable,
) -> Result<(ProviderPlan, TemplateSet<'a>, Vec<Diagnostic>), Diagnostic> {
    let location = Location::provider(&provider.name);
    let traits = ProviderTraits::for_provider(provider)
        .map_err(|e| Diagnostic::from_error(location.clone(), &e))?;

    let grouped = provider_templates(&provider.events).map_err(|(i, e)| {
        Diagnostic::from_error(location.clone().with_event(&table.events[i].symbol), &e)
    })?;

    let logged = grouped
        .event_keys
        .iter()
        .enumerate()
        .filter(|(_, k)| k.is_some())
        .map(|(i, _)| i);
    let (enable_bits, bit_of) = assign_enable_bits(table, logged);

    let mut events: Vec<EventPlan> = table
        .events
        .iter()
        .map(|e| EventPlan {
            symbol: e.symbol.clone(),
            descriptor: e.descriptor,
            write: None,
        })
        .collect();

    for (i, enable_bit) in bit_of {
        let event = &provider.events[i];
        let properties = event.properties();
        let strategies = PropertyStrategy::for_template(properties).map_err(|e| {
            Diagnostic::from_error(location.clone().with_event(&table.events[i].symbol), &e)
        })?;
        let params = strategies.iter().flat_map(|s| s.params()).collect();
        events[i].write = Some(EventWrite {
            enable_bit,
            template_key: grouped.event_keys[i].clone().unwrap_or_default(),
            params,
            names: property_symbols(properties, &strategies),
        });
    }

    let scan = find_activities(provider, table);
    let activities = scan
        .pairs
        .into_iter()
        .map(|p| ActivityPlan {
            symbol: p.symbol,
            start: p.start,
            stop: p.stop,
        })
        .collect::<Vec<_>>();

    log::debug!(
        "{}: {} events, {} templates, {} enable bits, {} activities",
        table.provider,
        events.len(),
        grouped.templates.len(),
        enable_bits.len(),
        activities.len()
    );

    let plan = ProviderPlan {
        name: provider.name.clone(),
        symbol: table.provider.clone(),
        guid: provider.guid,
        control_guid: provider.control_guid,
        traits,
        include_process_name: provider.include_process_name,
        channels: table.channels.clone(),
        levels: table.levels.clone(),
        tasks: table.tasks.clone(),
        opcodes: table.opcodes.clone(),
        keywords: table.keywords.clone(),
        maps: table.maps.clone(),
        strings: table.strings.clone(),
        enable_bits,
        events,
        activities,
    };
    Ok((plan, grouped.templates, scan.diagnostics))
}

/// Plan every provider of the manifest. `tables` is parallel to
/// `manifest.providers`.
pub fn build_plan(manifest: &Manifest, tables: &[SymbolTable]) -> PlanResult {
    let mut diagnostics = Vec::new();
    let mut providers = Vec::with_capacity(manifest.providers.len());
    let mut templates = TemplateSet::new();
    let mut failed = false;

    for (provider, table) in manifest.providers.iter().zip(tables) {
        match plan_provider(provider, table) {
            Ok((plan, set, warnings)) => {
                providers.push(plan);
                templates.merge(set);
                diagnostics.extend(warnings);
            }
            Err(d) => {
                diagnostics.push(d);
                failed = true;
            }
        }
    }
    if failed {
        return PlanResult {
            plan: None,
            diagnostics,
        };
    }

    let mut template_plans = Vec::with_capacity(templates.len());
    for (key, properties) in templates.iter() {
        match TemplatePlan::from_properties(key, properties) {
            Ok(t) => template_plans.push(t),
            Err(e) => {
                diagnostics.push(Diagnostic::from_error(Location::default(), &e));
                return PlanResult {
                    plan: None,
                    diagnostics,
                };
            }
        }
    }

    PlanResult {
        plan: Some(GenerationPlan {
            providers,
            templates: template_plans,
        }),
        diagnostics,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
