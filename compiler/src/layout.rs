// layout.rs — Wire descriptor layout of a template
//
// Turns a template's ordered strategies into the positional descriptor array
// the write call receives. Slot 0 (provider metadata) is not planned here;
// renderers prepend it, and `total_slots` accounts for it.
//
// Preconditions: strategies are in declaration order.
// Postconditions: `slots.len()` equals the sum of per-strategy descriptor
//                 counts; slot order follows property order.
// Failure modes: none.
// Side effects: none.

use serde::Serialize;

use crate::strategy::{PositionalNames, PropertyStrategy, PtrExpr, SizeExpr};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorSlot {
    /// Index of the property this slot belongs to.
    pub property: usize,
    pub ptr: PtrExpr,
    pub size: SizeExpr,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateLayout {
    pub slots: Vec<DescriptorSlot>,
}

impl TemplateLayout {
    /// Array length of the generated descriptor array, metadata slot included.
    pub fn total_slots(&self) -> usize {
        1 + self.slots.len()
    }
}

/// Plan the descriptor slots of one template.
pub fn plan_layout(strategies: &[PropertyStrategy]) -> TemplateLayout {
    let mut slots = Vec::with_capacity(strategies.len() + 2);
    for s in strategies {
        if let Some((ptr, size)) = s.length_prefix() {
            slots.push(DescriptorSlot {
                property: s.index,
                ptr,
                size,
                comment: None,
            });
        }
        slots.push(DescriptorSlot {
            property: s.index,
            ptr: s.data_pointer(),
            size: s.data_size(),
            comment: s.packing_note(&PositionalNames),
        });
    }
    TemplateLayout { slots }
}

/// `1 + Σ descriptor_count`, computed from strategies alone.
pub fn expected_slots(strategies: &[PropertyStrategy]) -> usize {
    1 + strategies.iter().map(|s| s.descriptor_count()).sum::<usize>()
}
