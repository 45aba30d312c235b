// mangle.rs — Type-shape mangling for template deduplication
//
// Maps each property's type category and count/length cardinality onto a
// short signature fragment. A template's suffix is the concatenation of its
// properties' fragments in declaration order; structurally identical
// templates therefore share a suffix, and the suffix doubles as the stem of
// generated function and guard names.
//
// Preconditions: count/length references name properties declared earlier
//                in the same template.
// Postconditions: output is a pure function of the ordered property shapes.
// Failure modes: invalid cardinality, dangling or forward references.
// Side effects: none.

use serde::Serialize;

use crate::error::CodegenError;
use crate::schema::{Cardinality, InType, Property};

// ── Resolved shape ──────────────────────────────────────────────────────────

/// A count or length after reference resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Bound {
    /// Compile-time constant.
    Fixed(u32),
    /// Carried at runtime by the property at this index of the template.
    Param(usize),
}

/// Type category of a property, independent of its cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeCategory {
    Data(InType),
    Struct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PropertyShape {
    pub category: TypeCategory,
    pub count: Option<Bound>,
    pub length: Option<Bound>,
}

fn resolve_bound(
    properties: &[Property],
    index: usize,
    what: &str,
    cardinality: &Cardinality,
) -> Result<Bound, CodegenError> {
    let property = properties[index].name();
    match cardinality {
        Cardinality::Fixed(0) => Err(CodegenError::InvalidCardinality {
            property: property.to_string(),
            detail: format!("fixed {} must be at least 1", what),
        }),
        Cardinality::Fixed(n) => Ok(Bound::Fixed(*n)),
        Cardinality::Ref(target) => {
            let pos = properties
                .iter()
                .position(|p| p.name() == target)
                .ok_or_else(|| CodegenError::DanglingReference {
                    property: property.to_string(),
                    target: target.clone(),
                })?;
            if pos >= index {
                return Err(CodegenError::ForwardReference {
                    property: property.to_string(),
                    target: target.clone(),
                });
            }
            Ok(Bound::Param(pos))
        }
    }
}

/// Resolve and validate the shape of `properties[index]`.
pub fn property_shape(properties: &[Property], index: usize) -> Result<PropertyShape, CodegenError> {
    let property = &properties[index];
    let category = match property {
        Property::Data(d) => TypeCategory::Data(d.in_type),
        Property::Struct(_) => TypeCategory::Struct,
    };
    let count = property
        .count()
        .map(|c| resolve_bound(properties, index, "count", c))
        .transpose()?;
    let length = property
        .length()
        .map(|l| resolve_bound(properties, index, "length", l))
        .transpose()?;

    if let TypeCategory::Data(in_type) = category {
        if length.is_some() && !in_type.accepts_length() {
            return Err(CodegenError::InvalidCardinality {
                property: property.name().to_string(),
                detail: format!("{:?} does not take a length", in_type),
            });
        }
        if in_type == InType::Binary && length.is_none() {
            return Err(CodegenError::InvalidCardinality {
                property: property.name().to_string(),
                detail: "Binary requires a length".to_string(),
            });
        }
    }

    Ok(PropertyShape {
        category,
        count,
        length,
    })
}

// ── Letters ─────────────────────────────────────────────────────────────────

/// Base letter per type category. Types sharing a wire shape share a letter.
pub fn type_letter(category: TypeCategory) -> char {
    match category {
        TypeCategory::Struct => 'v',
        TypeCategory::Data(t) => match t {
            InType::Int8 | InType::UInt8 => 'c',
            InType::Int16 | InType::UInt16 => 'h',
            InType::Int32 | InType::UInt32 | InType::HexInt32 => 'd',
            InType::Int64 | InType::UInt64 | InType::HexInt64 => 'x',
            InType::Float => 'f',
            InType::Double => 'g',
            InType::Boolean => 't',
            InType::UnicodeString => 'z',
            InType::AnsiString => 's',
            InType::CountedUnicodeString => 'w',
            InType::CountedAnsiString => 'a',
            InType::Binary => 'b',
            InType::CountedBinary => 'e',
            InType::Guid => 'j',
            InType::FileTime => 'm',
            InType::SystemTime => 'y',
            InType::Sid => 'k',
            InType::Pointer => 'p',
        },
    }
}

// ── Mangling ────────────────────────────────────────────────────────────────

/// Mangle an already-resolved shape.
pub fn mangle_shape(shape: &PropertyShape) -> String {
    let lower = type_letter(shape.category);
    let upper = lower.to_ascii_uppercase();
    match (shape.count, shape.length) {
        (None, None) => lower.to_string(),
        (None, Some(Bound::Fixed(l))) => format!("{}{}", lower, l),
        (None, Some(Bound::Param(l))) => format!("{}r{}", lower, l),
        // Same bytes and parameters as one value of length c*l.
        (Some(Bound::Fixed(c)), Some(Bound::Fixed(l))) => {
            format!("{}{}", lower, u64::from(c) * u64::from(l))
        }
        (Some(Bound::Fixed(c)), None) => format!("{}{}", upper, c),
        (Some(Bound::Param(c)), None) => format!("{}R{}", upper, c),
        (Some(Bound::Fixed(c)), Some(Bound::Param(l))) => format!("{}{}r{}", upper, c, l),
        (Some(Bound::Param(c)), Some(Bound::Fixed(l))) => format!("{}{}R{}", upper, l, c),
        (Some(Bound::Param(c)), Some(Bound::Param(l))) => format!("{}r{}R{}", upper, l, c),
    }
}

/// Mangle `properties[index]`.
pub fn mangle_at(properties: &[Property], index: usize) -> Result<String, CodegenError> {
    Ok(mangle_shape(&property_shape(properties, index)?))
}

/// Mangle a property in the context of its template's property list.
///
/// A property that is not an element of `properties` is mangled as if it were
/// appended to the end of the list.
pub fn mangle(property: &Property, properties: &[Property]) -> Result<String, CodegenError> {
    match properties.iter().position(|p| std::ptr::eq(p, property)) {
        Some(index) => mangle_at(properties, index),
        None => {
            let mut extended = properties.to_vec();
            extended.push(property.clone());
            mangle_at(&extended, properties.len())
        }
    }
}

/// Suffix of a whole template: the ordered concatenation of its properties.
pub fn mangle_template(properties: &[Property]) -> Result<String, CodegenError> {
    let mut suffix = String::new();
    for i in 0..properties.len() {
        suffix.push_str(&mangle_at(properties, i)?);
    }
    Ok(suffix)
}

// ── Tests ───────────────────────────────────────────────────────────────────
