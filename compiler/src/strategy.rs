// strategy.rs — Per-property code-generation strategies
//
// A closed dispatch over property shape. Each strategy decides the native
// parameter types, whether an implicit byte-length parameter precedes the
// data parameter, whether the caller must pre-pack an array into one blob,
// how many wire descriptors the property contributes, and the symbolic
// pointer/size expressions for them.
//
// Expressions are name-agnostic: operands refer to property indices and are
// spelled at emission time through an `ArgNames` implementation, so one
// strategy serves both the template function (`_Arg0`) and the per-event
// wrapper (`ProcessName`).
//
// Preconditions: shapes validated by `mangle::property_shape`.
// Failure modes: those of `property_shape`.
// Side effects: none.

use serde::Serialize;

use crate::error::CodegenError;
use crate::mangle::{property_shape, Bound, PropertyShape, TypeCategory};
use crate::schema::{InType, Property};

// ── Operands and names ──────────────────────────────────────────────────────

/// Spells parameter names for operands.
pub trait ArgNames {
    fn arg(&self, index: usize) -> String;
    fn length(&self, index: usize) -> String;
}

/// `_Arg{i}` / `_Arg{i}_Len`, used by template functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalNames;

impl ArgNames for PositionalNames {
    fn arg(&self, index: usize) -> String {
        format!("_Arg{}", index)
    }

    fn length(&self, index: usize) -> String {
        format!("_Arg{}_Len", index)
    }
}

/// Resolved property identifiers, used by per-event wrappers.
impl ArgNames for Vec<String> {
    fn arg(&self, index: usize) -> String {
        self[index].clone()
    }

    fn length(&self, index: usize) -> String {
        format!("{}_Len", self[index])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operand {
    Literal(u64),
    /// Data parameter of property `i`.
    Arg(usize),
    /// Implicit length parameter of property `i`.
    LengthArg(usize),
}

impl Operand {
    pub fn spell(&self, names: &dyn ArgNames) -> String {
        match self {
            Operand::Literal(n) => n.to_string(),
            Operand::Arg(i) => names.arg(*i),
            Operand::LengthArg(i) => names.length(*i),
        }
    }
}

impl From<Bound> for Operand {
    fn from(b: Bound) -> Self {
        match b {
            Bound::Fixed(n) => Operand::Literal(u64::from(n)),
            Bound::Param(i) => Operand::Arg(i),
        }
    }
}

fn product(factors: &[Operand], names: &dyn ArgNames) -> String {
    factors
        .iter()
        .map(|f| f.spell(names))
        .collect::<Vec<_>>()
        .join(" * ")
}

// ── Expressions ─────────────────────────────────────────────────────────────

/// Pointer half of a wire descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PtrExpr {
    /// `&x`
    AddressOf(Operand),
    /// `x`
    Value(Operand),
    /// `x` or the literal `"NULL"` when `x` is null.
    StringOrNull { arg: usize, wide: bool },
}

/// Size half of a wire descriptor, evaluated in the generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SizeExpr {
    /// `f1 * f2 * ... * sizeof(ty)`
    Scaled {
        ty: &'static str,
        factors: Vec<Operand>,
    },
    /// A byte count supplied directly.
    Bytes(Operand),
    /// Terminated string size including the terminator, or `sizeof("NULL")`.
    TerminatedString { arg: usize, wide: bool },
    /// `GetLengthSid(x)`
    Sid { arg: usize },
}

// ── Access annotations ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Extent {
    /// One value (or one pointed-to record).
    Single,
    /// Product of the operands, in elements.
    Elements(Vec<Operand>),
    /// Product of the operands, in bytes.
    Bytes(Vec<Operand>),
}

/// Memory-access contract of a parameter. All parameters are read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub optional: bool,
    pub zero_terminated: bool,
    pub extent: Extent,
}

impl Annotation {
    fn single() -> Self {
        Annotation {
            optional: false,
            zero_terminated: false,
            extent: Extent::Single,
        }
    }

    fn elements(factors: Vec<Operand>) -> Self {
        Annotation {
            optional: false,
            zero_terminated: false,
            extent: Extent::Elements(factors),
        }
    }

    fn bytes(factors: Vec<Operand>) -> Self {
        Annotation {
            optional: false,
            zero_terminated: false,
            extent: Extent::Bytes(factors),
        }
    }

    /// SAL spelling, e.g. `_In_reads_bytes_(_Arg1_Len)`.
    pub fn sal(&self, names: &dyn ArgNames) -> String {
        match &self.extent {
            Extent::Single => match (self.optional, self.zero_terminated) {
                (true, true) => "_In_opt_z_".to_string(),
                (true, false) => "_In_opt_".to_string(),
                (false, true) => "_In_z_".to_string(),
                (false, false) => "_In_".to_string(),
            },
            Extent::Elements(f) => format!("_In_reads_({})", product(f, names)),
            Extent::Bytes(f) => format!("_In_reads_bytes_({})", product(f, names)),
        }
    }

    /// Prose form for comments.
    pub fn describe(&self, names: &dyn ArgNames) -> String {
        let presence = if self.optional { "optional" } else { "required" };
        let extent = match &self.extent {
            Extent::Single if self.zero_terminated => "NUL-terminated".to_string(),
            Extent::Single => "one value".to_string(),
            Extent::Elements(f) => format!("{} elements", product(f, names)),
            Extent::Bytes(f) => format!("{} bytes", product(f, names)),
        };
        format!("read-only, {}, {}", presence, extent)
    }
}

// ── Parameters ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamRole {
    /// Implicit byte length preceding the data parameter.
    Length,
    Data,
}

/// One native parameter contributed by a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub property: usize,
    pub role: ParamRole,
    /// Type in the shared template function.
    pub template_type: String,
    /// Type in the per-event wrapper (the property's exact type).
    pub event_type: String,
    pub annotation: Annotation,
}

impl ParamSpec {
    pub fn name(&self, names: &dyn ArgNames) -> String {
        match self.role {
            ParamRole::Length => names.length(self.property),
            ParamRole::Data => names.arg(self.property),
        }
    }

    /// The wrapper must convert when the exact type differs from the template's.
    pub fn needs_cast(&self) -> bool {
        self.template_type != self.event_type
    }

    pub fn is_pointer(&self) -> bool {
        self.template_type.ends_with('*')
    }
}

// ── Strategy selection ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StrategyKind {
    /// Integers, floats, booleans.
    Primitive,
    /// GUID, FILETIME, SYSTEMTIME.
    FixedRecord,
    Pointer,
    /// Opaque packed blob.
    Struct,
    Sid,
    /// Unicode/ANSI string, terminated unless a length is declared.
    String { wide: bool },
    CountedString { wide: bool },
    Binary,
    CountedBinary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyStrategy {
    pub index: usize,
    pub kind: StrategyKind,
    pub shape: PropertyShape,
}

fn kind_for(category: TypeCategory) -> StrategyKind {
    match category {
        TypeCategory::Struct => StrategyKind::Struct,
        TypeCategory::Data(t) => match t {
            InType::Int8
            | InType::UInt8
            | InType::Int16
            | InType::UInt16
            | InType::Int32
            | InType::UInt32
            | InType::Int64
            | InType::UInt64
            | InType::Float
            | InType::Double
            | InType::Boolean
            | InType::HexInt32
            | InType::HexInt64 => StrategyKind::Primitive,
            InType::Guid | InType::FileTime | InType::SystemTime => StrategyKind::FixedRecord,
            InType::Pointer => StrategyKind::Pointer,
            InType::Sid => StrategyKind::Sid,
            InType::UnicodeString => StrategyKind::String { wide: true },
            InType::AnsiString => StrategyKind::String { wide: false },
            InType::CountedUnicodeString => StrategyKind::CountedString { wide: true },
            InType::CountedAnsiString => StrategyKind::CountedString { wide: false },
            InType::Binary => StrategyKind::Binary,
            InType::CountedBinary => StrategyKind::CountedBinary,
        },
    }
}

/// Template-side element type of a primitive (one type per wire width).
fn primitive_template_type(t: InType) -> &'static str {
    match t {
        InType::Int8 | InType::UInt8 => "UINT8",
        InType::Int16 | InType::UInt16 => "UINT16",
        InType::Int32 | InType::UInt32 | InType::HexInt32 => "UINT32",
        InType::Int64 | InType::UInt64 | InType::HexInt64 => "UINT64",
        InType::Float => "FLOAT",
        InType::Double => "DOUBLE",
        _ => "BOOL",
    }
}

fn primitive_event_type(t: InType) -> &'static str {
    match t {
        InType::Int8 => "INT8",
        InType::Int16 => "INT16",
        InType::Int32 => "INT32",
        InType::Int64 => "INT64",
        other => primitive_template_type(other),
    }
}

/// A fixed count of fixed-length values is one value of the combined length.
/// Both spellings share a mangled key, so they must share a strategy too.
fn fold_fixed_extent(shape: PropertyShape) -> PropertyShape {
    match (shape.count, shape.length) {
        (Some(Bound::Fixed(c)), Some(Bound::Fixed(l))) => match c.checked_mul(l) {
            Some(n) => PropertyShape {
                count: None,
                length: Some(Bound::Fixed(n)),
                ..shape
            },
            None => shape,
        },
        _ => shape,
    }
}

impl PropertyStrategy {
    /// Select the strategy for `properties[index]`.
    pub fn select(properties: &[Property], index: usize) -> Result<Self, CodegenError> {
        let shape = fold_fixed_extent(property_shape(properties, index)?);
        Ok(PropertyStrategy {
            index,
            kind: kind_for(shape.category),
            shape,
        })
    }

    /// Strategies for a whole template, in declaration order.
    pub fn for_template(properties: &[Property]) -> Result<Vec<Self>, CodegenError> {
        (0..properties.len())
            .map(|i| Self::select(properties, i))
            .collect()
    }

    fn in_type(&self) -> Option<InType> {
        match self.shape.category {
            TypeCategory::Data(t) => Some(t),
            TypeCategory::Struct => None,
        }
    }

    fn count(&self) -> Option<Operand> {
        self.shape.count.map(Operand::from)
    }

    fn length(&self) -> Option<Operand> {
        self.shape.length.map(Operand::from)
    }

    fn count_and_length(&self) -> Vec<Operand> {
        self.count().into_iter().chain(self.length()).collect()
    }

    pub fn is_array(&self) -> bool {
        self.shape.count.is_some()
    }

    /// Arrays of complex values have no per-element framing on the wire, so
    /// the caller supplies them as one contiguous blob.
    pub fn is_packed(&self) -> bool {
        self.is_array()
            && matches!(
                self.kind,
                StrategyKind::Struct
                    | StrategyKind::Sid
                    | StrategyKind::String { .. }
                    | StrategyKind::CountedString { .. }
                    | StrategyKind::CountedBinary
            )
    }

    pub fn needs_length_param(&self) -> bool {
        match self.kind {
            StrategyKind::Struct
            | StrategyKind::CountedString { .. }
            | StrategyKind::CountedBinary => true,
            StrategyKind::Sid => self.is_packed(),
            StrategyKind::String { .. } => self.is_packed() && self.shape.length.is_none(),
            StrategyKind::Primitive
            | StrategyKind::FixedRecord
            | StrategyKind::Pointer
            | StrategyKind::Binary => false,
        }
    }

    fn is_counted(&self) -> bool {
        matches!(
            self.kind,
            StrategyKind::CountedString { .. } | StrategyKind::CountedBinary
        )
    }

    /// An unpacked counted value carries a 16-bit length prefix on the wire,
    /// which takes its own descriptor.
    pub fn has_length_prefix(&self) -> bool {
        self.is_counted() && !self.is_packed()
    }

    /// Wire descriptors contributed: fixed by shape, never by runtime data.
    pub fn descriptor_count(&self) -> usize {
        if self.has_length_prefix() {
            2
        } else {
            1
        }
    }

    fn length_param_type(&self) -> &'static str {
        if self.has_length_prefix() {
            "USHORT"
        } else {
            "ULONG"
        }
    }

    fn char_type(wide: bool) -> &'static str {
        if wide {
            "WCHAR"
        } else {
            "CHAR"
        }
    }

    fn string_type(wide: bool) -> &'static str {
        if wide {
            "PCWSTR"
        } else {
            "PCSTR"
        }
    }

    /// (template type, event type) of the data parameter.
    fn data_types(&self) -> (String, String) {
        let same = |t: &str| (t.to_string(), t.to_string());
        match self.kind {
            StrategyKind::Primitive => {
                let t = self.in_type().unwrap_or(InType::Boolean);
                let (tt, et) = (primitive_template_type(t), primitive_event_type(t));
                if self.is_array() {
                    (format!("const {}*", tt), format!("const {}*", et))
                } else {
                    (tt.to_string(), et.to_string())
                }
            }
            StrategyKind::FixedRecord => same(&format!("const {}*", self.element_type())),
            StrategyKind::Pointer if self.is_array() => same("const void* const*"),
            StrategyKind::Pointer => same("const void*"),
            StrategyKind::Sid if !self.is_packed() => same("const SID*"),
            StrategyKind::String { wide } if !self.needs_length_param() => {
                same(Self::string_type(wide))
            }
            StrategyKind::CountedString { wide } if !self.is_packed() => {
                same(Self::string_type(wide))
            }
            _ => same("const void*"),
        }
    }

    /// Element type whose `sizeof` scales the data descriptor.
    pub fn element_type(&self) -> &'static str {
        match self.kind {
            StrategyKind::Primitive => {
                primitive_template_type(self.in_type().unwrap_or(InType::Boolean))
            }
            StrategyKind::FixedRecord => match self.in_type() {
                Some(InType::FileTime) => "FILETIME",
                Some(InType::SystemTime) => "SYSTEMTIME",
                _ => "GUID",
            },
            StrategyKind::Pointer => "void*",
            StrategyKind::String { wide } | StrategyKind::CountedString { wide } => {
                Self::char_type(wide)
            }
            StrategyKind::Struct
            | StrategyKind::Sid
            | StrategyKind::Binary
            | StrategyKind::CountedBinary => "BYTE",
        }
    }

    fn data_annotation(&self) -> Annotation {
        let i = self.index;
        match self.kind {
            StrategyKind::Primitive | StrategyKind::FixedRecord => match self.count() {
                Some(c) => Annotation::elements(vec![c]),
                None => Annotation::single(),
            },
            StrategyKind::Pointer => match self.count() {
                Some(c) => Annotation::elements(vec![c]),
                None => Annotation {
                    optional: true,
                    ..Annotation::single()
                },
            },
            StrategyKind::Sid if !self.is_packed() => Annotation::single(),
            StrategyKind::String { .. } if !self.needs_length_param() => {
                if self.shape.length.is_some() {
                    Annotation::elements(self.count_and_length())
                } else {
                    Annotation {
                        optional: true,
                        zero_terminated: true,
                        extent: Extent::Single,
                    }
                }
            }
            StrategyKind::Binary => Annotation::bytes(self.count_and_length()),
            _ => Annotation::bytes(vec![Operand::LengthArg(i)]),
        }
    }

    /// Native parameters in call order: optional length, then data.
    pub fn params(&self) -> Vec<ParamSpec> {
        let mut out = Vec::with_capacity(2);
        if self.needs_length_param() {
            let ty = self.length_param_type().to_string();
            out.push(ParamSpec {
                property: self.index,
                role: ParamRole::Length,
                template_type: ty.clone(),
                event_type: ty,
                annotation: Annotation::single(),
            });
        }
        let (template_type, event_type) = self.data_types();
        out.push(ParamSpec {
            property: self.index,
            role: ParamRole::Data,
            template_type,
            event_type,
            annotation: self.data_annotation(),
        });
        out
    }

    pub fn data_pointer(&self) -> PtrExpr {
        let arg = Operand::Arg(self.index);
        match self.kind {
            StrategyKind::Primitive | StrategyKind::Pointer if !self.is_array() => {
                PtrExpr::AddressOf(arg)
            }
            StrategyKind::String { wide } if !self.is_array() && self.shape.length.is_none() => {
                PtrExpr::StringOrNull {
                    arg: self.index,
                    wide,
                }
            }
            _ => PtrExpr::Value(arg),
        }
    }

    pub fn data_size(&self) -> SizeExpr {
        let i = self.index;
        let scaled = |factors: Vec<Operand>| SizeExpr::Scaled {
            ty: self.element_type(),
            factors,
        };
        match self.kind {
            StrategyKind::Primitive | StrategyKind::FixedRecord | StrategyKind::Pointer => {
                scaled(self.count().into_iter().collect())
            }
            StrategyKind::Sid if !self.is_packed() => SizeExpr::Sid { arg: i },
            StrategyKind::String { wide } if !self.needs_length_param() => {
                if self.shape.length.is_some() {
                    scaled(self.count_and_length())
                } else {
                    SizeExpr::TerminatedString { arg: i, wide }
                }
            }
            StrategyKind::Binary => scaled(self.count_and_length()),
            _ => SizeExpr::Bytes(Operand::LengthArg(i)),
        }
    }

    /// Descriptor for the 16-bit wire length prefix of an unpacked counted value.
    pub fn length_prefix(&self) -> Option<(PtrExpr, SizeExpr)> {
        self.has_length_prefix().then(|| {
            (
                PtrExpr::AddressOf(Operand::LengthArg(self.index)),
                SizeExpr::Scaled {
                    ty: "USHORT",
                    factors: Vec::new(),
                },
            )
        })
    }

    /// Layout contract the caller must honour for a packed array.
    pub fn packing_note(&self, names: &dyn ArgNames) -> Option<String> {
        if !self.is_packed() {
            return None;
        }
        let count = self
            .count()
            .map(|c| c.spell(names))
            .unwrap_or_else(|| "1".to_string());
        let note = match self.kind {
            StrategyKind::CountedString { .. } | StrategyKind::CountedBinary => format!(
                "packed: blob contains {} concatenated chunks, each chunk = 16-bit length prefix + data",
                count
            ),
            StrategyKind::String { .. } => match self.length() {
                Some(l) => format!(
                    "packed: each of {} strings has the same length {}",
                    count,
                    l.spell(names)
                ),
                None => format!("packed: blob contains {} concatenated NUL-terminated strings", count),
            },
            StrategyKind::Sid => format!("packed: blob contains {} SIDs back to back", count),
            _ => format!("packed: blob contains {} structs back to back", count),
        };
        Some(note)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Cardinality;

    fn strategy(props: &[Property], i: usize) -> PropertyStrategy {
        PropertyStrategy::select(props, i).unwrap()
    }

    #[test]
    fn counted_string_array_is_packed_single_descriptor() {
        let props = vec![
            Property::data("N", InType::UInt16),
            Property::data("Names", InType::CountedUnicodeString)
                .with_count(Cardinality::Ref("N".into())),
        ];
        let s = strategy(&props, 1);
        assert!(s.is_packed());
        assert!(s.needs_length_param());
        assert_eq!(s.descriptor_count(), 1);
        let note = s.packing_note(&PositionalNames).unwrap();
        assert!(note.contains("_Arg0 concatenated chunks"), "{}", note);
        assert_eq!(s.params()[0].template_type, "ULONG");
    }

    #[test]
    fn counted_string_scalar_has_prefix_and_two_descriptors() {
        let props = vec![Property::data("Name", InType::CountedUnicodeString)];
        let s = strategy(&props, 0);
        assert!(!s.is_packed());
        assert_eq!(s.descriptor_count(), 2);
        assert!(s.packing_note(&PositionalNames).is_none());
        let params = s.params();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].role, ParamRole::Length);
        assert_eq!(params[0].template_type, "USHORT");
        assert_eq!(params[1].template_type, "PCWSTR");
        assert!(s.length_prefix().is_some());
    }

    #[test]
    fn primitive_scalar_and_array() {
        let props = vec![
            Property::data("A", InType::Int32),
            Property::data("B", InType::Int32).with_count(Cardinality::Fixed(4)),
        ];
        let a = strategy(&props, 0);
        assert_eq!(a.descriptor_count(), 1);
        assert_eq!(a.data_pointer(), PtrExpr::AddressOf(Operand::Arg(0)));
        let p = &a.params()[0];
        assert_eq!(p.template_type, "UINT32");
        assert_eq!(p.event_type, "INT32");
        assert!(p.needs_cast());
        assert!(!p.is_pointer());

        let b = strategy(&props, 1);
        assert!(!b.is_packed());
        assert_eq!(b.data_pointer(), PtrExpr::Value(Operand::Arg(1)));
        assert_eq!(
            b.data_size(),
            SizeExpr::Scaled {
                ty: "UINT32",
                factors: vec![Operand::Literal(4)]
            }
        );
        assert_eq!(b.params()[0].annotation.sal(&PositionalNames), "_In_reads_(4)");
    }

    #[test]
    fn terminated_string_uses_null_fallback() {
        let props = vec![Property::data("S", InType::AnsiString)];
        let s = strategy(&props, 0);
        assert_eq!(
            s.data_pointer(),
            PtrExpr::StringOrNull {
                arg: 0,
                wide: false
            }
        );
        assert_eq!(
            s.data_size(),
            SizeExpr::TerminatedString {
                arg: 0,
                wide: false
            }
        );
        assert_eq!(s.params()[0].annotation.sal(&PositionalNames), "_In_opt_z_");
    }

    #[test]
    fn terminated_string_array_needs_byte_length() {
        let props = vec![Property::data("S", InType::UnicodeString).with_count(Cardinality::Fixed(3))];
        let s = strategy(&props, 0);
        assert!(s.is_packed());
        assert!(s.needs_length_param());
        assert_eq!(s.data_size(), SizeExpr::Bytes(Operand::LengthArg(0)));
        assert_eq!(
            s.packing_note(&PositionalNames).unwrap(),
            "packed: blob contains 3 concatenated NUL-terminated strings"
        );
    }

    #[test]
    fn fixed_count_of_fixed_length_folds_to_one_value() {
        let array = vec![Property::data("S", InType::UnicodeString)
            .with_count(Cardinality::Fixed(4))
            .with_length(Cardinality::Fixed(8))];
        let single = vec![Property::data("S", InType::UnicodeString)
            .with_length(Cardinality::Fixed(32))];
        let a = strategy(&array, 0);
        let b = strategy(&single, 0);
        assert!(!a.is_packed());
        assert!(a.packing_note(&PositionalNames).is_none());
        assert_eq!(a, b);
        assert_eq!(a.params(), b.params());
        assert_eq!(a.params()[0].annotation.sal(&PositionalNames), "_In_reads_(32)");
    }

    #[test]
    fn struct_takes_length_but_one_descriptor() {
        let props = vec![Property::structure("Blob")];
        let s = strategy(&props, 0);
        assert!(s.needs_length_param());
        assert!(!s.is_packed());
        assert_eq!(s.descriptor_count(), 1);
        assert_eq!(s.data_size(), SizeExpr::Bytes(Operand::LengthArg(0)));
    }

    #[test]
    fn sid_packs_only_as_array() {
        let props = vec![
            Property::data("Owner", InType::Sid),
            Property::data("Group", InType::Sid).with_count(Cardinality::Fixed(2)),
        ];
        let one = strategy(&props, 0);
        assert!(!one.needs_length_param());
        assert_eq!(one.data_size(), SizeExpr::Sid { arg: 0 });
        assert_eq!(one.params()[0].template_type, "const SID*");

        let many = strategy(&props, 1);
        assert!(many.is_packed());
        assert!(many.needs_length_param());
    }

    #[test]
    fn binary_size_from_count_and_length() {
        let props = vec![
            Property::data("Len", InType::UInt32),
            Property::data("Data", InType::Binary).with_length(Cardinality::Ref("Len".into())),
        ];
        let s = strategy(&props, 1);
        assert!(!s.needs_length_param());
        assert_eq!(s.descriptor_count(), 1);
        assert_eq!(
            s.params()[0].annotation.sal(&PositionalNames),
            "_In_reads_bytes_(_Arg0)"
        );
    }

    #[test]
    fn annotation_describe() {
        let names: Vec<String> = vec!["Count".into(), "Values".into()];
        let props = vec![
            Property::data("Count", InType::UInt16),
            Property::data("Values", InType::Double).with_count(Cardinality::Ref("Count".into())),
        ];
        let s = strategy(&props, 1);
        assert_eq!(
            s.params()[0].annotation.describe(&names),
            "read-only, required, Count elements"
        );
    }

    #[test]
    fn pointer_scalar_is_optional() {
        let props = vec![Property::data("P", InType::Pointer)];
        let s = strategy(&props, 0);
        assert_eq!(s.params()[0].annotation.sal(&PositionalNames), "_In_opt_");
        assert_eq!(
            s.data_size(),
            SizeExpr::Scaled {
                ty: "void*",
                factors: vec![]
            }
        );
    }
}
