// schema.rs — Validated instrumentation schema graph (read-only input)
//
// Provider → {Channel, Level, Task, Opcode, Keyword, Map, String, Event},
// Event → Template → [Property]. Produced upstream by the manifest front end
// and handed to the back end as JSON. The back end never mutates it.
//
// Preconditions: the graph was validated upstream; references are by name.
// Failure modes: unknown `in_type` spellings and malformed GUIDs are rejected
//                at deserialization.
// Side effects: none.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LoadError;

// ── Manifest root ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub providers: Vec<Provider>,
}

impl Manifest {
    /// Deserialize a schema graph from JSON text.
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Canonical compact JSON (field order fixed by the type definitions).
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ── Provider and its named values ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub guid: Guid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_guid: Option<Guid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default)]
    pub include_name_in_traits: bool,
    #[serde(default)]
    pub include_process_name: bool,
    #[serde(default)]
    pub channels: Vec<NamedValue<u8>>,
    #[serde(default)]
    pub levels: Vec<NamedValue<u8>>,
    #[serde(default)]
    pub tasks: Vec<NamedValue<u16>>,
    #[serde(default)]
    pub opcodes: Vec<NamedValue<u8>>,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
    #[serde(default)]
    pub maps: Vec<Map>,
    #[serde(default)]
    pub strings: Vec<LocalizedString>,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// A channel, level, task or opcode: a named numeric value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue<T> {
    pub name: String,
    pub value: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub name: String,
    pub mask: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapKind {
    Value,
    Bitmap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map {
    pub name: String,
    pub kind: MapKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default)]
    pub items: Vec<MapItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapItem {
    pub value: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedString {
    pub id: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<u32>,
}

// ── Events ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub value: u16,
    #[serde(default)]
    pub version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opcode: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub not_logged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,
}

impl Event {
    /// Payload properties in declaration order (empty when there is no template).
    pub fn properties(&self) -> &[Property] {
        self.template
            .as_ref()
            .map(|t| t.properties.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub properties: Vec<Property>,
}

// ── Properties ──────────────────────────────────────────────────────────────

/// Count or length of a property: a constant, or the name of an earlier
/// property in the same template that carries the value at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cardinality {
    Fixed(u32),
    Ref(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Property {
    Data(DataProperty),
    Struct(StructProperty),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataProperty {
    pub name: String,
    pub in_type: InType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<Cardinality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<Cardinality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
}

/// Opaque packed blob. Member properties describe it for decoders only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructProperty {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<Cardinality>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Property {
    pub fn data(name: impl Into<String>, in_type: InType) -> Self {
        Property::Data(DataProperty {
            name: name.into(),
            in_type,
            count: None,
            length: None,
            map: None,
        })
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Property::Struct(StructProperty {
            name: name.into(),
            count: None,
            properties: Vec::new(),
        })
    }

    pub fn with_count(mut self, count: Cardinality) -> Self {
        match &mut self {
            Property::Data(d) => d.count = Some(count),
            Property::Struct(s) => s.count = Some(count),
        }
        self
    }

    /// Structs have no length; setting one on a struct is a no-op.
    pub fn with_length(mut self, length: Cardinality) -> Self {
        if let Property::Data(d) = &mut self {
            d.length = Some(length);
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Property::Data(d) => &d.name,
            Property::Struct(s) => &s.name,
        }
    }

    pub fn count(&self) -> Option<&Cardinality> {
        match self {
            Property::Data(d) => d.count.as_ref(),
            Property::Struct(s) => s.count.as_ref(),
        }
    }

    pub fn length(&self) -> Option<&Cardinality> {
        match self {
            Property::Data(d) => d.length.as_ref(),
            Property::Struct(_) => None,
        }
    }
}

// ── In-types ────────────────────────────────────────────────────────────────

/// Closed vocabulary of data property input types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InType {
    #[serde(alias = "win:Int8")]
    Int8,
    #[serde(alias = "win:UInt8")]
    UInt8,
    #[serde(alias = "win:Int16")]
    Int16,
    #[serde(alias = "win:UInt16")]
    UInt16,
    #[serde(alias = "win:Int32")]
    Int32,
    #[serde(alias = "win:UInt32")]
    UInt32,
    #[serde(alias = "win:Int64")]
    Int64,
    #[serde(alias = "win:UInt64")]
    UInt64,
    #[serde(alias = "win:Float")]
    Float,
    #[serde(alias = "win:Double")]
    Double,
    #[serde(alias = "win:Boolean")]
    Boolean,
    #[serde(alias = "win:HexInt32")]
    HexInt32,
    #[serde(alias = "win:HexInt64")]
    HexInt64,
    #[serde(alias = "win:UnicodeString")]
    UnicodeString,
    #[serde(alias = "win:AnsiString")]
    AnsiString,
    #[serde(alias = "win:CountedUnicodeString")]
    CountedUnicodeString,
    #[serde(alias = "win:CountedAnsiString")]
    CountedAnsiString,
    #[serde(alias = "win:Binary")]
    Binary,
    #[serde(alias = "win:CountedBinary")]
    CountedBinary,
    #[serde(rename = "GUID", alias = "win:GUID")]
    Guid,
    #[serde(rename = "FILETIME", alias = "win:FILETIME")]
    FileTime,
    #[serde(rename = "SYSTEMTIME", alias = "win:SYSTEMTIME")]
    SystemTime,
    #[serde(rename = "SID", alias = "win:SID")]
    Sid,
    #[serde(alias = "win:Pointer")]
    Pointer,
}

impl InType {
    pub const ALL: [InType; 24] = [
        InType::Int8,
        InType::UInt8,
        InType::Int16,
        InType::UInt16,
        InType::Int32,
        InType::UInt32,
        InType::Int64,
        InType::UInt64,
        InType::Float,
        InType::Double,
        InType::Boolean,
        InType::HexInt32,
        InType::HexInt64,
        InType::UnicodeString,
        InType::AnsiString,
        InType::CountedUnicodeString,
        InType::CountedAnsiString,
        InType::Binary,
        InType::CountedBinary,
        InType::Guid,
        InType::FileTime,
        InType::SystemTime,
        InType::Sid,
        InType::Pointer,
    ];

    /// Types whose values may carry a `length`.
    pub fn accepts_length(self) -> bool {
        matches!(
            self,
            InType::UnicodeString | InType::AnsiString | InType::Binary
        )
    }
}

// ── GUID ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidParseError(String);

impl fmt::Display for GuidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed GUID '{}'", self.0)
    }
}

impl std::error::Error for GuidParseError {}

impl Guid {
    /// In-memory byte order (little-endian fields, then `data4`).
    pub fn to_bytes_le(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&self.data1.to_le_bytes());
        out[4..6].copy_from_slice(&self.data2.to_le_bytes());
        out[6..8].copy_from_slice(&self.data3.to_le_bytes());
        out[8..16].copy_from_slice(&self.data4);
        out
    }
}

impl FromStr for Guid {
    type Err = GuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || GuidParseError(s.to_string());
        let inner = s
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .unwrap_or(s);
        let groups: Vec<&str> = inner.split('-').collect();
        let lens = [8, 4, 4, 4, 12];
        if groups.len() != lens.len()
            || groups
                .iter()
                .zip(lens)
                .any(|(g, n)| g.len() != n || !g.bytes().all(|b| b.is_ascii_hexdigit()))
        {
            return Err(err());
        }
        let data1 = u32::from_str_radix(groups[0], 16).map_err(|_| err())?;
        let data2 = u16::from_str_radix(groups[1], 16).map_err(|_| err())?;
        let data3 = u16::from_str_radix(groups[2], 16).map_err(|_| err())?;
        let tail = format!("{}{}", groups[3], groups[4]);
        let mut data4 = [0u8; 8];
        for (i, byte) in data4.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&tail[i * 2..i * 2 + 2], 16).map_err(|_| err())?;
        }
        Ok(Guid {
            data1,
            data2,
            data3,
            data4,
        })
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-",
            self.data1, self.data2, self.data3, self.data4[0], self.data4[1]
        )?;
        for b in &self.data4[2..] {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
