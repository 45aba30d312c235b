// render — Dialect renderers over a `GenerationPlan`
//
// Two thin text emitters share everything below: expression spelling,
// parameter declarations, initializers and enable tests. Only surface
// syntax differs between them (inline functions vs macros, casts, null).
//
// Preconditions: the plan was built without error diagnostics.
// Postconditions: output is a pure function of (plan, options).
// Failure modes: none.
// Side effects: none.

pub mod cxx;
pub mod mc;

use std::fmt::Write as _;

use crate::ident::EventDescriptor;
use crate::plan::{ActivityPlan, GenerationPlan, ProviderPlan};
use crate::schema::Guid;
use crate::strategy::{ArgNames, Operand, ParamSpec, PtrExpr, SizeExpr};

// ── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Inline C++ functions.
    Cxx,
    /// MC-compatible macros over C functions.
    Mc,
}

/// Affects namespace and constant syntax only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageStandard {
    Cxx11,
    Cxx17,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub dialect: Dialect,
    /// `::`-separated namespace for generated declarations (C++ only).
    pub namespace: Option<String>,
    /// Namespace of the shared runtime and template functions (C++ only).
    pub runtime_namespace: String,
    pub standard: LanguageStandard,
    /// Prefix of per-event write wrappers.
    pub log_prefix: String,
    /// Emit channel/level/opcode/task/keyword/map/string constants.
    pub non_essentials: bool,
    /// Emit a linker-section entry for each provider context.
    pub static_provider: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            dialect: Dialect::Cxx,
            namespace: None,
            runtime_namespace: "etw".to_string(),
            standard: LanguageStandard::Cxx17,
            log_prefix: "EventWrite".to_string(),
            non_essentials: true,
            static_provider: false,
        }
    }
}

/// Render the plan in the dialect selected by `options`.
pub fn render(plan: &GenerationPlan, options: &RenderOptions) -> String {
    match options.dialect {
        Dialect::Cxx => cxx::render(plan, options),
        Dialect::Mc => mc::render(plan, options),
    }
}

pub(crate) const BANNER: &str = "// Generated by emc (Event Manifest Compiler). Do not edit.\n";

// ── Expression syntax ───────────────────────────────────────────────────────

/// Surface syntax of generated expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Syntax {
    pub null: &'static str,
    pub c_casts: bool,
    /// Context and descriptor are passed by pointer rather than reference.
    pub by_address: bool,
    /// Qualifier for Win32 API calls.
    pub api_scope: &'static str,
}

pub(crate) const CXX_SYNTAX: Syntax = Syntax {
    null: "nullptr",
    c_casts: false,
    by_address: false,
    api_scope: "::",
};

pub(crate) const C_SYNTAX: Syntax = Syntax {
    null: "NULL",
    c_casts: true,
    by_address: true,
    api_scope: "",
};

impl Syntax {
    pub fn cast(&self, ty: &str, expr: &str) -> String {
        if self.c_casts {
            format!("({})({})", ty, expr)
        } else if ty.ends_with('*') {
            format!("reinterpret_cast<{}>({})", ty, expr)
        } else {
            format!("static_cast<{}>({})", ty, expr)
        }
    }

    fn operand(&self, op: &Operand, names: &dyn ArgNames) -> String {
        op.spell(names)
    }

    pub fn ptr(&self, p: &PtrExpr, names: &dyn ArgNames) -> String {
        match p {
            PtrExpr::AddressOf(op) => format!("&{}", self.operand(op, names)),
            PtrExpr::Value(op) => self.operand(op, names),
            PtrExpr::StringOrNull { arg, wide } => {
                let x = names.arg(*arg);
                format!(
                    "({} != {}) ? {} : {}",
                    x,
                    self.null,
                    x,
                    null_literal(*wide)
                )
            }
        }
    }

    pub fn size(&self, s: &SizeExpr, names: &dyn ArgNames) -> String {
        match s {
            SizeExpr::Scaled { ty, factors } if factors.is_empty() => format!("sizeof({})", ty),
            SizeExpr::Scaled { ty, factors } => {
                let mut product = String::new();
                for f in factors {
                    let _ = write!(product, "{} * ", self.operand(f, names));
                }
                let _ = write!(product, "sizeof({})", ty);
                self.cast("ULONG", &product)
            }
            SizeExpr::Bytes(op) => self.operand(op, names),
            SizeExpr::TerminatedString { arg, wide } => {
                let x = names.arg(*arg);
                let (len, ch) = if *wide {
                    ("wcslen", "WCHAR")
                } else {
                    ("strlen", "CHAR")
                };
                format!(
                    "({} != {}) ? {} : {}",
                    x,
                    self.null,
                    self.cast("ULONG", &format!("({}({}) + 1) * sizeof({})", len, x, ch)),
                    self.cast("ULONG", &format!("sizeof({})", null_literal(*wide)))
                )
            }
            SizeExpr::Sid { arg } => {
                let x = names.arg(*arg);
                let sid = if self.c_casts {
                    format!("(PSID)({})", x)
                } else {
                    format!("const_cast<SID*>({})", x)
                };
                format!("GetLengthSid({})", sid)
            }
        }
    }

    /// Arguments forwarding wrapper parameters to a template function.
    pub fn call_args(&self, params: &[ParamSpec], names: &dyn ArgNames) -> Vec<String> {
        params
            .iter()
            .map(|p| {
                let name = p.name(names);
                if p.needs_cast() {
                    self.cast(&p.template_type, &name)
                } else {
                    name
                }
            })
            .collect()
    }

    fn object(&self, name: &str) -> String {
        if self.by_address {
            format!("&{}", name)
        } else {
            name.to_string()
        }
    }
}

fn null_literal(wide: bool) -> &'static str {
    if wide {
        "L\"NULL\""
    } else {
        "\"NULL\""
    }
}

/// Which side of the template/event split a parameter is declared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Template,
    Event,
}

/// `_In_reads_(N) const INT32* Values`
pub(crate) fn param_decl(p: &ParamSpec, names: &dyn ArgNames, side: Side) -> String {
    let ty = match side {
        Side::Template => &p.template_type,
        Side::Event => &p.event_type,
    };
    format!("{} {} {}", p.annotation.sal(names), ty, p.name(names))
}

// ── Activity helpers ────────────────────────────────────────────────────────

/// RAII class that writes Start with a fresh activity id on construction and
/// Stop with the same id on destruction. `scope` qualifies template calls.
pub(crate) fn activity_class(
    out: &mut String,
    syntax: &Syntax,
    dialect: Dialect,
    scope: &str,
    p: &ProviderPlan,
    a: &ActivityPlan,
) {
    let start = &p.events[a.start];
    let stop = &p.events[a.stop];
    let (Some(sw), Some(tw)) = (&start.write, &stop.write) else {
        return;
    };
    let class = format!("{}Activity", a.symbol);
    let context = syntax.object(&format!("{}_Context", p.symbol));

    let _ = writeln!(out, "class {}\n{{\npublic:", class);
    let params: Vec<String> = sw
        .params
        .iter()
        .map(|param| param_decl(param, &sw.names, Side::Event))
        .collect();
    if params.is_empty() {
        let _ = writeln!(out, "    explicit {}() noexcept", class);
    } else {
        let _ = writeln!(
            out,
            "    explicit {}(\n        {}) noexcept",
            class,
            params.join(",\n        ")
        );
    }

    let mut args = vec![
        context.clone(),
        syntax.object(&start.symbol),
        "&m_id".to_string(),
        syntax.null.to_string(),
    ];
    args.extend(syntax.call_args(&sw.params, &sw.names));
    let _ = writeln!(
        out,
        "    {{\n        {}EventActivityIdControl(EVENT_ACTIVITY_CTRL_CREATE_ID, &m_id);\n        if (EventEnabled{}()) {{\n            {}{}({});\n        }}\n    }}\n",
        syntax.api_scope,
        start.symbol,
        scope,
        template_function(dialect, &sw.template_key),
        args.join(", ")
    );
    let _ = writeln!(
        out,
        "    ~{}()\n    {{\n        if (EventEnabled{}()) {{\n            {}{}({}, {}, &m_id, {});\n        }}\n    }}\n",
        class,
        stop.symbol,
        scope,
        template_function(dialect, &tw.template_key),
        context,
        syntax.object(&stop.symbol),
        syntax.null
    );
    let _ = writeln!(
        out,
        "    {c}(const {c}&) = delete;\n    {c}& operator=(const {c}&) = delete;\n\n    const GUID& Id() const noexcept\n    {{\n        return m_id;\n    }}\n\nprivate:\n    GUID m_id;\n}};\n",
        c = class
    );
}

// ── Initializers ────────────────────────────────────────────────────────────

/// `{0x3970f9cf, 0x2c0c, 0x4f11, {0xb1, 0xcc, ...}}`
pub(crate) fn guid_initializer(g: &Guid) -> String {
    let tail: Vec<String> = g.data4.iter().map(|b| format!("0x{:02x}", b)).collect();
    format!(
        "{{0x{:08x}, 0x{:04x}, 0x{:04x}, {{{}}}}}",
        g.data1,
        g.data2,
        g.data3,
        tail.join(", ")
    )
}

/// EVENT_DESCRIPTOR field order: Id, Version, Channel, Level, Opcode, Task, Keyword.
pub(crate) fn descriptor_initializer(d: &EventDescriptor) -> String {
    format!(
        "{{0x{:04x}, 0x{:02x}, 0x{:02x}, 0x{:02x}, 0x{:02x}, 0x{:04x}, 0x{:016x}}}",
        d.id, d.version, d.channel, d.level, d.opcode, d.task, d.keyword
    )
}

/// `(Bits[w] & 0x...) != 0` for enable bit `bit`.
pub(crate) fn enable_test(bits: &str, bit: usize) -> String {
    format!("(({}[{}] & 0x{:08x}u) != 0)", bits, bit / 32, 1u32 << (bit % 32))
}

/// Template function stem for a mangled key.
pub(crate) fn template_function(dialect: Dialect, key: &str) -> String {
    match (dialect, key.is_empty()) {
        (Dialect::Cxx, true) => "WriteNoPayload".to_string(),
        (Dialect::Cxx, false) => format!("Template_{}", key),
        (Dialect::Mc, _) => format!("McTemplateU0{}", key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::PositionalNames;

    #[test]
    fn casts_per_syntax() {
        assert_eq!(CXX_SYNTAX.cast("UINT32", "Pid"), "static_cast<UINT32>(Pid)");
        assert_eq!(
            CXX_SYNTAX.cast("const UINT32*", "Pids"),
            "reinterpret_cast<const UINT32*>(Pids)"
        );
        assert_eq!(C_SYNTAX.cast("UINT32", "Pid"), "(UINT32)(Pid)");
    }

    #[test]
    fn size_expressions() {
        let scaled = SizeExpr::Scaled {
            ty: "UINT64",
            factors: vec![Operand::Arg(0)],
        };
        assert_eq!(
            CXX_SYNTAX.size(&scaled, &PositionalNames),
            "static_cast<ULONG>(_Arg0 * sizeof(UINT64))"
        );
        let unit = SizeExpr::Scaled {
            ty: "GUID",
            factors: vec![],
        };
        assert_eq!(C_SYNTAX.size(&unit, &PositionalNames), "sizeof(GUID)");
        let bytes = SizeExpr::Bytes(Operand::LengthArg(2));
        assert_eq!(C_SYNTAX.size(&bytes, &PositionalNames), "_Arg2_Len");
    }

    #[test]
    fn terminated_string_fallback() {
        let names: Vec<String> = vec!["Path".into()];
        let ptr = PtrExpr::StringOrNull { arg: 0, wide: true };
        assert_eq!(
            CXX_SYNTAX.ptr(&ptr, &names),
            "(Path != nullptr) ? Path : L\"NULL\""
        );
        let size = SizeExpr::TerminatedString { arg: 0, wide: false };
        assert_eq!(
            C_SYNTAX.size(&size, &names),
            "(Path != NULL) ? (ULONG)((strlen(Path) + 1) * sizeof(CHAR)) : (ULONG)(sizeof(\"NULL\"))"
        );
    }

    #[test]
    fn initializers() {
        let g: Guid = "3970f9cf-2c0c-4f11-b1cc-e3a1e9958833".parse().unwrap();
        assert_eq!(
            guid_initializer(&g),
            "{0x3970f9cf, 0x2c0c, 0x4f11, {0xb1, 0xcc, 0xe3, 0xa1, 0xe9, 0x95, 0x88, 0x33}}"
        );
        let d = EventDescriptor {
            id: 10,
            version: 1,
            channel: 0x10,
            level: 4,
            opcode: 1,
            task: 2,
            keyword: 5,
        };
        assert_eq!(
            descriptor_initializer(&d),
            "{0x000a, 0x01, 0x10, 0x04, 0x01, 0x0002, 0x0000000000000005}"
        );
    }

    #[test]
    fn enable_test_word_and_mask() {
        assert_eq!(enable_test("P_EnableBits", 0), "((P_EnableBits[0] & 0x00000001u) != 0)");
        assert_eq!(enable_test("P_EnableBits", 33), "((P_EnableBits[1] & 0x00000002u) != 0)");
    }

    #[test]
    fn template_function_names() {
        assert_eq!(template_function(Dialect::Cxx, ""), "WriteNoPayload");
        assert_eq!(template_function(Dialect::Cxx, "hZR0"), "Template_hZR0");
        assert_eq!(template_function(Dialect::Mc, "hZR0"), "McTemplateU0hZR0");
    }

    const OPS: &str = r#"{
      "providers": [{
        "name": "Contoso-Ops",
        "guid": "00010203-0405-0607-0809-0a0b0c0d0e0f",
        "opcodes": [
          { "name": "win:Start", "value": 1 },
          { "name": "win:Stop", "value": 2 }
        ],
        "events": [
          { "value": 10, "opcode": "win:Start", "symbol": "Op_AStart",
            "template": { "properties": [
              { "kind": "data", "name": "Id", "in_type": "UInt32" }
            ]}},
          { "value": 11, "opcode": "win:Stop", "symbol": "Op_AStop" },
          { "value": 20, "opcode": "win:Start", "symbol": "Op_BStart" },
          { "value": 21, "opcode": "win:Stop", "symbol": "Op_BStop" },
          { "value": 30, "symbol": "Ev",
            "template": { "properties": [
              { "kind": "data", "name": "Name_Len", "in_type": "UInt16" },
              { "kind": "data", "name": "Name", "in_type": "CountedUnicodeString" }
            ]}}
        ]
      }]
    }"#;

    fn render_ops(dialect: Dialect) -> String {
        let manifest = crate::schema::Manifest::from_json(OPS).unwrap();
        let tables: Vec<_> = manifest
            .providers
            .iter()
            .map(|p| crate::ident::resolve_provider(p).unwrap())
            .collect();
        let plan = crate::plan::build_plan(&manifest, &tables).plan.unwrap();
        let options = RenderOptions {
            dialect,
            ..RenderOptions::default()
        };
        render(&plan, &options)
    }

    #[test]
    fn activity_classes_are_distinct() {
        for dialect in [Dialect::Cxx, Dialect::Mc] {
            let out = render_ops(dialect);
            assert_eq!(out.matches("class Op_AStActivity\n").count(), 1, "{:?}", dialect);
            assert_eq!(out.matches("class Op_BStActivity\n").count(), 1, "{:?}", dialect);
            assert!(!out.contains("class Op_Activity"), "{:?}", dialect);
        }
    }

    #[test]
    fn activity_class_follows_dialect_syntax() {
        let cxx = render_ops(Dialect::Cxx);
        assert!(cxx.contains("        ::EventActivityIdControl(EVENT_ACTIVITY_CTRL_CREATE_ID, &m_id);"));
        assert!(cxx.contains("etw::Template_d(Contoso_Ops_Context, Op_AStart, &m_id, nullptr, Id);"));
        assert!(cxx.contains("etw::WriteNoPayload(Contoso_Ops_Context, Op_AStop, &m_id, nullptr);"));

        let mc = render_ops(Dialect::Mc);
        assert!(mc.contains("\n        EventActivityIdControl(EVENT_ACTIVITY_CTRL_CREATE_ID, &m_id);"));
        assert!(mc.contains("McTemplateU0d(&Contoso_Ops_Context, &Op_AStart, &m_id, NULL, Id);"));
        assert!(mc.contains("McTemplateU0(&Contoso_Ops_Context, &Op_AStop, &m_id, NULL);"));
    }

    #[test]
    fn implicit_length_param_does_not_shadow_property() {
        let out = render_ops(Dialect::Cxx);
        assert!(out.contains("UINT16 Name_Len,"));
        assert!(out.contains("USHORT Name_1_Len,"));
        assert!(out.contains("PCWSTR Name_1)"));
        assert!(!out.contains("USHORT Name_Len"));
    }
}
