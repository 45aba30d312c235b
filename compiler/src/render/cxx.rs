// cxx.rs — C++ inline-function dialect
//
// Layout of the generated header:
//   preamble → shared runtime (guarded) → template functions (each guarded
//   by its mangled suffix) → per-provider declarations in the user namespace
//   → activity classes.
//
// Runtime and templates live in the runtime namespace so that headers
// generated from different manifests share them.

use std::fmt::Write as _;

use super::{
    activity_class, descriptor_initializer, enable_test, guid_initializer, param_decl,
    template_function, Dialect, LanguageStandard, RenderOptions, Side, BANNER, CXX_SYNTAX,
};
use crate::plan::{ActivityPlan, EventPlan, GenerationPlan, ProviderPlan, TemplatePlan};
use crate::strategy::PositionalNames;

pub fn render(plan: &GenerationPlan, options: &RenderOptions) -> String {
    let mut ctx = CxxCtx::new(plan, options);
    ctx.emit_all();
    ctx.out
}

const RUNTIME: &str = r#"struct ProviderContext
{
    REGHANDLE RegistrationHandle;
    ULONGLONG MatchAnyKeyword;
    ULONGLONG MatchAllKeyword;
    UCHAR Level;
    bool IsEnabled;
    const char* Traits;
    USHORT TraitsSize;
    USHORT EnableBitCount;
    ULONG* EnableBits;
    const ULONGLONG* Keywords;
    const UCHAR* Levels;
};

inline bool LevelKeywordEnabled(const ProviderContext& Context, UCHAR Level, ULONGLONG Keyword) noexcept
{
    if (Level > Context.Level && Context.Level != 0) {
        return false;
    }
    return Keyword == 0
        || ((Keyword & Context.MatchAnyKeyword) != 0
            && (Keyword & Context.MatchAllKeyword) == Context.MatchAllKeyword);
}

inline void NTAPI EnableCallback(
    LPCGUID SourceId,
    ULONG ControlCode,
    UCHAR Level,
    ULONGLONG MatchAnyKeyword,
    ULONGLONG MatchAllKeyword,
    PEVENT_FILTER_DESCRIPTOR FilterData,
    PVOID CallbackContext)
{
    (void)SourceId;
    (void)FilterData;
    auto* Context = static_cast<ProviderContext*>(CallbackContext);
    if (Context == nullptr) {
        return;
    }
    switch (ControlCode) {
    case EVENT_CONTROL_CODE_ENABLE_PROVIDER:
        Context->Level = Level;
        Context->MatchAnyKeyword = MatchAnyKeyword;
        Context->MatchAllKeyword = MatchAllKeyword;
        Context->IsEnabled = true;
        for (USHORT Bit = 0; Bit < Context->EnableBitCount; ++Bit) {
            const ULONG Mask = 1ul << (Bit % 32);
            if (LevelKeywordEnabled(*Context, Context->Levels[Bit], Context->Keywords[Bit])) {
                Context->EnableBits[Bit / 32] |= Mask;
            } else {
                Context->EnableBits[Bit / 32] &= ~Mask;
            }
        }
        break;
    case EVENT_CONTROL_CODE_DISABLE_PROVIDER:
        Context->IsEnabled = false;
        Context->Level = 0;
        Context->MatchAnyKeyword = 0;
        Context->MatchAllKeyword = 0;
        for (USHORT Word = 0; Word < (Context->EnableBitCount + 31) / 32; ++Word) {
            Context->EnableBits[Word] = 0;
        }
        break;
    default:
        break;
    }
}

inline ULONG Register(const GUID& ProviderId, ProviderContext& Context) noexcept
{
    const ULONG Error = ::EventRegister(&ProviderId, &EnableCallback, &Context, &Context.RegistrationHandle);
    if (Error == ERROR_SUCCESS && Context.TraitsSize != 0) {
        ::EventSetInformation(
            Context.RegistrationHandle,
            EventProviderSetTraits,
            const_cast<char*>(Context.Traits),
            Context.TraitsSize);
    }
    return Error;
}

inline ULONG Unregister(ProviderContext& Context) noexcept
{
    const ULONG Error = ::EventUnregister(Context.RegistrationHandle);
    Context.RegistrationHandle = 0;
    return Error;
}

// Slot 0 always carries the provider traits (possibly empty).
inline ULONG WriteEvent(
    const ProviderContext& Context,
    const EVENT_DESCRIPTOR& Descriptor,
    _In_opt_ const GUID* ActivityId,
    _In_opt_ const GUID* RelatedActivityId,
    ULONG Count,
    _Inout_updates_(Count) EVENT_DATA_DESCRIPTOR* Data) noexcept
{
    ::EventDataDescCreate(&Data[0], Context.Traits, Context.TraitsSize);
    Data[0].Type = EVENT_DATA_DESCRIPTOR_TYPE_PROVIDER_METADATA;
    return ::EventWriteTransfer(
        Context.RegistrationHandle, &Descriptor, ActivityId, RelatedActivityId, Count, Data);
}
"#;

struct CxxCtx<'a> {
    plan: &'a GenerationPlan,
    options: &'a RenderOptions,
    out: String,
}

impl<'a> CxxCtx<'a> {
    fn new(plan: &'a GenerationPlan, options: &'a RenderOptions) -> Self {
        CxxCtx {
            plan,
            options,
            out: String::with_capacity(16 * 1024),
        }
    }

    fn rt(&self) -> &str {
        &self.options.runtime_namespace
    }

    fn emit_all(&mut self) {
        self.emit_preamble();
        self.emit_runtime();
        self.emit_templates();
        let plan = self.plan;
        if !plan.providers.is_empty() {
            let ns = self.options.namespace.clone();
            if let Some(ns) = &ns {
                self.open_namespace(ns);
            }
            for provider in &plan.providers {
                self.emit_provider(provider);
            }
            if let Some(ns) = &ns {
                self.close_namespace(ns);
            }
        }
    }

    // ── Syntax helpers ──

    fn open_namespace(&mut self, ns: &str) {
        match self.options.standard {
            LanguageStandard::Cxx17 => {
                let _ = writeln!(self.out, "namespace {} {{\n", ns);
            }
            LanguageStandard::Cxx11 => {
                let parts: Vec<&str> = ns.split("::").collect();
                let opened: Vec<String> = parts.iter().map(|p| format!("namespace {} {{", p)).collect();
                let _ = writeln!(self.out, "{}\n", opened.join(" "));
            }
        }
    }

    fn close_namespace(&mut self, ns: &str) {
        let braces = match self.options.standard {
            LanguageStandard::Cxx17 => "}".to_string(),
            LanguageStandard::Cxx11 => vec!["}"; ns.split("::").count()].join(" "),
        };
        let _ = writeln!(self.out, "{} // namespace {}\n", braces, ns);
    }

    /// Read-only namespace-scope constant.
    fn constant(&self, ty: &str, name: &str, init: &str) -> String {
        match self.options.standard {
            LanguageStandard::Cxx17 => format!("inline constexpr {} {} = {};", ty, name, init),
            LanguageStandard::Cxx11 => {
                format!("__declspec(selectany) extern const {} {} = {};", ty, name, init)
            }
        }
    }

    /// Mutable namespace-scope variable.
    fn variable(&self, ty: &str, name: &str, init: &str) -> String {
        match self.options.standard {
            LanguageStandard::Cxx17 => format!("inline {} {} = {};", ty, name, init),
            LanguageStandard::Cxx11 => format!("__declspec(selectany) {} {} = {};", ty, name, init),
        }
    }

    fn signature(&mut self, head: &str, params: &[String], tail: &str) {
        if params.is_empty() {
            let _ = writeln!(self.out, "{}(){}", head, tail);
            return;
        }
        let _ = writeln!(self.out, "{}(", head);
        let _ = writeln!(self.out, "    {}){}", params.join(",\n    "), tail);
    }

    // ── Sections ──

    fn emit_preamble(&mut self) {
        self.out.push_str(BANNER);
        self.out.push_str("#pragma once\n\n");
        self.out.push_str("#include <windows.h>\n");
        self.out.push_str("#include <evntprov.h>\n");
        self.out.push_str("#include <sal.h>\n");
        self.out.push_str("#include <cstring>\n");
        self.out.push_str("#include <cwchar>\n\n");
    }

    fn emit_runtime(&mut self) {
        self.out.push_str("#ifndef EMC_RUNTIME_DEFINED\n#define EMC_RUNTIME_DEFINED\n\n");
        let rt = self.rt().to_string();
        self.open_namespace(&rt);
        self.out.push_str(RUNTIME);
        self.out.push('\n');
        self.close_namespace(&rt);
        self.out.push_str("#endif // EMC_RUNTIME_DEFINED\n\n");
    }

    fn emit_templates(&mut self) {
        let plan = self.plan;
        if plan.templates.is_empty() {
            return;
        }
        let rt = self.rt().to_string();
        self.open_namespace(&rt);
        for t in &plan.templates {
            self.emit_template(t);
        }
        self.close_namespace(&rt);
    }

    fn emit_template(&mut self, t: &TemplatePlan) {
        let name = template_function(Dialect::Cxx, &t.key);
        let guard = format!("EMC_{}_DEFINED", name);
        let _ = writeln!(self.out, "#ifndef {}\n#define {}", guard, guard);
        let mut params = vec![
            "const ProviderContext& Context".to_string(),
            "const EVENT_DESCRIPTOR& Descriptor".to_string(),
            "_In_opt_ const GUID* ActivityId".to_string(),
            "_In_opt_ const GUID* RelatedActivityId".to_string(),
        ];
        params.extend(
            t.params
                .iter()
                .map(|p| param_decl(p, &PositionalNames, Side::Template)),
        );
        self.signature(&format!("inline ULONG {}", name), &params, " noexcept");
        self.out.push_str("{\n");
        let _ = writeln!(self.out, "    EVENT_DATA_DESCRIPTOR EventData[{}];", t.slot_count);
        for (i, slot) in t.layout.slots.iter().enumerate() {
            if let Some(comment) = &slot.comment {
                let _ = writeln!(self.out, "    // {}", comment);
            }
            let _ = writeln!(
                self.out,
                "    ::EventDataDescCreate(&EventData[{}], {}, {});",
                i + 1,
                CXX_SYNTAX.ptr(&slot.ptr, &PositionalNames),
                CXX_SYNTAX.size(&slot.size, &PositionalNames)
            );
        }
        let _ = writeln!(
            self.out,
            "    return WriteEvent(Context, Descriptor, ActivityId, RelatedActivityId, {}, EventData);",
            t.slot_count
        );
        self.out.push_str("}\n");
        let _ = writeln!(self.out, "#endif // {}\n", guard);
    }

    fn emit_provider(&mut self, p: &ProviderPlan) {
        let sym = &p.symbol;
        let _ = writeln!(self.out, "// Provider \"{}\" {{{}}}\n", p.name, p.guid);

        let line = self.constant("GUID", &format!("{}_Guid", sym), &guid_initializer(&p.guid));
        let _ = writeln!(self.out, "{}", line);
        if let Some(control) = &p.control_guid {
            let line = self.constant(
                "GUID",
                &format!("{}_ControlGuid", sym),
                &guid_initializer(control),
            );
            let _ = writeln!(self.out, "{}", line);
        }
        if let Some(traits) = &p.traits {
            let line = self.constant(
                "char",
                &format!("{}_Traits[]", sym),
                &format!("\"{}\"", traits.c_literal()),
            );
            let _ = writeln!(self.out, "{}", line);
        }
        if p.include_process_name {
            let line = self.constant("bool", &format!("{}_IncludeProcessName", sym), "true");
            let _ = writeln!(self.out, "{}", line);
        }
        self.out.push('\n');

        if self.options.non_essentials {
            self.emit_non_essentials(p);
        }
        self.emit_context(p);

        for event in &p.events {
            self.emit_event(p, event);
        }
        for activity in &p.activities {
            self.emit_activity(p, activity);
        }
    }

    fn emit_non_essentials(&mut self, p: &ProviderPlan) {
        let mut lines = Vec::new();
        for (ty, values) in [
            ("UCHAR", &p.channels),
            ("UCHAR", &p.levels),
            ("UCHAR", &p.opcodes),
            ("USHORT", &p.tasks),
        ] {
            for v in values {
                lines.push(self.constant(ty, &v.symbol, &v.value.to_string()));
            }
        }
        for k in &p.keywords {
            lines.push(self.constant("ULONGLONG", &k.symbol, &format!("0x{:x}", k.value)));
        }
        for m in &p.maps {
            for item in &m.items {
                lines.push(self.constant("ULONG", &item.symbol, &format!("0x{:x}", item.value)));
            }
        }
        for s in &p.strings {
            if let Some(id) = s.message_id {
                lines.push(self.constant("ULONG", &s.symbol, &format!("0x{:08x}", id)));
            }
        }
        if lines.is_empty() {
            return;
        }
        for line in lines {
            let _ = writeln!(self.out, "{}", line);
        }
        self.out.push('\n');
    }

    fn emit_context(&mut self, p: &ProviderPlan) {
        let sym = &p.symbol;
        let rt = self.rt().to_string();
        let n = p.enable_bits.len();
        let (bits, keywords, levels) = if n == 0 {
            ("nullptr".to_string(), "nullptr".to_string(), "nullptr".to_string())
        } else {
            let kw: Vec<String> = p.enable_bits.iter().map(|b| format!("0x{:x}", b.keyword)).collect();
            let lv: Vec<String> = p.enable_bits.iter().map(|b| b.level.to_string()).collect();
            let lines = [
                self.variable("ULONG", &format!("{}_EnableBits[{}]", sym, p.enable_words()), "{}"),
                self.constant(
                    "ULONGLONG",
                    &format!("{}_Keywords[{}]", sym, n),
                    &format!("{{{}}}", kw.join(", ")),
                ),
                self.constant(
                    "UCHAR",
                    &format!("{}_Levels[{}]", sym, n),
                    &format!("{{{}}}", lv.join(", ")),
                ),
            ];
            for line in lines {
                let _ = writeln!(self.out, "{}", line);
            }
            (
                format!("{}_EnableBits", sym),
                format!("{}_Keywords", sym),
                format!("{}_Levels", sym),
            )
        };
        let (traits, traits_size) = match &p.traits {
            Some(t) => (format!("{}_Traits", sym), t.len()),
            None => ("nullptr".to_string(), 0),
        };
        let init = format!(
            "{{0, 0, 0, 0, false, {}, {}, {}, {}, {}, {}}}",
            traits, traits_size, n, bits, keywords, levels
        );
        let line = self.variable(
            &format!("{}::ProviderContext", rt),
            &format!("{}_Context", sym),
            &init,
        );
        let _ = writeln!(self.out, "{}\n", line);

        if self.options.static_provider {
            self.out.push_str("#pragma section(\".emc$m\", read)\n");
            let _ = writeln!(
                self.out,
                "__declspec(allocate(\".emc$m\")) __declspec(selectany) {}::ProviderContext* const {}_StaticEntry = &{}_Context;\n",
                rt, sym, sym
            );
        }

        let _ = writeln!(
            self.out,
            "inline ULONG Register{}() noexcept\n{{\n    return {}::Register({}_Guid, {}_Context);\n}}\n",
            sym, rt, sym, sym
        );
        let _ = writeln!(
            self.out,
            "inline ULONG Unregister{}() noexcept\n{{\n    return {}::Unregister({}_Context);\n}}\n",
            sym, rt, sym
        );
    }

    fn emit_event(&mut self, p: &ProviderPlan, e: &EventPlan) {
        let line = self.constant("EVENT_DESCRIPTOR", &e.symbol, &descriptor_initializer(&e.descriptor));
        let _ = writeln!(self.out, "{}", line);
        let Some(w) = &e.write else {
            self.out.push('\n');
            return;
        };
        let _ = writeln!(
            self.out,
            "inline bool EventEnabled{}() noexcept\n{{\n    return {};\n}}",
            e.symbol,
            enable_test(&format!("{}_EnableBits", p.symbol), w.enable_bit)
        );

        let params: Vec<String> = w
            .params
            .iter()
            .map(|param| param_decl(param, &w.names, Side::Event))
            .collect();
        let head = format!("inline ULONG {}{}", self.options.log_prefix, e.symbol);
        self.signature(&head, &params, " noexcept");
        let mut args = vec![
            format!("{}_Context", p.symbol),
            e.symbol.clone(),
            "nullptr".to_string(),
            "nullptr".to_string(),
        ];
        args.extend(CXX_SYNTAX.call_args(&w.params, &w.names));
        let _ = writeln!(
            self.out,
            "{{\n    return EventEnabled{}()\n        ? {}::{}({})\n        : ERROR_SUCCESS;\n}}\n",
            e.symbol,
            self.options.runtime_namespace,
            template_function(Dialect::Cxx, &w.template_key),
            args.join(", ")
        );
    }

    fn emit_activity(&mut self, p: &ProviderPlan, a: &ActivityPlan) {
        let scope = format!("{}::", self.options.runtime_namespace);
        activity_class(&mut self.out, &CXX_SYNTAX, Dialect::Cxx, &scope, p, a);
    }
}
