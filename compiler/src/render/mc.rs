// mc.rs — MC-compatible macro dialect
//
// Mirrors the layout of headers produced by the Windows message compiler:
// a C trace-context struct and runtime, `McTemplateU0{suffix}` functions,
// `EXTERN_C __declspec(selectany)` data and per-event `#define` wrappers.
// Plain C consumers can include it; activity classes appear only under
// `__cplusplus`. Namespace and language-standard options do not apply.

use std::fmt::Write as _;

use super::{
    activity_class, descriptor_initializer, enable_test, guid_initializer, param_decl,
    template_function, Dialect, RenderOptions, Side, BANNER, C_SYNTAX,
};
use crate::plan::{ActivityPlan, EventPlan, GenerationPlan, ProviderPlan, TemplatePlan};
use crate::strategy::PositionalNames;

pub fn render(plan: &GenerationPlan, options: &RenderOptions) -> String {
    let mut ctx = McCtx {
        plan,
        options,
        out: String::with_capacity(16 * 1024),
    };
    ctx.emit_all();
    ctx.out
}

const TRACE_CONTEXT: &str = r#"#ifndef MCGEN_TRACE_CONTEXT_DEF
#define MCGEN_TRACE_CONTEXT_DEF
typedef struct _MCGEN_TRACE_CONTEXT
{
    REGHANDLE RegistrationHandle;
    ULONGLONG MatchAnyKeyword;
    ULONGLONG MatchAllKeyword;
    UCHAR Level;
    BOOLEAN IsEnabled;
    const char* Traits;
    USHORT TraitsSize;
    USHORT EnableBitCount;
    PULONG EnableBits;
    const ULONGLONG* EnableKeyWords;
    const UCHAR* EnableLevel;
} MCGEN_TRACE_CONTEXT, *PMCGEN_TRACE_CONTEXT;
#endif // MCGEN_TRACE_CONTEXT_DEF

"#;

const RUNTIME: &str = r#"#ifndef MCGEN_EMC_RUNTIME_DEF
#define MCGEN_EMC_RUNTIME_DEF

FORCEINLINE BOOLEAN
McGenLevelKeywordEnabled(
    _In_ PMCGEN_TRACE_CONTEXT Context,
    _In_ UCHAR Level,
    _In_ ULONGLONG Keyword)
{
    if (Level > Context->Level && Context->Level != 0) {
        return FALSE;
    }
    if (Keyword == 0) {
        return TRUE;
    }
    return (Keyword & Context->MatchAnyKeyword) != 0
        && (Keyword & Context->MatchAllKeyword) == Context->MatchAllKeyword;
}

DECLSPEC_NOINLINE __inline VOID NTAPI
McGenControlCallbackV2(
    _In_ LPCGUID SourceId,
    _In_ ULONG ControlCode,
    _In_ UCHAR Level,
    _In_ ULONGLONG MatchAnyKeyword,
    _In_ ULONGLONG MatchAllKeyword,
    _In_opt_ PEVENT_FILTER_DESCRIPTOR FilterData,
    _Inout_opt_ PVOID CallbackContext)
{
    PMCGEN_TRACE_CONTEXT Context = (PMCGEN_TRACE_CONTEXT)CallbackContext;
    ULONG Bit;

    UNREFERENCED_PARAMETER(SourceId);
    UNREFERENCED_PARAMETER(FilterData);
    if (Context == NULL) {
        return;
    }
    switch (ControlCode) {
    case EVENT_CONTROL_CODE_ENABLE_PROVIDER:
        Context->Level = Level;
        Context->MatchAnyKeyword = MatchAnyKeyword;
        Context->MatchAllKeyword = MatchAllKeyword;
        Context->IsEnabled = TRUE;
        for (Bit = 0; Bit < Context->EnableBitCount; Bit += 1) {
            if (McGenLevelKeywordEnabled(Context, Context->EnableLevel[Bit], Context->EnableKeyWords[Bit])) {
                Context->EnableBits[Bit >> 5] |= (1ul << (Bit % 32));
            } else {
                Context->EnableBits[Bit >> 5] &= ~(1ul << (Bit % 32));
            }
        }
        break;
    case EVENT_CONTROL_CODE_DISABLE_PROVIDER:
        Context->IsEnabled = FALSE;
        Context->Level = 0;
        Context->MatchAnyKeyword = 0;
        Context->MatchAllKeyword = 0;
        if (Context->EnableBitCount != 0) {
            RtlZeroMemory(Context->EnableBits, (((Context->EnableBitCount - 1) / 32) + 1) * sizeof(ULONG));
        }
        break;
    default:
        break;
    }
}

FORCEINLINE ULONG
McGenEventRegister(
    _In_ LPCGUID ProviderId,
    _Inout_ PMCGEN_TRACE_CONTEXT Context)
{
    ULONG Error = EventRegister(ProviderId, McGenControlCallbackV2, Context, &Context->RegistrationHandle);
    if (Error == ERROR_SUCCESS && Context->TraitsSize != 0) {
        EventSetInformation(
            Context->RegistrationHandle,
            EventProviderSetTraits,
            (PVOID)Context->Traits,
            Context->TraitsSize);
    }
    return Error;
}

FORCEINLINE ULONG
McGenEventUnregister(_Inout_ PMCGEN_TRACE_CONTEXT Context)
{
    ULONG Error = EventUnregister(Context->RegistrationHandle);
    Context->RegistrationHandle = 0;
    return Error;
}

FORCEINLINE ULONG
McGenEventWrite(
    _In_ PMCGEN_TRACE_CONTEXT Context,
    _In_ PCEVENT_DESCRIPTOR Descriptor,
    _In_opt_ const GUID* ActivityId,
    _In_opt_ const GUID* RelatedActivityId,
    _In_range_(1, 128) ULONG EventDataCount,
    _Inout_updates_(EventDataCount) EVENT_DATA_DESCRIPTOR* EventData)
{
    EventDataDescCreate(&EventData[0], Context->Traits, Context->TraitsSize);
    EventData[0].Type = EVENT_DATA_DESCRIPTOR_TYPE_PROVIDER_METADATA;
    return EventWriteTransfer(
        Context->RegistrationHandle, Descriptor, ActivityId, RelatedActivityId, EventDataCount, EventData);
}

#endif // MCGEN_EMC_RUNTIME_DEF

"#;

struct McCtx<'a> {
    plan: &'a GenerationPlan,
    options: &'a RenderOptions,
    out: String,
}

impl<'a> McCtx<'a> {
    fn emit_all(&mut self) {
        self.out.push_str(BANNER);
        self.out.push_str("#pragma once\n\n");
        self.out.push_str("#include <windows.h>\n");
        self.out.push_str("#include <evntprov.h>\n");
        self.out.push_str("#include <sal.h>\n");
        self.out.push_str("#include <string.h>\n");
        self.out.push_str("#include <wchar.h>\n\n");
        self.out.push_str(TRACE_CONTEXT);
        self.out.push_str(RUNTIME);

        let plan = self.plan;
        for t in &plan.templates {
            self.emit_template(t);
        }
        for provider in &plan.providers {
            self.emit_provider(provider);
        }

        let activities: Vec<(&ProviderPlan, &ActivityPlan)> = plan
            .providers
            .iter()
            .flat_map(|p| p.activities.iter().map(move |a| (p, a)))
            .collect();
        if !activities.is_empty() {
            self.out.push_str("#ifdef __cplusplus\n\n");
            for (p, a) in activities {
                self.emit_activity(p, a);
            }
            self.out.push_str("#endif // __cplusplus\n");
        }
    }

    fn emit_template(&mut self, t: &TemplatePlan) {
        let name = template_function(Dialect::Mc, &t.key);
        let argcount = format!("{}_ARGCOUNT", name);
        let _ = writeln!(self.out, "#ifndef {}_def\n#define {}_def", name, name);
        let _ = writeln!(self.out, "#define {} {}\n", argcount, t.slot_count - 1);

        let mut params = vec![
            "_In_ PMCGEN_TRACE_CONTEXT Context".to_string(),
            "_In_ PCEVENT_DESCRIPTOR Descriptor".to_string(),
            "_In_opt_ const GUID* ActivityId".to_string(),
            "_In_opt_ const GUID* RelatedActivityId".to_string(),
        ];
        params.extend(
            t.params
                .iter()
                .map(|p| param_decl(p, &PositionalNames, Side::Template)),
        );
        let _ = writeln!(
            self.out,
            "DECLSPEC_NOINLINE __inline ULONG\n{}(\n    {})\n{{",
            name,
            params.join(",\n    ")
        );
        let _ = writeln!(
            self.out,
            "    EVENT_DATA_DESCRIPTOR EventData[{} + 1];\n",
            argcount
        );
        for (i, slot) in t.layout.slots.iter().enumerate() {
            if let Some(comment) = &slot.comment {
                let _ = writeln!(self.out, "    // {}", comment);
            }
            let _ = writeln!(
                self.out,
                "    EventDataDescCreate(&EventData[{}], {}, {});",
                i + 1,
                C_SYNTAX.ptr(&slot.ptr, &PositionalNames),
                C_SYNTAX.size(&slot.size, &PositionalNames)
            );
        }
        if !t.layout.slots.is_empty() {
            self.out.push('\n');
        }
        let _ = writeln!(
            self.out,
            "    return McGenEventWrite(Context, Descriptor, ActivityId, RelatedActivityId, {} + 1, EventData);\n}}",
            argcount
        );
        let _ = writeln!(self.out, "#endif // {}_def\n", name);
    }

    fn emit_provider(&mut self, p: &ProviderPlan) {
        let sym = &p.symbol;
        let _ = writeln!(self.out, "// Provider \"{}\" {{{}}}", p.name, p.guid);
        let _ = writeln!(
            self.out,
            "EXTERN_C __declspec(selectany) const GUID {} = {};",
            sym,
            guid_initializer(&p.guid)
        );
        if let Some(control) = &p.control_guid {
            let _ = writeln!(
                self.out,
                "EXTERN_C __declspec(selectany) const GUID {}_ControlGuid = {};",
                sym,
                guid_initializer(control)
            );
        }
        if let Some(traits) = &p.traits {
            let _ = writeln!(
                self.out,
                "EXTERN_C __declspec(selectany) const char {}_Traits[] = \"{}\";",
                sym,
                traits.c_literal()
            );
        }
        if p.include_process_name {
            let _ = writeln!(self.out, "#define {}_INCLUDE_PROCESS_NAME 1", sym);
        }
        self.out.push('\n');

        if self.options.non_essentials {
            self.emit_non_essentials(p);
        }
        self.emit_context(p);

        for event in &p.events {
            self.emit_event(p, event);
        }
    }

    fn emit_non_essentials(&mut self, p: &ProviderPlan) {
        let mut lines = Vec::new();
        for values in [&p.channels, &p.levels, &p.opcodes, &p.tasks] {
            for v in values {
                lines.push(format!("#define {} 0x{:x}", v.symbol, v.value));
            }
        }
        for k in &p.keywords {
            lines.push(format!("#define {} 0x{:x}", k.symbol, k.value));
        }
        for m in &p.maps {
            for item in &m.items {
                lines.push(format!("#define {} 0x{:x}", item.symbol, item.value));
            }
        }
        for s in &p.strings {
            if let Some(id) = s.message_id {
                lines.push(format!("#define {} 0x{:08X}L", s.symbol, id));
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
        let n = p.enable_bits.len();
        let (bits, keywords, levels) = if n == 0 {
            ("NULL".to_string(), "NULL".to_string(), "NULL".to_string())
        } else {
            let kw: Vec<String> = p.enable_bits.iter().map(|b| format!("0x{:x}", b.keyword)).collect();
            let lv: Vec<String> = p.enable_bits.iter().map(|b| b.level.to_string()).collect();
            let _ = writeln!(
                self.out,
                "EXTERN_C __declspec(selectany) DECLSPEC_CACHEALIGN ULONG {}_EnableBits[{}];",
                sym,
                p.enable_words()
            );
            let _ = writeln!(
                self.out,
                "EXTERN_C __declspec(selectany) const ULONGLONG {}_Keywords[{}] = {{{}}};",
                sym,
                n,
                kw.join(", ")
            );
            let _ = writeln!(
                self.out,
                "EXTERN_C __declspec(selectany) const UCHAR {}_Levels[{}] = {{{}}};",
                sym,
                n,
                lv.join(", ")
            );
            (
                format!("{}_EnableBits", sym),
                format!("{}_Keywords", sym),
                format!("{}_Levels", sym),
            )
        };
        let (traits, traits_size) = match &p.traits {
            Some(t) => (format!("{}_Traits", sym), t.len()),
            None => ("NULL".to_string(), 0),
        };
        let _ = writeln!(
            self.out,
            "EXTERN_C __declspec(selectany) MCGEN_TRACE_CONTEXT {}_Context = {{0, 0, 0, 0, FALSE, {}, {}, {}, {}, {}, {}}};\n",
            sym, traits, traits_size, n, bits, keywords, levels
        );

        if self.options.static_provider {
            self.out.push_str("#pragma section(\".emc$m\", read)\n");
            let _ = writeln!(
                self.out,
                "EXTERN_C __declspec(allocate(\".emc$m\")) __declspec(selectany) PMCGEN_TRACE_CONTEXT const {}_StaticEntry = &{}_Context;\n",
                sym, sym
            );
        }

        let _ = writeln!(
            self.out,
            "#define EventRegister{}() McGenEventRegister(&{}, &{}_Context)",
            sym, sym, sym
        );
        let _ = writeln!(
            self.out,
            "#define EventUnregister{}() McGenEventUnregister(&{}_Context)\n",
            sym, sym
        );
    }

    fn emit_event(&mut self, p: &ProviderPlan, e: &EventPlan) {
        let _ = writeln!(
            self.out,
            "EXTERN_C __declspec(selectany) const EVENT_DESCRIPTOR {} = {};",
            e.symbol,
            descriptor_initializer(&e.descriptor)
        );
        let _ = writeln!(self.out, "#define {}_value 0x{:x}", e.symbol, e.descriptor.id);
        let Some(w) = &e.write else {
            self.out.push('\n');
            return;
        };
        let _ = writeln!(
            self.out,
            "#define EventEnabled{}() {}",
            e.symbol,
            enable_test(&format!("{}_EnableBits", p.symbol), w.enable_bit)
        );
        let macro_params: Vec<String> = w.params.iter().map(|param| param.name(&w.names)).collect();
        let mut args = vec![
            format!("&{}_Context", p.symbol),
            format!("&{}", e.symbol),
            "NULL".to_string(),
            "NULL".to_string(),
        ];
        args.extend(C_SYNTAX.call_args(&w.params, &w.names));
        let _ = writeln!(
            self.out,
            "#define {}{}({}) \\\n    (EventEnabled{}() \\\n        ? {}({}) \\\n        : ERROR_SUCCESS)\n",
            self.options.log_prefix,
            e.symbol,
            macro_params.join(", "),
            e.symbol,
            template_function(Dialect::Mc, &w.template_key),
            args.join(", ")
        );
    }

    fn emit_activity(&mut self, p: &ProviderPlan, a: &ActivityPlan) {
        activity_class(&mut self.out, &C_SYNTAX, Dialect::Mc, "", p, a);
    }
}
