use clap::Parser;
use std::io::Write as _;
use std::path::PathBuf;

use emc::pass::PassId;
use emc::pipeline::{run_pipeline, CompilationState};
use emc::render::{Dialect, LanguageStandard, RenderOptions};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    Header,
    Plan,
    BuildInfo,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum DialectArg {
    Cxx,
    Mc,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum StdArg {
    Cxx11,
    Cxx17,
}

#[derive(Parser, Debug)]
#[command(
    name = "emc",
    version,
    about = "Event Manifest Compiler — generates ETW tracing headers from instrumentation schemas"
)]
struct Cli {
    /// Input schema graph (JSON)
    schema: PathBuf,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Header)]
    emit: EmitStage,

    /// Header dialect
    #[arg(long, value_enum, default_value_t = DialectArg::Cxx)]
    dialect: DialectArg,

    /// Namespace for generated declarations (C++ dialect)
    #[arg(long)]
    namespace: Option<String>,

    /// Namespace of the shared runtime and template functions (C++ dialect)
    #[arg(long, default_value = "etw")]
    runtime_namespace: String,

    /// Language standard for namespace and constant syntax
    #[arg(long = "std", value_enum, default_value_t = StdArg::Cxx17)]
    standard: StdArg,

    /// Prefix of per-event write functions
    #[arg(long, default_value = "EventWrite")]
    log_prefix: String,

    /// Omit channel/level/opcode/task/keyword/map/string constants
    #[arg(long)]
    no_non_essentials: bool,

    /// Place each provider context in a linker section
    #[arg(long)]
    static_provider: bool,

    /// Print passes and timing
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            dialect: match self.dialect {
                DialectArg::Cxx => Dialect::Cxx,
                DialectArg::Mc => Dialect::Mc,
            },
            namespace: self.namespace.clone(),
            runtime_namespace: self.runtime_namespace.clone(),
            standard: match self.standard {
                StdArg::Cxx11 => LanguageStandard::Cxx11,
                StdArg::Cxx17 => LanguageStandard::Cxx17,
            },
            log_prefix: self.log_prefix.clone(),
            non_essentials: !self.no_non_essentials,
            static_provider: self.static_provider,
        }
    }
}

// ── Logging ──

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("emc: {}", record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: bool) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        });
    }
}

fn write_output(path: Option<&PathBuf>, text: &str) -> std::io::Result<()> {
    match path {
        Some(path) => std::fs::write(path, text),
        None => std::io::stdout().lock().write_all(text.as_bytes()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::debug!("schema = {}", cli.schema.display());
    log::debug!("emit   = {:?}", cli.emit);

    // ── Load schema ──
    let source = match std::fs::read_to_string(&cli.schema) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("emc: error: {}: {}", cli.schema.display(), e);
            std::process::exit(2);
        }
    };
    let mut state = match CompilationState::from_source(&source) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("emc: error: {}: {}", cli.schema.display(), e);
            std::process::exit(2);
        }
    };
    log::debug!("loaded {} providers", state.manifest.providers.len());

    let text = match cli.emit {
        EmitStage::BuildInfo => match &state.provenance {
            Some(p) => p.to_json(),
            None => {
                eprintln!("emc: error: no provenance recorded");
                std::process::exit(1);
            }
        },
        EmitStage::Plan | EmitStage::Header => {
            let terminal = match cli.emit {
                EmitStage::Plan => PassId::Plan,
                _ => PassId::Render,
            };
            let options = cli.render_options();
            let result = run_pipeline(&mut state, terminal, &options, |_, diags| {
                for d in diags {
                    eprintln!("emc: {}", d);
                }
            });
            if let Err(e) = result {
                eprintln!("emc: error: {}", e);
                std::process::exit(1);
            }
            let text = match cli.emit {
                EmitStage::Plan => state
                    .plan
                    .as_ref()
                    .map(|plan| serde_json::to_string_pretty(plan).map(|mut s| {
                        s.push('\n');
                        s
                    })),
                _ => state.generated.take().map(Ok),
            };
            match text {
                Some(Ok(text)) => text,
                Some(Err(e)) => {
                    eprintln!("emc: error: {}", e);
                    std::process::exit(1);
                }
                None => {
                    eprintln!("emc: error: nothing generated");
                    std::process::exit(1);
                }
            }
        }
    };

    if let Err(e) = write_output(cli.output.as_ref(), &text) {
        let target = cli
            .output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".to_string());
        eprintln!("emc: error: {}: {}", target, e);
        std::process::exit(2);
    }
}
