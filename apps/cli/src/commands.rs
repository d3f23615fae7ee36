//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docbundle_core::pipeline::{BuildResult, ProgressReporter};
use docbundle_core::{CheckReport, build_bundle, check_site, check_sources};
use docbundle_shared::{
    AppConfig, BuildConfig, LinkStyle, MAX_TOC_DEPTH, Severity, TocEntry, init_config,
    load_config, load_config_from, parse_emit_list,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docbundle — turn a folder of guides into one navigable bundle.
#[derive(Parser)]
#[command(
    name = "docbundle",
    version,
    about = "Build documentation guides into a static site and a combined Markdown bundle.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.docbundle/docbundle.toml.
    #[arg(long, global = true, env = "DOCBUNDLE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the bundle from a directory of guides.
    Build {
        /// Directory containing the guide sources.
        #[arg(long)]
        src: Option<PathBuf>,

        /// Output directory.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Outputs to emit (comma-separated: html, markdown).
        #[arg(long)]
        emit: Option<String>,

        /// Bundle title.
        #[arg(long)]
        title: Option<String>,

        /// Fail on warnings as well as errors.
        #[arg(long)]
        strict: bool,
    },

    /// Print the table of contents.
    Toc {
        /// Directory containing the guide sources.
        #[arg(long)]
        src: Option<PathBuf>,

        /// Print `toc.json` instead of an outline.
        #[arg(long)]
        json: bool,

        /// Deepest heading level to include.
        #[arg(long)]
        depth: Option<u8>,
    },

    /// Check guides (and optionally an emitted site) for broken structure.
    Check {
        /// Directory containing the guide sources.
        #[arg(long)]
        src: Option<PathBuf>,

        /// Emitted site directory whose links should be verified.
        #[arg(long)]
        site: Option<PathBuf>,

        /// Fail on warnings as well as errors.
        #[arg(long)]
        strict: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docbundle=warn",
        1 => "docbundle=info",
        2 => "docbundle=debug",
        _ => "docbundle=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Build {
            src,
            out,
            emit,
            title,
            strict,
        } => {
            let overrides = Overrides {
                src,
                out,
                emit,
                title,
                strict,
                depth: None,
            };
            cmd_build(config_path, &overrides)
        }
        Command::Toc { src, json, depth } => {
            let overrides = Overrides {
                src,
                depth,
                ..Overrides::default()
            };
            cmd_toc(config_path, &overrides, json)
        }
        Command::Check { src, site, strict } => {
            let overrides = Overrides {
                src,
                strict,
                ..Overrides::default()
            };
            cmd_check(config_path, &overrides, site.as_deref())
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Config resolution
// ---------------------------------------------------------------------------

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
struct Overrides {
    src: Option<PathBuf>,
    out: Option<PathBuf>,
    emit: Option<String>,
    title: Option<String>,
    strict: bool,
    depth: Option<u8>,
}

fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

/// Merge CLI flags over the loaded config.
fn resolve_build_config(app: &AppConfig, overrides: &Overrides) -> Result<BuildConfig> {
    let mut config = BuildConfig::from(app);

    if let Some(src) = &overrides.src {
        config.source_dir = src.clone();
    }
    if let Some(out) = &overrides.out {
        config.output_dir = out.clone();
    }
    if let Some(emit) = &overrides.emit {
        config.emit = parse_emit_list(emit)?;
    }
    if let Some(title) = &overrides.title {
        config.title = title.clone();
    }
    if let Some(depth) = overrides.depth {
        if depth == 0 || depth > MAX_TOC_DEPTH {
            return Err(eyre!("--depth must be between 1 and {MAX_TOC_DEPTH}"));
        }
        config.toc_depth = depth;
    }
    config.strict |= overrides.strict;
    config.tool_version = env!("CARGO_PKG_VERSION").to_string();

    Ok(config)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn guide_parsed(&self, source: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Parsing [{current}/{total}] {source}"));
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_build(config_path: Option<&Path>, overrides: &Overrides) -> Result<()> {
    let app = load_app_config(config_path)?;
    let config = resolve_build_config(&app, overrides)?;

    info!(
        src = %config.source_dir.display(),
        out = %config.output_dir.display(),
        strict = config.strict,
        "building bundle"
    );

    let result = {
        let reporter = CliProgress::new();
        build_bundle(&config, &reporter)?
    };

    print_diagnostics(&result.report);

    let diff = &result.diff;
    println!();
    println!("  Bundle built successfully!");
    println!("  Title:     {}", config.title);
    println!("  Guides:    {}", result.guide_count);
    println!("  Chapters:  {}", result.chapter_count);
    println!(
        "  Changes:   {} added, {} changed, {} removed",
        diff.added.len(),
        diff.changed.len(),
        diff.removed.len()
    );
    println!(
        "  Files:     {} written, {} unchanged, {} pruned",
        result.written.len(),
        result.unchanged.len(),
        result.pruned.len()
    );
    println!("  Path:      {}", result.output_dir.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_toc(config_path: Option<&Path>, overrides: &Overrides, json: bool) -> Result<()> {
    let app = load_app_config(config_path)?;
    let config = resolve_build_config(&app, overrides)?;
    let (_, toc, _) = check_sources(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&toc)?);
        return Ok(());
    }

    let mut outline = String::new();
    for entry in &toc.entries {
        push_outline(&mut outline, entry, 0);
    }
    print!("{outline}");
    Ok(())
}

fn push_outline(out: &mut String, entry: &TocEntry, depth: usize) {
    out.push_str(&format!(
        "{}- {} ({})\n",
        "  ".repeat(depth),
        entry.title,
        entry.href(LinkStyle::Site)
    ));
    for child in &entry.children {
        push_outline(out, child, depth + 1);
    }
}

fn cmd_check(config_path: Option<&Path>, overrides: &Overrides, site: Option<&Path>) -> Result<()> {
    let app = load_app_config(config_path)?;
    let config = resolve_build_config(&app, overrides)?;

    let (loaded, _, mut report) = check_sources(&config)?;
    if let Some(dir) = site {
        info!(site = %dir.display(), "checking emitted site");
        report.extend(check_site(dir)?.diagnostics);
    }

    print_diagnostics(&report);

    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);
    println!(
        "Checked {} guides: {errors} error(s), {warnings} warning(s)",
        loaded.bundle.guides.len()
    );

    if report.has_errors(config.strict) {
        return Err(eyre!(
            "check failed{}",
            if config.strict && errors == 0 {
                " (warnings are errors in strict mode)"
            } else {
                ""
            }
        ));
    }
    Ok(())
}

fn print_diagnostics(report: &CheckReport) {
    for diagnostic in report.sorted() {
        eprintln!("{diagnostic}");
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_app_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
