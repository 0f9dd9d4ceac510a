//! CLI command definitions, routing, and tracing setup.

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use promptsieve_backend::{Backend, BridgeBackend, BridgeOptions, OllamaBackend, OllamaOptions};
use promptsieve_core::{AgentKind, RunOutput, RunProgress};
use promptsieve_shared::{
    AppConfig, BackendKind, OnError, ReferenceList, Subject, init_config, load_config,
    load_config_from,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// PromptSieve: classify long content with a language model, chunk by chunk.
#[derive(Parser)]
#[command(
    name = "promptsieve",
    version,
    about = "Run prompt-based classification agents over text and URL lists.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.promptsieve/promptsieve.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend to send prompts to (overrides `[defaults] backend`).
    #[arg(long, global = true)]
    pub backend: Option<BackendArg>,

    /// Ollama model (overrides `[ollama] model`).
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Ollama host URL (overrides `[ollama] host`).
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Result format: text (one result per line) or json.
    #[arg(long, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Result output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Backend selection.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum BackendArg {
    Ollama,
    Bridge,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Ollama => BackendKind::Ollama,
            BackendArg::Bridge => BackendKind::Bridge,
        }
    }
}

/// Where the subject comes from. With none of these, stdin is read.
#[derive(Args, Debug)]
pub(crate) struct InputArgs {
    /// Content given inline.
    #[arg(long, conflicts_with = "file")]
    pub text: Option<String>,

    /// Read content from a file.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Treat the input as JSON: a string, or a list of strings.
    #[arg(long)]
    pub json_input: bool,
}

/// Per-run amendments and overrides.
#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    /// Extra directions appended to the agent's task.
    #[arg(long)]
    pub task_extra: Option<String>,

    /// Extra content appended to the subject.
    #[arg(long)]
    pub content_extra: Option<String>,

    /// Chunk size in characters for word-packing agents.
    #[arg(long, allow_negative_numbers = true)]
    pub chunk_size: Option<i64>,

    /// Failure policy: propagate or sentinel.
    #[arg(long)]
    pub on_error: Option<OnError>,

    /// Text recorded in place of a failed result.
    #[arg(long)]
    pub sentinel: Option<String>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Flag forbidden content, chunk by chunk.
    Guard {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        run: RunArgs,
    },

    /// Match content against a list of career titles.
    Tags {
        #[command(flatten)]
        input: InputArgs,

        /// Career titles (comma-separated).
        #[arg(long, value_delimiter = ',', conflicts_with = "careers_file")]
        careers: Vec<String>,

        /// JSON file holding a list of career titles.
        #[arg(long)]
        careers_file: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Flag forbidden URLs in one call.
    Urls {
        /// URLs to scan. Without any, one URL per line is read from the input.
        #[arg(conflicts_with_all = ["text", "file"])]
        urls: Vec<String>,

        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Judge whether content is complete.
    Validate {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        run: RunArgs,
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

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "promptsieve=info",
        1 => "promptsieve=debug",
        _ => "promptsieve=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
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

/// Global flags that outlive the subcommand match.
struct Context {
    config_path: Option<PathBuf>,
    backend: Option<BackendArg>,
    model: Option<String>,
    host: Option<String>,
    output: OutputFormat,
}

impl Context {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            config_path: cli.config.clone(),
            backend: cli.backend,
            model: cli.model.clone(),
            host: cli.host.clone(),
            output: cli.output,
        }
    }

    fn load_config(&self) -> Result<AppConfig> {
        let config = match &self.config_path {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };
        Ok(config)
    }

    fn build_backend(&self, config: &AppConfig) -> Result<Box<dyn Backend>> {
        let kind = self
            .backend
            .map(BackendKind::from)
            .unwrap_or(config.defaults.backend);

        match kind {
            BackendKind::Ollama => {
                let mut opts = OllamaOptions::from(&config.ollama);
                if let Some(model) = &self.model {
                    opts.model = model.clone();
                }
                if let Some(host) = &self.host {
                    opts.host = host.clone();
                }
                let backend = OllamaBackend::new(&opts)?;
                info!(host = %opts.host, model = backend.model(), "using ollama backend");
                Ok(Box::new(backend))
            }
            BackendKind::Bridge => Ok(Box::new(BridgeBackend::spawn(&BridgeOptions::from(
                &config.bridge,
            ))?)),
        }
    }
}

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let ctx = Context::from_cli(&cli);

    match cli.command {
        Command::Guard { input, run } => {
            let subject = read_subject(AgentKind::ContentGuard, &input)?;
            cmd_agent(&ctx, AgentKind::ContentGuard, subject, None, &run)
        }
        Command::Tags {
            input,
            careers,
            careers_file,
            run,
        } => {
            let subject = read_subject(AgentKind::TagGenerator, &input)?;
            let reference = read_careers(careers, careers_file.as_deref())?;
            cmd_agent(&ctx, AgentKind::TagGenerator, subject, Some(reference), &run)
        }
        Command::Urls { urls, input, run } => {
            let subject = read_urls(urls, &input)?;
            cmd_agent(&ctx, AgentKind::UrlFilter, subject, None, &run)
        }
        Command::Validate { input, run } => {
            let subject = read_subject(AgentKind::ContentValidator, &input)?;
            cmd_agent(&ctx, AgentKind::ContentValidator, subject, None, &run)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&ctx),
        },
    }
}

// ---------------------------------------------------------------------------
// Agent runs
// ---------------------------------------------------------------------------

fn cmd_agent(
    ctx: &Context,
    kind: AgentKind,
    subject: Subject,
    reference: Option<ReferenceList>,
    args: &RunArgs,
) -> Result<()> {
    let config = ctx.load_config()?;

    let mut settings = kind.settings(&config)?;
    if let Some(raw) = args.chunk_size {
        settings = settings.with_chunk_size(raw)?;
    }
    let settings = settings.with_on_error(args.on_error, args.sentinel.clone());

    let mut pipeline = kind.pipeline(settings, subject, reference)?;
    if let Some(extra) = &args.task_extra {
        pipeline.amend_instruction(extra);
    }
    if let Some(extra) = &args.content_extra {
        pipeline.amend_subject(extra);
    }
    pipeline.validate()?;
    info!(
        agent = pipeline.name(),
        chunking = %pipeline.chunking().label(),
        policy = pipeline.failure_policy().label(),
        careers = pipeline.reference_list().map_or(0, |r| r.items().len()),
        "pipeline ready"
    );

    let backend = ctx.build_backend(&config)?;
    info!(agent = %kind, backend = backend.name(), "running agent");

    let progress = CliProgress::new();
    let result = pipeline.run_with_progress(&backend, &progress);
    progress.clear();
    let output = result.wrap_err_with(|| format!("{kind} run failed"))?;

    print_output(&output, ctx.output)
}

fn print_output(output: &RunOutput, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for text in output.texts() {
                println!("{text}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(output)?),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Input loading
// ---------------------------------------------------------------------------

fn read_input(input: &InputArgs) -> Result<String> {
    if let Some(text) = &input.text {
        return Ok(text.clone());
    }
    if let Some(path) = &input.file {
        return read_file(path);
    }

    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(eyre!(
            "no input: pass --text, --file, or pipe content on stdin"
        ));
    }
    let mut buf = String::new();
    stdin
        .read_to_string(&mut buf)
        .wrap_err("failed to read stdin")?;
    Ok(buf)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {}", path.display()))
}

fn parse_json(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).wrap_err("input is not valid JSON")
}

fn read_subject(kind: AgentKind, input: &InputArgs) -> Result<Subject> {
    let raw = read_input(input)?;
    let subject = if input.json_input {
        Subject::from_json(kind.subject_field(), &parse_json(&raw)?)?
    } else {
        Subject::text(raw)?
    };
    Ok(subject)
}

fn read_urls(urls: Vec<String>, input: &InputArgs) -> Result<Subject> {
    let field = AgentKind::UrlFilter.subject_field();
    if !urls.is_empty() {
        return Ok(Subject::list(field, urls)?);
    }

    let raw = read_input(input)?;
    let subject = if input.json_input {
        Subject::from_json(field, &parse_json(&raw)?)?
    } else {
        Subject::list(field, url_lines(&raw))?
    };
    Ok(subject)
}

/// One URL per non-blank line.
fn url_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn read_careers(careers: Vec<String>, careers_file: Option<&Path>) -> Result<ReferenceList> {
    let list = match careers_file {
        Some(path) => {
            let value = parse_json(&read_file(path)?)?;
            ReferenceList::from_json("career_list", &value)?
        }
        None => ReferenceList::new(
            "career_list",
            careers.into_iter().map(|c| c.trim().to_string()).collect(),
        )?,
    };
    Ok(list)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
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

    fn clear(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl RunProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn unit_started(&self, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Waiting for backend [{current}/{total}]"));
    }

    fn unit_failed(&self, index: usize, reason: &str) {
        self.spinner
            .println(format!("  unit {index} failed: {reason}"));
    }

    fn finished(&self, _output: &RunOutput) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");

    println!("# Effective agent settings");
    for kind in AgentKind::ALL {
        match kind.settings(&config) {
            Ok(settings) => println!(
                "# {kind}: chunking={}, on_error={}",
                settings.chunking.label(),
                settings.on_failure.label()
            ),
            Err(e) => println!("# {kind}: invalid ({e})"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn guard_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "promptsieve",
            "guard",
            "--text",
            "hello",
            "--chunk-size",
            "50",
            "--on-error",
            "propagate",
            "--output",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Command::Guard { input, run } => {
                assert_eq!(input.text.as_deref(), Some("hello"));
                assert_eq!(run.chunk_size, Some(50));
                assert_eq!(run.on_error, Some(OnError::Propagate));
            }
            _ => panic!("expected guard"),
        }
    }

    #[test]
    fn negative_chunk_size_parses_for_validation() {
        let cli =
            Cli::try_parse_from(["promptsieve", "guard", "--text", "x", "--chunk-size", "-1"])
                .unwrap();
        match cli.command {
            Command::Guard { run, .. } => assert_eq!(run.chunk_size, Some(-1)),
            _ => panic!("expected guard"),
        }
    }

    #[test]
    fn unknown_on_error_is_rejected() {
        let result =
            Cli::try_parse_from(["promptsieve", "validate", "--text", "x", "--on-error", "retry"]);
        assert!(result.is_err());
    }

    #[test]
    fn careers_split_on_commas() {
        let cli = Cli::try_parse_from([
            "promptsieve",
            "tags",
            "--text",
            "apis",
            "--careers",
            "Backend Developer, Data Scientist",
        ])
        .unwrap();
        match cli.command {
            Command::Tags { careers, .. } => {
                let list = read_careers(careers, None).unwrap();
                assert_eq!(list.items(), ["Backend Developer", "Data Scientist"]);
            }
            _ => panic!("expected tags"),
        }
    }

    #[test]
    fn urls_positional() {
        let cli = Cli::try_parse_from([
            "promptsieve",
            "urls",
            "http://a.example",
            "http://b.example",
        ])
        .unwrap();
        match cli.command {
            Command::Urls { urls, input, .. } => {
                let subject = read_urls(urls, &input).unwrap();
                assert_eq!(subject.render(), "http://a.example, http://b.example");
            }
            _ => panic!("expected urls"),
        }
    }

    #[test]
    fn url_lines_skip_blanks() {
        assert_eq!(
            url_lines("http://a.example\n\n  http://b.example  \n"),
            vec!["http://a.example", "http://b.example"]
        );
    }

    #[test]
    fn json_subject_rejects_non_strings() {
        let input = InputArgs {
            text: Some(r#"["ok", 3]"#.into()),
            file: None,
            json_input: true,
        };
        let err = read_subject(AgentKind::ContentGuard, &input).unwrap_err();
        assert!(err.to_string().contains("list of strings"));
    }
}
