use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use articlestore_core::config::{StoreConfig, load_config};
use articlestore_core::filename::excerpt;
use articlestore_core::logging::init_logging;
use articlestore_core::maintenance::{
    BatchOptions, SanitizeOptions, SanitizeReport, StampReport, run_batch, sanitize_all,
    stamp_all,
};
use articlestore_core::runtime::{
    InitOptions, PathOverrides, ResolutionContext, ResolvedPaths, ensure_store_ready, init_layout,
    inspect_runtime, resolve_paths,
};
use articlestore_core::store::{ArticleStore, SkippedFile, WriteOutcome};
use clap::{Args, CommandFactory, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "articlestore",
    version,
    about = "Manage a directory of JSON article records keyed by normalized title"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH", help = "Article store directory")]
    store_dir: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    store_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            store_dir: cli.store_dir.clone(),
            config: cli.config.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

/// Paths and store opened for one command.
struct Session {
    paths: ResolvedPaths,
    store: ArticleStore,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Create the article store and default config")]
    Init(InitArgs),
    #[command(about = "Show resolved paths, config, and store counts")]
    Status,
    #[command(about = "Rename record files to their normalized names")]
    Sanitize(SanitizeArgs),
    #[command(about = "Refresh last_modified and fill in missing created_at")]
    Stamp,
    #[command(about = "Sanitize, then stamp, then optionally add and edit a sample article")]
    Batch(BatchArgs),
    #[command(about = "Add a new article")]
    Add(AddArgs),
    #[command(about = "Update an article, renaming it when the title changes")]
    Edit(EditArgs),
    #[command(about = "Print one article as JSON")]
    Show(ShowArgs),
    #[command(about = "List stored articles")]
    List(ListArgs),
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing config file")]
    force: bool,
    #[arg(long, help = "Skip writing .articlestore/config.toml")]
    no_config: bool,
}

#[derive(Debug, Args)]
struct SanitizeArgs {
    #[arg(long, help = "Report planned renames without touching files")]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct BatchArgs {
    #[arg(long, help = "Only report planned renames; skip stamping and the demo")]
    dry_run: bool,
    #[arg(long, help = "Add \"New Article\" and retitle it to \"Updated Article\"")]
    demo: bool,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct ContentArgs {
    #[arg(long, value_name = "TEXT")]
    content: Option<String>,
    #[arg(long, value_name = "PATH", help = "Read article content from a file")]
    content_file: Option<PathBuf>,
}

impl ContentArgs {
    fn resolve(self) -> Result<String> {
        match (self.content, self.content_file) {
            (Some(content), _) => Ok(content),
            (None, Some(path)) => fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display())),
            (None, None) => bail!("either --content or --content-file is required"),
        }
    }
}

#[derive(Debug, Args)]
struct AddArgs {
    title: String,
    #[command(flatten)]
    content: ContentArgs,
}

#[derive(Debug, Args)]
struct EditArgs {
    original_title: String,
    new_title: String,
    #[command(flatten)]
    content: ContentArgs,
}

#[derive(Debug, Args)]
struct ShowArgs {
    title: String,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long, default_value_t = 20, help = "Words of content to show per article")]
    words: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Init(args)) => run_init(&runtime, args),
        Some(Commands::Status) => run_status(&runtime),
        Some(Commands::Sanitize(args)) => run_sanitize(&runtime, args),
        Some(Commands::Stamp) => run_stamp(&runtime),
        Some(Commands::Batch(args)) => run_batch_command(&runtime, args),
        Some(Commands::Add(args)) => run_add(&runtime, args),
        Some(Commands::Edit(args)) => run_edit(&runtime, args),
        Some(Commands::Show(args)) => run_show(&runtime, args),
        Some(Commands::List(args)) => run_list(&runtime, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let report = init_layout(
        &paths,
        &InitOptions {
            materialize_config: !args.no_config,
            force: args.force,
        },
    )?;
    load_runtime_config(&paths)?;
    log::info!(
        "event=init status=ok store_dir={} created_dirs={} wrote_config={}",
        normalize_path(&paths.store_dir),
        report.created_dirs.len(),
        report.wrote_config
    );

    println!("Initialized article store layout");
    println!("project_root: {}", normalize_path(&paths.project_root));
    println!("store_dir: {}", normalize_path(&paths.store_dir));
    println!("config_path: {}", normalize_path(&paths.config_path));
    println!("created_dirs: {}", report.created_dirs.len());
    println!("wrote_config: {}", report.wrote_config);
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_status(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_runtime_config(&paths)?;
    let status = inspect_runtime(&paths)?;

    println!("runtime status");
    println!("project_root: {}", normalize_path(&paths.project_root));
    println!(
        "project_root_exists: {}",
        format_flag(status.project_root_exists)
    );
    println!("store_dir: {}", normalize_path(&paths.store_dir));
    println!("store_dir_exists: {}", format_flag(status.store_dir_exists));
    println!("state_dir_exists: {}", format_flag(status.state_dir_exists));
    println!("config_exists: {}", format_flag(status.config_exists));
    println!("conflict_check: {}", config.conflict_check()?.as_str());
    println!("log_level: {}", config.log_level());
    println!(
        "record_files: {}",
        status
            .record_files
            .map(|count| count.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!(
        "malformed_files: {}",
        status
            .malformed_files
            .map(|count| count.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    if !status.warnings.is_empty() {
        println!("warnings:");
        for warning in &status.warnings {
            println!("  - {warning}");
        }
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_sanitize(runtime: &RuntimeOptions, args: SanitizeArgs) -> Result<()> {
    let session = open_session(runtime)?;
    let report = sanitize_all(
        &session.store,
        &SanitizeOptions {
            dry_run: args.dry_run,
        },
    )?;

    println!("sanitize");
    println!("store_dir: {}", normalize_path(&session.paths.store_dir));
    print_sanitize_report("sanitize", &report);
    print_diagnostics(runtime, &session.paths);
    Ok(())
}

fn run_stamp(runtime: &RuntimeOptions) -> Result<()> {
    let session = open_session(runtime)?;
    let report = stamp_all(&session.store)?;

    println!("stamp");
    println!("store_dir: {}", normalize_path(&session.paths.store_dir));
    print_stamp_report("stamp", &report);
    print_diagnostics(runtime, &session.paths);
    Ok(())
}

fn run_batch_command(runtime: &RuntimeOptions, args: BatchArgs) -> Result<()> {
    let session = open_session(runtime)?;
    let report = run_batch(
        &session.store,
        &BatchOptions {
            sanitize: SanitizeOptions {
                dry_run: args.dry_run,
            },
            demo: args.demo,
        },
    )?;

    println!("batch");
    println!("store_dir: {}", normalize_path(&session.paths.store_dir));
    print_sanitize_report("sanitize", &report.sanitize);
    match &report.stamp {
        Some(stamp) => print_stamp_report("stamp", stamp),
        None => println!("stamp: <skipped>"),
    }
    match &report.demo {
        Some(demo) => {
            print_outcome("demo.add", &demo.add);
            print_outcome("demo.edit", &demo.edit);
        }
        None => println!("demo: <skipped>"),
    }
    print_diagnostics(runtime, &session.paths);
    Ok(())
}

fn run_add(runtime: &RuntimeOptions, args: AddArgs) -> Result<()> {
    let session = open_session(runtime)?;
    let content = args.content.resolve()?;
    let outcome = session.store.add(&args.title, &content)?;

    println!("add");
    println!("title: {}", args.title);
    print_outcome("result", &outcome);
    print_diagnostics(runtime, &session.paths);
    fail_unless_written(&outcome)
}

fn run_edit(runtime: &RuntimeOptions, args: EditArgs) -> Result<()> {
    let session = open_session(runtime)?;
    let content = args.content.resolve()?;
    let outcome = session
        .store
        .edit(&args.original_title, &args.new_title, &content)?;

    println!("edit");
    println!("original_title: {}", args.original_title);
    println!("new_title: {}", args.new_title);
    print_outcome("result", &outcome);
    print_diagnostics(runtime, &session.paths);
    fail_unless_written(&outcome)
}

fn run_show(runtime: &RuntimeOptions, args: ShowArgs) -> Result<()> {
    let session = open_session(runtime)?;
    match session.store.get(&args.title)? {
        Some(article) => {
            println!("{}", serde_json::to_string_pretty(&article)?);
            Ok(())
        }
        None => bail!("article not found: {}", args.title),
    }
}

fn run_list(runtime: &RuntimeOptions, args: ListArgs) -> Result<()> {
    let session = open_session(runtime)?;
    let report = session.store.list()?;

    println!("list");
    println!("store_dir: {}", normalize_path(&session.paths.store_dir));
    println!("articles.count: {}", report.articles.len());
    for article in &report.articles {
        println!("article.key: {}", article.key);
        println!("  title: {}", article.record.title);
        println!(
            "  created_at: {}",
            format_optional(article.record.created_at.as_deref())
        );
        println!(
            "  last_modified: {}",
            format_optional(article.record.last_modified.as_deref())
        );
        println!("  excerpt: {}", excerpt(&article.record.content, args.words));
    }
    print_skipped("list", &report.skipped);
    print_diagnostics(runtime, &session.paths);
    Ok(())
}

fn print_sanitize_report(prefix: &str, report: &SanitizeReport) {
    println!("{prefix}.dry_run: {}", report.dry_run);
    println!("{prefix}.scanned: {}", report.scanned);
    println!("{prefix}.renames: {}", report.renames.len());
    for rename in &report.renames {
        let note = if rename.replaced_existing {
            " (replaced existing file)"
        } else {
            ""
        };
        println!("{prefix}.rename: {} -> {}{note}", rename.from, rename.to);
    }
}

fn print_stamp_report(prefix: &str, report: &StampReport) {
    println!("{prefix}.stamped: {}", report.stamped.len());
    for file in &report.stamped {
        if file.added_created_at {
            println!("{prefix}.file: {} (created_at added)", file.key);
        } else {
            println!("{prefix}.file: {}", file.key);
        }
    }
    print_skipped(prefix, &report.skipped);
}

fn print_skipped(prefix: &str, skipped: &[SkippedFile]) {
    println!("{prefix}.skipped: {}", skipped.len());
    for file in skipped {
        println!("{prefix}.skipped.file: {} ({})", file.key, file.reason);
    }
}

fn print_outcome(prefix: &str, outcome: &WriteOutcome) {
    match outcome {
        WriteOutcome::Written {
            key,
            previous_key: Some(previous),
        } => println!("{prefix}: written {key} (renamed from {previous})"),
        WriteOutcome::Written {
            key,
            previous_key: None,
        } => println!("{prefix}: written {key}"),
        WriteOutcome::Conflict { title, key } => {
            println!("{prefix}: conflict (an article with the title '{title}' already exists as {key})")
        }
        WriteOutcome::NotFound { title, key } => {
            println!("{prefix}: not found (no article '{title}' at {key})")
        }
    }
}

fn fail_unless_written(outcome: &WriteOutcome) -> Result<()> {
    match outcome {
        WriteOutcome::Written { .. } => Ok(()),
        WriteOutcome::Conflict { title, .. } => {
            bail!("conflict: an article with the title '{title}' already exists")
        }
        WriteOutcome::NotFound { title, .. } => bail!("article not found: {title}"),
    }
}

fn open_session(runtime: &RuntimeOptions) -> Result<Session> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_runtime_config(&paths)?;
    let status = inspect_runtime(&paths)?;
    ensure_store_ready(&paths, &status)?;

    let store = ArticleStore::new(&paths.store_dir).with_conflict_check(config.conflict_check()?);
    Ok(Session { paths, store })
}

fn load_runtime_config(paths: &ResolvedPaths) -> Result<StoreConfig> {
    let config = load_config(&paths.config_path)?;
    init_logging(&config.log_level())?;
    log::debug!(
        "event=config_loaded path={} conflict_check={}",
        normalize_path(&paths.config_path),
        config.conflict_check()?.as_str()
    );
    Ok(config)
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        store_dir: runtime.store_dir.clone(),
        config: runtime.config.clone(),
    };

    let initial = resolve_paths(&context, &overrides)?;
    let project_env = initial.project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
    }

    resolve_paths(&context, &overrides)
}

fn print_diagnostics(runtime: &RuntimeOptions, paths: &ResolvedPaths) {
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_optional(value: Option<&str>) -> &str {
    value.unwrap_or("<unset>")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
