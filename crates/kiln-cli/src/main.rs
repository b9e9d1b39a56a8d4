use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use kiln_core::{
    BatchContext, BatchOutcome, BuildConfig, BuildTarget, Diagnostic, FileSet, HostArtifact,
    InlineCompiler, OutputStyle, Severity, SourceFile,
};

/// kiln - incremental batch compiler for Sass stylesheets
#[derive(Parser, Debug, Clone)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input files or directories to compile
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to kiln.json configuration file
    #[arg(short, long, value_name = "FILE")]
    project: Option<PathBuf>,

    /// Output directory for compiled stylesheets
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Directory searched when resolving imports (repeatable)
    #[arg(long = "include-path", value_name = "DIR")]
    include_paths: Vec<PathBuf>,

    /// Output style (expanded, compact)
    #[arg(long, value_name = "STYLE")]
    style: Option<OutputStyle>,

    /// Generate source maps
    #[arg(long)]
    source_map: bool,

    /// Build target to compile entries for (client, server, neutral)
    #[arg(long, value_name = "TARGET", default_value = "neutral")]
    target: BuildTarget,

    /// Watch input files for changes
    #[arg(short, long)]
    watch: bool,

    /// Initialize a new kiln project
    #[arg(long)]
    init: bool,

    /// Disable the on-disk compile cache
    #[arg(long)]
    no_cache: bool,

    /// Pretty print diagnostics
    #[arg(long, default_value_t = true)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for detailed logs, RUST_LOG=info for normal output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    if cli.init {
        init_project()?;
        return Ok(());
    }

    let config = load_config(&cli)?;

    let roots = if cli.paths.is_empty() {
        vec![std::env::current_dir()?]
    } else {
        cli.paths.clone()
    };

    let files = discover_files(&roots, &config)?;
    if files.is_empty() {
        eprintln!("Error: no stylesheet files found. Use --help for usage information.");
        std::process::exit(1);
    }

    let project_root = std::env::current_dir()?;
    let mut ctx = if cli.no_cache {
        BatchContext::new(config.options.clone())
    } else {
        BatchContext::with_disk_cache(&project_root, config.options.clone())
    };

    if cli.watch {
        watch_mode(&cli, &config, &roots, &mut ctx)
    } else {
        let had_errors = run_once(&cli, &config, &roots, &mut ctx)?;
        if had_errors {
            std::process::exit(1);
        }
        Ok(())
    }
}

/// Initialize a new kiln project with a configuration file and a sample
/// stylesheet.
fn init_project() -> anyhow::Result<()> {
    println!("Initializing new kiln project...");

    BuildConfig::init_file(Path::new("kiln.json"))?;
    println!("Created kiln.json");

    std::fs::create_dir_all("src")?;
    println!("Created src/ directory");

    std::fs::write(
        "src/_base.scss",
        "$accent: #4c6ef5;\n\nbody {\n  margin: 0;\n}\n",
    )?;
    std::fs::write(
        "src/main.scss",
        "@import \"base\";\n\n.banner {\n  color: $accent;\n}\n",
    )?;
    println!("Created src/main.scss and src/_base.scss");

    println!("\nProject initialized successfully!");
    println!("Run 'kiln src' to compile.");

    Ok(())
}

/// Load configuration from --project, `kiln.json` in the current directory,
/// or defaults, then apply CLI overrides.
fn load_config(cli: &Cli) -> anyhow::Result<BuildConfig> {
    let mut config = if let Some(ref project_path) = cli.project {
        BuildConfig::from_file(project_path)
            .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", project_path.display()))?
    } else {
        let default_path = PathBuf::from("kiln.json");
        if default_path.exists() {
            BuildConfig::from_file(&default_path)
                .map_err(|e| anyhow::anyhow!("failed to load kiln.json: {e}"))?
        } else {
            BuildConfig::default()
        }
    };

    // Resolution happens against absolute logical paths, so include paths
    // from the config file and the command line both get absolutized.
    config.options.include_paths = config
        .options
        .include_paths
        .iter()
        .map(|dir| absolute(dir))
        .collect();
    for dir in &cli.include_paths {
        let dir = absolute(dir);
        if !config.options.include_paths.contains(&dir) {
            config.options.include_paths.push(dir);
        }
    }
    if let Some(style) = cli.style {
        config.options.output_style = style;
    }
    if cli.source_map {
        config.options.source_maps = true;
    }

    Ok(config)
}

/// Walk the input roots and collect stylesheet files matching the config's
/// include globs and not matching its exclude globs.
fn discover_files(roots: &[PathBuf], config: &BuildConfig) -> anyhow::Result<Vec<PathBuf>> {
    let include: Vec<glob::Pattern> = compile_patterns(&config.include)?;
    let exclude: Vec<glob::Pattern> = compile_patterns(&config.exclude)?;

    let mut files = Vec::new();
    for root in roots {
        if root.is_file() {
            files.push(absolute(root));
            continue;
        }
        for entry in walkdir::WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(path);
            let matches = |patterns: &[glob::Pattern]| {
                patterns.iter().any(|p| {
                    p.matches_path(relative) || p.matches_path(path)
                })
            };
            if matches(&include) && !matches(&exclude) {
                files.push(absolute(path));
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn compile_patterns(patterns: &[String]) -> anyhow::Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| glob::Pattern::new(p).map_err(|e| anyhow::anyhow!("invalid glob '{p}': {e}")))
        .collect()
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Host convention for build-target tagging: files under a `client/` or
/// `server/` directory are destined for that target; everything else is
/// neutral and participates in every batch.
fn infer_target(path: &Path) -> BuildTarget {
    for component in path.components() {
        match component.as_os_str().to_str() {
            Some("client") => return BuildTarget::Client,
            Some("server") => return BuildTarget::Server,
            _ => {}
        }
    }
    BuildTarget::Neutral
}

/// Read the discovered files into the library's file-set form.
fn build_file_set(files: &[PathBuf]) -> FileSet {
    let mut set = FileSet::new();
    for path in files {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                set.insert(SourceFile::new(
                    path.clone(),
                    content,
                    infer_target(path),
                    true,
                ));
            }
            Err(e) => {
                warn!("skipping unreadable file {}: {e}", path.display());
            }
        }
    }
    set
}

/// Run one batch and write its artifacts. Returns whether any unit failed.
fn run_once(
    cli: &Cli,
    config: &BuildConfig,
    roots: &[PathBuf],
    ctx: &mut BatchContext,
) -> anyhow::Result<bool> {
    let files = discover_files(roots, config)?;
    let set = build_file_set(&files);
    info!("Compiling {} file(s)...", set.len());

    let compiler = InlineCompiler::new();
    let outcome = ctx.run_batch(&set, cli.target, &compiler);
    write_artifacts(cli, &outcome)
}

fn write_artifacts(cli: &Cli, outcome: &BatchOutcome) -> anyhow::Result<bool> {
    let mut had_errors = false;

    for artifact in outcome.artifacts() {
        match artifact {
            HostArtifact::Stylesheet {
                path,
                css,
                source_map,
                watched_paths,
            } => {
                let output_path = determine_output_path(&path, cli);
                if let Some(parent) = output_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&output_path, &css)?;
                info!("Generated: {}", output_path.display());
                debug!(
                    "Watching {} dependency path(s) for {}",
                    watched_paths.len(),
                    path.display()
                );

                if let Some(map) = source_map {
                    let map_path = output_path.with_extension("css.map");
                    std::fs::write(&map_path, map)?;
                    info!("Generated source map: {}", map_path.display());
                }
            }
            HostArtifact::Failure { path, diagnostic } => {
                had_errors = true;
                print_diagnostic(&diagnostic, &path, cli.pretty);
            }
        }
    }

    Ok(had_errors)
}

/// Determine the output file path for a given entry file
fn determine_output_path(entry: &Path, cli: &Cli) -> PathBuf {
    if let Some(out_dir) = &cli.out_dir {
        let file_name = entry
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        out_dir.join(format!("{file_name}.css"))
    } else {
        entry.with_extension("css")
    }
}

fn print_diagnostic(diagnostic: &Diagnostic, entry: &Path, pretty: bool) {
    let severity = match (diagnostic.severity, pretty) {
        (Severity::Error, true) => "\x1b[31merror\x1b[0m",
        (Severity::Warning, true) => "\x1b[33mwarning\x1b[0m",
        (Severity::Error, false) => "error",
        (Severity::Warning, false) => "warning",
    };
    let file = diagnostic
        .file
        .as_deref()
        .unwrap_or(entry)
        .display()
        .to_string();
    let position = match (diagnostic.line, diagnostic.column) {
        (Some(line), Some(column)) => format!(":{line}:{column}"),
        (Some(line), None) => format!(":{line}"),
        _ => String::new(),
    };

    if pretty {
        eprintln!("\n{severity} [{file}{position}]: {}", diagnostic.message);
        eprintln!("  while compiling {}", entry.display());
    } else {
        eprintln!("{file}{position}: {severity}: {}", diagnostic.message);
    }
}

/// Watch mode - recompile on file changes
fn watch_mode(
    cli: &Cli,
    config: &BuildConfig,
    roots: &[PathBuf],
    ctx: &mut BatchContext,
) -> anyhow::Result<()> {
    use notify::{Event, EventKind, RecursiveMode, Watcher};
    use std::sync::mpsc::channel;
    use std::time::Duration;

    println!("Watching for changes... (Press Ctrl+C to stop)");

    println!("\nInitial compilation:");
    let _ = run_once(cli, config, roots, ctx)?;

    let (tx, rx) = channel();
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;

    for root in roots {
        let dir = if root.is_file() {
            root.parent().map(Path::to_path_buf).unwrap_or_else(|| root.clone())
        } else {
            root.clone()
        };
        watcher.watch(&dir, RecursiveMode::Recursive)?;
    }

    let mut last_compile = std::time::Instant::now();
    let debounce_duration = Duration::from_millis(100);

    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                let relevant = matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                ) && event.paths.iter().any(is_stylesheet);

                if relevant {
                    let now = std::time::Instant::now();
                    if now.duration_since(last_compile) >= debounce_duration {
                        println!("\nFile changed, recompiling...");
                        let _ = run_once(cli, config, roots, ctx)?;
                        last_compile = now;
                    }
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                return Err(anyhow::anyhow!("file watcher disconnected"));
            }
        }
    }
}

fn is_stylesheet(path: &PathBuf) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("scss") | Some("sass")
    )
}
