use std::cmp;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use atty::Stream;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tilawa_search::{
    CatalogSnapshot, EngineConfig, EntityRecord, RankedResult, Script, SearchEngine,
    SearchOptions, normalize, normalize_text,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tilawa-search",
    about = "Search reciters, chapters and terms in Arabic or Latin script",
    version
)]
pub struct Cli {
    /// Catalog JSON file. Files ending in `.zst` are zstd-decompressed first.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Engine configuration (JSON) with ranking weights and cache size.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank catalog entities against a query.
    Search {
        /// Query text; multiple words are joined with spaces.
        #[arg(required = true)]
        query: Vec<String>,
        /// Maximum number of results to return.
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Drop matches scoring below this floor (0..1).
        #[arg(long, default_value_t = tilawa_search::search::DEFAULT_MIN_SCORE)]
        min_score: f64,
        /// Disable prefix, substring and token matching.
        #[arg(long)]
        no_partial: bool,
        /// Disable initials matching.
        #[arg(long)]
        no_initials: bool,
        /// Only match fields written in the query's own script.
        #[arg(long)]
        no_bilingual: bool,
    },
    /// Autocomplete entities for partial input.
    Suggest {
        partial: String,
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// Show one entity by id.
    Show { id: String },
    /// List canonical names that start with a prefix.
    Complete {
        prefix: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Print the canonical form of some text.
    Normalize {
        #[arg(required = true)]
        text: Vec<String>,
        /// Force a script instead of detecting it.
        #[arg(long, value_enum)]
        script: Option<ScriptArg>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ScriptArg {
    Arabic,
    Latin,
    Mixed,
}

impl From<ScriptArg> for Script {
    fn from(arg: ScriptArg) -> Self {
        match arg {
            ScriptArg::Arabic => Script::Arabic,
            ScriptArg::Latin => Script::Latin,
            ScriptArg::Mixed => Script::Mixed,
        }
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    let catalog = cli.catalog.as_deref();
    let config = cli.config.as_deref();
    match cli.command {
        Command::Search {
            query,
            limit,
            min_score,
            no_partial,
            no_initials,
            no_bilingual,
        } => {
            let options = SearchOptions {
                limit: cmp::max(1, limit),
                min_score,
                include_partial: !no_partial,
                include_initials: !no_initials,
                bilingual: !no_bilingual,
            };
            let engine = build_engine(catalog, config)?;
            handle_search(&engine, &query.join(" "), &options, cli.json)
        }
        Command::Suggest { partial, limit } => {
            let engine = build_engine(catalog, config)?;
            handle_suggest(&engine, &partial, cmp::max(1, limit), cli.json)
        }
        Command::Show { id } => handle_show(&build_engine(catalog, config)?, &id, cli.json),
        Command::Complete { prefix, limit } => {
            let engine = build_engine(catalog, config)?;
            handle_complete(&engine, &prefix, cmp::max(1, limit), cli.json)
        }
        Command::Normalize { text, script } => handle_normalize(&text.join(" "), script, cli.json),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_engine(
    catalog: Option<&Path>,
    config: Option<&Path>,
) -> Result<SearchEngine, Box<dyn Error>> {
    let catalog = catalog.ok_or("this command needs --catalog <FILE>")?;
    let config = match config {
        Some(path) => {
            let raw = fs::read(path)
                .map_err(|err| format!("Failed to read config {}: {err}", path.display()))?;
            let config = serde_json::from_slice::<EngineConfig>(&raw)
                .map_err(|err| format!("Invalid config {}: {err}", path.display()))?;
            config
                .validate()
                .map_err(|err| format!("Invalid config {}: {err}", path.display()))?;
            config
        }
        None => EngineConfig::default(),
    };
    let snapshot = load_catalog(catalog)?;
    info!(path = %catalog.display(), records = snapshot.len(), "Catalog ready");
    Ok(SearchEngine::with_snapshot(config, snapshot))
}

fn load_catalog(path: &Path) -> Result<CatalogSnapshot, Box<dyn Error>> {
    let bytes =
        fs::read(path).map_err(|err| format!("Failed to read catalog {}: {err}", path.display()))?;
    let compressed = path.extension().is_some_and(|ext| ext == "zst");
    let snapshot = if compressed {
        CatalogSnapshot::from_compressed_json(&bytes)?
    } else {
        CatalogSnapshot::from_json(&bytes)?
    };
    Ok(snapshot)
}

fn handle_search(
    engine: &SearchEngine,
    query: &str,
    options: &SearchOptions,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if query.trim().is_empty() {
        return Err("Search query cannot be empty".into());
    }
    let results = engine.search(query, options);

    if as_json {
        let payload = json!({
            "query": query,
            "options": options,
            "results": results,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_results_table(query, &results);
    }
    Ok(())
}

fn handle_suggest(
    engine: &SearchEngine,
    partial: &str,
    limit: usize,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let suggestions = engine.suggest(partial, limit);

    if as_json {
        let payload = json!({
            "partial": partial,
            "limit": limit,
            "suggestions": suggestions,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    if suggestions.is_empty() {
        println!("No suggestions for \"{partial}\".");
        return Ok(());
    }
    let width = suggestions
        .iter()
        .map(|s| s.label.chars().count())
        .max()
        .unwrap_or(5)
        .max("LABEL".len());
    println!("{:<width$}  {:<8}  {}", "LABEL", "CATEGORY", "ID", width = width);
    println!("{:-<width$}  {:-<8}  {}", "", "", "--", width = width);
    for suggestion in &suggestions {
        println!(
            "{:<width$}  {:<8}  {}",
            suggestion.label,
            suggestion.category.as_str(),
            suggestion.id,
            width = width
        );
    }
    Ok(())
}

fn handle_show(engine: &SearchEngine, id: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let record = engine
        .get_by_id(id)
        .ok_or_else(|| format!("No entity found with id {id:?}"))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(record.as_ref())?);
    } else {
        print_record(&record);
    }
    Ok(())
}

fn handle_complete(
    engine: &SearchEngine,
    prefix: &str,
    limit: usize,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let completions = engine.complete(prefix, limit);

    if as_json {
        let payload = json!({
            "prefix": prefix,
            "limit": limit,
            "results": completions.iter().map(|c| {
                json!({"text": c.text, "ids": c.ids})
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    if completions.is_empty() {
        println!("No names start with \"{prefix}\".");
        return Ok(());
    }
    let width = completions
        .iter()
        .map(|c| c.text.chars().count())
        .max()
        .unwrap_or(4)
        .max("NAME".len());
    println!("Completions for \"{prefix}\":");
    println!("{:<width$}  {}", "NAME", "IDS", width = width);
    println!("{:-<width$}  {}", "", "---", width = width);
    for completion in &completions {
        println!(
            "{:<width$}  {}",
            completion.text,
            completion.ids.join(", "),
            width = width
        );
    }
    Ok(())
}

fn handle_normalize(
    text: &str,
    script: Option<ScriptArg>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let normalized = match script {
        Some(script) => normalize(text, script.into()),
        None => normalize_text(text),
    };

    if as_json {
        let payload = json!({
            "input": text,
            "script": normalized.script(),
            "normalized": normalized.as_str(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{} ({})", normalized, normalized.script());
    }
    Ok(())
}

fn print_results_table(query: &str, rows: &[RankedResult]) {
    if rows.is_empty() {
        println!("No entities matched \"{query}\".");
        return;
    }
    let width = rows
        .iter()
        .map(|row| row.record.label().chars().count())
        .max()
        .unwrap_or(4)
        .max("NAME".len());
    println!("Results for \"{query}\":");
    println!(
        "{:>5}  {:<width$}  {:<8}  {:<8}  {}",
        "SCORE",
        "NAME",
        "CATEGORY",
        "KIND",
        "ID",
        width = width
    );
    println!(
        "{:->5}  {:-<width$}  {:-<8}  {:-<8}  {}",
        "",
        "",
        "",
        "",
        "--",
        width = width
    );
    for row in rows {
        println!(
            "{:>5}  {:<width$}  {:<8}  {:<8}  {}",
            row.percent(),
            row.record.label(),
            row.category().as_str(),
            row.kind.to_string(),
            row.id(),
            width = width
        );
    }
}

fn print_record(record: &EntityRecord) {
    println!("{} (ID {})", record.label(), record.id);
    println!("Category: {}", record.category);
    if let Some(number) = record.number {
        println!("Number: {number}");
    }
    if !record.arabic.primary.is_empty() {
        println!("Arabic: {}", record.arabic.primary);
    }
    if !record.latin.primary.is_empty() {
        println!("Latin: {}", record.latin.primary);
    }

    let mut variants: Vec<&str> = record
        .arabic
        .variants
        .iter()
        .chain(&record.latin.variants)
        .map(String::as_str)
        .collect();
    variants.extend(record.aliases.iter().map(String::as_str));
    if let Some(text) = format_list(variants, 8) {
        println!("Also known as: {text}");
    }
    if let Some(text) = format_list(record.related.iter().map(String::as_str).collect(), 8) {
        println!("Related: {text}");
    }
    if let Some(description) = &record.description {
        render_markdown_block("Description", description);
    }
}

fn format_list(items: Vec<&str>, limit: usize) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let truncated = items.len() > limit;
    let mut text = items[..items.len().min(limit)].join(", ");
    if truncated {
        text.push_str(", …");
    }
    Some(text)
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("\n{title}:");
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
