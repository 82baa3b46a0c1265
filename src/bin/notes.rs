//! Notes CLI.
//!
//! Searches and edits notes in the configured backend. Queries use the
//! Gmail-style syntax of [`notes::search`]:
//!
//! ```text
//! notes list "meeting -label:archived" --sort -modified
//! notes query "(label:work OR label:home) todo"
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use notes::config::{read_config_file, ConfigStore, NotesConfig};
use notes::provider::{
    open_provider, process_env, validate_config, ListRequest, NewNote, NoteUpdate, Provider,
    ProviderKind, Row, ValidationReport, DEFAULT_LIST_LIMIT,
};
use notes::search::{parse_query, SortSpec};

#[derive(Parser, Debug)]
#[command(
    name = "notes",
    version,
    about = "Manage notes across multiple backends",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        env = "NOTES_PROVIDER",
        help = "Provider to use instead of the configured one"
    )]
    provider: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List notes, optionally filtered by a Gmail-style query
    List(ListCmd),
    /// Add a new note
    Add(AddCmd),
    /// Read a note by ID
    Read(ReadCmd),
    /// Update an existing note
    Update(UpdateCmd),
    /// Manage note attachments
    #[command(subcommand)]
    Attachments(AttachmentsCmd),
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCmd),
    /// Show how a query parses and compiles, without contacting the backend
    Query(QueryCmd),
}

#[derive(Args, Debug)]
struct ListCmd {
    #[arg(value_name = "QUERY", help = "Search query, e.g. \"meeting -label:archived\"")]
    query: Option<String>,

    #[arg(long, default_value_t = DEFAULT_LIST_LIMIT, help = "Maximum notes to return")]
    limit: usize,

    #[arg(
        long,
        value_name = "FIELD",
        allow_hyphen_values = true,
        help = "Sort field, prefix with - for descending (e.g. -modified)"
    )]
    sort: Option<String>,
}

#[derive(Args, Debug)]
struct AddCmd {
    title: String,

    #[arg(short, long, default_value = "", help = "Note content")]
    content: String,

    #[arg(short = 'l', long = "label", default_value = "", help = "Comma-separated labels")]
    labels: String,
}

#[derive(Args, Debug)]
struct ReadCmd {
    note_id: String,
}

#[derive(Args, Debug)]
struct UpdateCmd {
    note_id: String,

    #[arg(short, long, help = "New title")]
    title: Option<String>,

    #[arg(short, long, help = "New content")]
    content: Option<String>,

    #[arg(short = 'l', long = "label", help = "New comma-separated labels")]
    labels: Option<String>,
}

#[derive(Subcommand, Debug)]
enum AttachmentsCmd {
    /// List attachments of a note
    List { note_id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCmd {
    /// Show current configuration and test the connection
    Show,
    /// Validate a config file and save it if the connection works
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct QueryCmd {
    query: String,

    #[arg(long, value_name = "FIELD", allow_hyphen_values = true, help = "Sort field")]
    sort: Option<String>,

    #[arg(long, default_value = "Note", help = "Table the selector targets")]
    table: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("notes=warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let store = ConfigStore::from_env()?;
    let format = cli.format;
    let provider_name = cli.provider.as_deref();

    match cli.command {
        Command::List(cmd) => {
            let request = ListRequest {
                limit: cmd.limit,
                query: cmd.query.filter(|q| !q.trim().is_empty()),
                sort: SortSpec::parse_optional(cmd.sort.as_deref())?,
            };
            let notes = provider(&store, provider_name)?.list(&request).await?;

            if format == OutputFormat::Json {
                print_json(&notes)?;
            } else {
                println!(
                    "{}",
                    list_summary(request.query.is_some(), notes.results.len(), notes.total_count)
                );
                for note in &notes.results {
                    println!("  [{}] {}", row_id(note), row_title(note));
                }
            }
        }
        Command::Add(cmd) => {
            let note = NewNote {
                title: cmd.title,
                content: cmd.content,
                labels: cmd.labels,
                ..Default::default()
            };
            let row = provider(&store, provider_name)?.add(&note).await?;

            if format == OutputFormat::Json {
                print_json(&row)?;
            } else {
                let id = field(&row, &["ID", "id"]).unwrap_or_else(|| "?".to_string());
                println!("Created note [{}]: {}", id, note.title);
            }
        }
        Command::Read(cmd) => {
            let Some(row) = provider(&store, provider_name)?.get(&cmd.note_id).await? else {
                eprintln!("Note not found: {}", cmd.note_id);
                return Ok(ExitCode::FAILURE);
            };

            if format == OutputFormat::Json {
                print_json(&row)?;
            } else {
                println!("[{}] {}", cmd.note_id, row_title(&row));
                if let Some(labels) = field(&row, &["Labels", "labels"]) {
                    println!("Labels: {}", labels);
                }
                if let Some(content) = field(&row, &["Content", "content"]) {
                    println!("\n{}", content);
                }
            }
        }
        Command::Update(cmd) => {
            let update = NoteUpdate {
                title: cmd.title,
                content: cmd.content,
                labels: cmd.labels,
            };
            if update.is_empty() {
                bail!("At least one of --title, --content, or --label required.");
            }
            let row = provider(&store, provider_name)?
                .update(&cmd.note_id, &update)
                .await?;

            if format == OutputFormat::Json {
                print_json(&row)?;
            } else {
                println!("Updated note [{}]: {}", cmd.note_id, row_title(&row));
            }
        }
        Command::Attachments(AttachmentsCmd::List { note_id }) => {
            let rows = provider(&store, provider_name)?
                .list_attachments(&note_id)
                .await?;

            if format == OutputFormat::Json {
                print_json(&rows)?;
            } else if rows.is_empty() {
                println!("No attachments found.");
            } else {
                println!("Found {} attachments:", rows.len());
                for row in &rows {
                    println!("  {}", attachment_line(row));
                }
            }
        }
        Command::Config(ConfigCmd::Show) => return config_show(&store).await,
        Command::Config(ConfigCmd::Import { file }) => return config_import(&store, &file).await,
        Command::Query(cmd) => {
            let kind = match provider_name {
                Some(name) => name.parse::<ProviderKind>()?,
                None => store
                    .load()?
                    .and_then(|c| c.provider)
                    .map(|name| name.parse::<ProviderKind>())
                    .transpose()?
                    .unwrap_or_default(),
            };
            let expr = parse_query(&cmd.query);
            let sort = SortSpec::parse_optional(cmd.sort.as_deref())?;
            let compiled = kind
                .selector_backend()
                .compile(&cmd.table, expr.as_ref(), sort.as_ref());

            if format == OutputFormat::Json {
                print_json(&serde_json::json!({
                    "provider": kind.name(),
                    "expression": expr,
                    "sort": sort,
                    "selector": compiled.selector(),
                }))?;
            } else {
                match &expr {
                    Some(expr) => println!("Expression: {:?}", expr),
                    None => println!("Expression: (empty)"),
                }
                println!("Selector: {}", compiled.selector().unwrap_or("(all rows)"));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn provider(store: &ConfigStore, name: Option<&str>) -> anyhow::Result<Provider> {
    Ok(open_provider(store, name, process_env)?)
}

async fn config_show(store: &ConfigStore) -> anyhow::Result<ExitCode> {
    let Some(config) = store.load()? else {
        println!("No config found at {}", store.path().display());
        println!("\nTo configure, create a config file and run:");
        println!("  notes config import <file>");
        println!("\nExample config for AppSheet:\n");
        print!("{}", toml::to_string_pretty(&NotesConfig::example())?);
        return Ok(ExitCode::FAILURE);
    };

    let report = validate_config(&config).await;
    print_report(config.provider.as_deref(), &report);
    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn config_import(store: &ConfigStore, file: &std::path::Path) -> anyhow::Result<ExitCode> {
    let proposed = read_config_file(file)
        .with_context(|| format!("cannot read config from {}", file.display()))?;

    println!("Validating config from {}...\n", file.display());
    let report = validate_config(&proposed).await;
    print_report(proposed.provider.as_deref(), &report);

    if !report.success {
        println!("\nConfig import rejected - existing config unchanged.");
        return Ok(ExitCode::FAILURE);
    }

    store.save(&proposed)?;
    println!("\nConfig saved to {}", store.path().display());
    Ok(ExitCode::SUCCESS)
}

fn print_report(provider: Option<&str>, report: &ValidationReport) {
    if let Some(provider) = provider {
        println!("Provider: {}", provider);
    }
    for (key, value) in &report.stats {
        println!("  {}: {}", key, value);
    }
    println!("\n  {}", report.message);
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Header line of a listing.
fn list_summary(filtered: bool, showing: usize, total: usize) -> String {
    match (filtered, showing < total) {
        (true, true) => format!("Showing {} of {} matching notes:", showing, total),
        (true, false) => format!("Found {} matching notes:", total),
        (false, true) => format!("Showing {} of {} notes:", showing, total),
        (false, false) => format!("Showing all {} notes:", total),
    }
}

/// First non-empty value among `columns`, rendered as text.
fn field(row: &Row, columns: &[&str]) -> Option<String> {
    columns.iter().find_map(|column| match row.get(*column)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}

fn row_id(row: &Row) -> String {
    field(row, &["_RowNumber", "ID", "id"]).unwrap_or_else(|| "?".to_string())
}

fn row_title(row: &Row) -> String {
    field(row, &["Title", "title"]).unwrap_or_else(|| "(no title)".to_string())
}

fn attachment_line(row: &Row) -> String {
    let id = field(row, &["ID"]).unwrap_or_else(|| "?".to_string());
    match field(row, &["Type"]).as_deref() {
        Some("Image") => format!(
            "[{}] Image: {}",
            id,
            field(row, &["Image", "List Image"]).unwrap_or_else(|| "(no path)".to_string())
        ),
        Some("Link") => format!(
            "[{}] Link: {}",
            id,
            field(row, &["Link"]).unwrap_or_else(|| "{}".to_string())
        ),
        other => format!("[{}] {}", id, other.unwrap_or("?")),
    }
}
