//! folio - paginate an HTML book in the terminal

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use folio::host::{FileStore, KeyValueStore, MemoryHost, MemoryStore};
use folio::{Columns, DocumentId, Host, Reader, ReaderConfig, Size};

/// Documents opened from the command line all share this id, so progress
/// saved in a store file is per store, not per path.
const CLI_DOCUMENT: DocumentId = DocumentId(1);

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Paginate HTML books and locate passages", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio info book.html              Show page count and front matter
    folio toc book.html               List table of contents with pages
    folio page book.html 12           Print the text of page 12
    folio find book.html \"call me\"    Find the page a quote starts on")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    view: ViewArgs,
}

#[derive(Args)]
struct ViewArgs {
    /// Viewport width in CSS pixels
    #[arg(long, global = true, default_value_t = 1000.0)]
    width: f32,

    /// Viewport height in CSS pixels
    #[arg(long, global = true, default_value_t = 616.0)]
    height: f32,

    /// Columns per page
    #[arg(long, global = true, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    columns: u8,

    /// JSON file keeping reading progress and appearance between runs
    #[arg(long, global = true, value_name = "FILE")]
    store: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Show page count, table of contents size and front matter
    Info { input: String },
    /// List table of contents entries with their pages
    Toc { input: String },
    /// Print the text of one page
    Page { input: String, page: usize },
    /// Print the page a quote starts on
    Find {
        input: String,
        quote: String,
        /// Search this block first
        #[arg(long)]
        block: Option<usize>,
    },
}

impl Command {
    fn input(&self) -> &str {
        match self {
            Command::Info { input }
            | Command::Toc { input }
            | Command::Page { input, .. }
            | Command::Find { input, .. } => input,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match &cli.view.store {
        Some(path) => FileStore::open(path)
            .map_err(|e| e.to_string())
            .and_then(|store| run(&cli, MemoryHost::with_storage(store))),
        None => run(&cli, MemoryHost::with_storage(MemoryStore::default())),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run<S: KeyValueStore>(cli: &Cli, mut host: MemoryHost<S>) -> Result<(), String>
where
    MemoryHost<S>: Host,
{
    let path = cli.command.input();
    let bytes = std::fs::read(path).map_err(|e| format!("{path}: {e}"))?;
    host.documents.insert_bytes(CLI_DOCUMENT, path, &bytes);

    let config = ReaderConfig::default();
    let mut reader = Reader::new(host, config.clone());
    let viewport = Size::new(cli.view.width, cli.view.height);
    reader.open(CLI_DOCUMENT, viewport).map_err(|e| e.to_string())?;
    if cli.view.columns == 2 {
        reader.set_columns(Columns::Two);
        reader.animation_frame(0);
    }

    match &cli.command {
        Command::Info { .. } => show_info(&reader, path),
        Command::Toc { .. } => show_toc(&mut reader),
        Command::Page { page, .. } => {
            show_page(&mut reader, *page)?;
            // Let the debounced progress save land in the store.
            reader.tick(config.progress_delay);
            Ok(())
        }
        Command::Find { quote, block, .. } => {
            let page = reader
                .scroll_to_quote(quote, *block)
                .ok_or_else(|| format!("quote not found: {quote:?}"))?;
            println!("{page}");
            Ok(())
        }
    }
}

fn show_info<H: Host>(reader: &Reader<H>, path: &str) -> Result<(), String> {
    println!("File: {path}");
    let front = reader.front_matter();
    if let Some(title) = &front.title {
        println!("Title: {title}");
    }
    if let Some(author) = &front.author {
        println!("Author: {author}");
    }
    if let Some(translator) = &front.translator {
        println!("Translator: {translator}");
    }
    if let Some(annotator) = &front.annotator {
        println!("Annotator: {annotator}");
    }
    println!("Pages: {}", reader.total_pages());
    println!("Current page: {}", reader.current_page());
    println!("TOC entries: {}", reader.toc().len());
    Ok(())
}

fn show_toc<H: Host>(reader: &mut Reader<H>) -> Result<(), String> {
    let entries = reader.toc().to_vec();
    for entry in entries {
        let page = reader
            .jump_to_toc_entry(&entry.id, 0)
            .map_or_else(|| "?".to_string(), |jump| jump.page.to_string());
        let indent = "  ".repeat(usize::from(entry.level.saturating_sub(1)));
        println!("{page:>5}  {indent}{}", entry.text);
    }
    Ok(())
}

fn show_page<H: Host>(reader: &mut Reader<H>, page: usize) -> Result<(), String> {
    let total = reader.total_pages();
    if page == 0 || page > total {
        return Err(format!("page {page} is out of range (1-{total})"));
    }
    reader.scroll_to_page(page);
    let content = reader
        .page_content(page)
        .ok_or_else(|| format!("page {page} has no content"))?;
    println!("{}", content.text);
    Ok(())
}
