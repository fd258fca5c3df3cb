//! Main entry point for the tome CLI application.
//!
//! This binary inspects `.tome` archives (entries, folder tree, content
//! graph), resolves manifest links, and makes small edits through an
//! edit session.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use tomekit::cli::Command;
use tomekit::tree::format_size;
use tomekit::{
    ArchiveStore, CanonicalPath, Cli, ContentNode, EditSession, FileNode, FileTree, LoadLimits,
    ManifestCascade, NodeKind, Resolved, TemplateCatalog, resolve,
};

/// Application entry point.
///
/// Parses command-line arguments, sets up logging and dispatches to the
/// handler of the chosen subcommand.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; -q lowers the default
    let default_level = if cli.is_very_quiet() {
        "off"
    } else if cli.is_quiet() {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let limits = cli.limits();
    match &cli.command {
        Command::List { file, verbose } => list_entries(&open(file, &limits).await?, *verbose),
        Command::Tree { file } => {
            let store = open(file, &limits).await?;
            print_folder(&FileTree::build(&store), 0);
            Ok(())
        }
        Command::Graph { file } => {
            let store = open(file, &limits).await?;
            let graph = ManifestCascade::build(&store)?;
            print_node(&graph.root, 0);
            Ok(())
        }
        Command::Validate { file } => validate(&open(file, &limits).await?, &cli),
        Command::Resolve { link, base } => {
            let base = CanonicalPath::normalize(base)?;
            match resolve(link, &base) {
                Resolved::Internal(path) => println!("internal: {}", path),
                Resolved::External(url) => println!("external: {}", url),
                Resolved::Invalid => bail!("invalid link '{}'", link),
            }
            Ok(())
        }
        Command::Cat { file, entry } => {
            let store = open(file, &limits).await?;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(store.get(entry)?).await?;
            stdout.flush().await?;
            Ok(())
        }
        Command::Set {
            file,
            entry,
            source,
            output,
        } => {
            let store = open(file, &limits).await?;
            let content = tokio::fs::read(source)
                .await
                .with_context(|| format!("reading {}", source.display()))?;
            let out = output.as_deref().unwrap_or(file);
            set_entry(store, entry, content, out, &cli).await
        }
        Command::New {
            output,
            template,
            templates,
        } => {
            let catalog = match templates {
                Some(path) => TemplateCatalog::load_or_builtin(path).await,
                None => TemplateCatalog::builtin(),
            };
            let template = match template {
                Some(id) => catalog.get(id)?,
                None => catalog.default_template(),
            };
            let today = chrono::Local::now().date_naive();
            let session = EditSession::create(template, today)?;
            session.write_to(output).await?;
            if !cli.is_quiet() {
                println!("  created: {} (template '{}')", output.display(), template.id);
            }
            Ok(())
        }
    }
}

async fn open(file: &Path, limits: &LoadLimits) -> Result<ArchiveStore> {
    ArchiveStore::open_path(file, limits)
        .await
        .with_context(|| format!("opening {}", file.display()))
}

/// List entries in archive order.
///
/// Verbose format shows a table with size, compression ratio, method and
/// timestamp, followed by a totals line.
fn list_entries(store: &ArchiveStore, verbose: bool) -> Result<()> {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>7}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Method", "Date", "Time"
        );
        println!("{}", "-".repeat(79));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for path in store.archive_order() {
        if !verbose {
            println!("{}", path);
            continue;
        }

        let header = store.header(path)?;
        let (year, month, day) = header.mod_date();
        let (hour, minute, _second) = header.mod_time();
        println!(
            "{:>10}  {:>10}  {}  {:>7}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            header.uncompressed_size,
            header.compressed_size,
            ratio(header.compressed_size, header.uncompressed_size),
            header.compression_method.name(),
            year,
            month,
            day,
            hour,
            minute,
            path
        );
        total_uncompressed += header.uncompressed_size;
        total_compressed += header.compressed_size;
        file_count += 1;
    }

    if verbose {
        println!("{}", "-".repeat(79));
        println!(
            "{:>10}  {:>10}  {}  {:>30}  {} files ({})",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count,
            format_size(total_uncompressed)
        );
    }

    Ok(())
}

/// Space saved by compression, as a right-aligned percentage.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

fn print_folder(node: &FileNode, depth: usize) {
    let indent = "  ".repeat(depth);
    for child in &node.children {
        if child.is_folder() {
            println!("{}{}/", indent, child.name);
            print_folder(child, depth + 1);
        } else {
            println!(
                "{}{}  ({})",
                indent,
                child.name,
                format_size(child.size.unwrap_or(0))
            );
        }
    }
}

fn print_node(node: &ContentNode, depth: usize) {
    let label = match &node.kind {
        NodeKind::Manifest { type_name } => format!("[{}]", type_name),
        NodeKind::Chapter => "chapter".to_string(),
        NodeKind::Directory => "directory".to_string(),
        NodeKind::Page => "page".to_string(),
        NodeKind::Content => "content".to_string(),
        NodeKind::Audio => "audio".to_string(),
    };
    let mut line = format!("{}{} {}", "  ".repeat(depth), label, node.path);
    if let Some(key) = &node.order_key {
        line.push_str(&format!(" #{}", key));
    }
    if let Some(title) = &node.title {
        line.push_str(&format!(" \"{}\"", title));
    }
    if let Some(error) = &node.error {
        line.push_str(&format!("  !! {}", error));
    }
    println!("{}", line);
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

fn validate(store: &ArchiveStore, cli: &Cli) -> Result<()> {
    let graph = ManifestCascade::build(store)?;
    let errors = graph.errors();
    if errors.is_empty() {
        if !cli.is_quiet() {
            println!(
                "ok: {} '{}', {} content files",
                graph.manifest.type_name(),
                graph.manifest.title().unwrap_or(""),
                graph.leaves().len()
            );
        }
        return Ok(());
    }
    if !cli.is_very_quiet() {
        for error in &errors {
            eprintln!("{}", error);
        }
    }
    bail!("{} problem(s) found", errors.len())
}

/// Replace or add one entry. Existing entries go through an edit session so
/// the new content is validated before anything is written.
async fn set_entry(
    store: ArchiveStore,
    entry: &str,
    content: Vec<u8>,
    out: &Path,
    cli: &Cli,
) -> Result<()> {
    let mut session = EditSession::new(store);
    session.write_file(entry, content)?;
    session
        .write_to(out)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    if !cli.is_quiet() {
        println!("  updated: {} in {}", entry, out.display());
    }
    Ok(())
}
