use clap::{Parser, Subcommand};
use shrinkit::archive::{Archive, ArchiveOptions};
use shrinkit::attrs::types::four_cc_string;
use shrinkit::attrs::{access_string, NufxXattr};
use shrinkit::record::{ArchiveRecord, ForkKind, RecordKind, StructuralPolicy};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shk", about = "Inspect ShrinkIt (NuFX) archives")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Skip structurally broken records instead of failing
    #[arg(long, global = true)]
    skip_bad: bool,
    /// Do not look for a Binary II wrapper
    #[arg(long, global = true)]
    no_wrappers: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List records in storage order
    List {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show the reconstructed directory tree
    Tree {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show archive metadata, or one item's attributes
    Info {
        input: PathBuf,
        /// Item path, `/`-separated (`%2F` for a slash inside a name)
        path:  Option<String>,
    },
    /// Write one fork of an item to stdout
    Cat {
        input: PathBuf,
        path:  String,
        /// Resource fork instead of data fork
        #[arg(short, long)]
        resource: bool,
        /// Hex dump instead of raw bytes
        #[arg(long = "hex")]
        hex_dump: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = ArchiveOptions {
        policy:         if cli.skip_bad { StructuralPolicy::SkipRecord } else { StructuralPolicy::Abort },
        allow_wrappers: !cli.no_wrappers,
        ..ArchiveOptions::default()
    };

    match cli.command {

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, json } => {
            let mut ar = Archive::open_with_options(&input, options)?;
            ar.build_model()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ar.list())?);
                return Ok(());
            }
            println!("Archive: {}", input.display());
            println!("{:<36} {:>4} {:>6} {:>6} {:>10} {:>10}",
                     "Name", "Type", "Aux", "Access", "Size", "Packed");
            for info in ar.list() {
                println!("{:<36} {:>4} ${:04X} {:>6} {:>10} {:>10}",
                    info.path, info.file_type, info.aux_type & 0xFFFF,
                    info.access, info.size, info.compressed_size);
            }
            for err in ar.skipped() {
                eprintln!("  skipped: {err}");
            }
            if let Some(tree) = ar.tree() {
                for dup in tree.duplicates() {
                    eprintln!("  duplicate: {dup}");
                }
            }
        }

        // ── Tree ─────────────────────────────────────────────────────────────
        Commands::Tree { input, json } => {
            let mut ar = Archive::open_with_options(&input, options)?;
            let tree = ar.build_model()?;
            if json {
                let nodes: Vec<_> = tree.iter().map(|(_, node)| node).collect();
                println!("{}", serde_json::to_string_pretty(&nodes)?);
                return Ok(());
            }
            for (_, node) in tree.iter() {
                let name = if node.depth == 0 { "/" } else { node.name.as_str() };
                let suffix = if node.is_directory() && node.depth > 0 { "/" } else { "" };
                let indent = node.depth * 2;
                println!("{:indent$}{name}{suffix}  ({} bytes)", "", node.size);
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, path: None } => {
            let mut ar = Archive::open_with_options(&input, options)?;
            let nodes = ar.build_model()?.len();
            let m = ar.master();
            println!("── NuFX Archive ─────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Master version {}", m.version);
            println!("  Records        {}", m.total_records);
            println!("  Master EOF     {} B", m.master_eof);
            println!("  Created        {}", when(m.create_when.to_utc()));
            println!("  Modified       {}", when(m.mod_when.to_utc()));
            println!("  Tree nodes     {nodes}");
            println!("  Skipped        {}", ar.skipped().len());
        }
        Commands::Info { input, path: Some(path) } => {
            let mut ar = Archive::open_with_options(&input, options)?;
            ar.build_model()?;
            let record = find_record(&ar, &path)?;
            let host = ar.host_attributes(record);
            println!("── {} ──", path);
            println!("  Stored name    {}", record.filename);
            println!("  Kind           {:?}", record.kind);
            println!("  Filesystem     {} (separator {:?})", record.file_sys_id, record.separator as char);
            println!("  File type      ${:02X} {} aux ${:04X}",
                     record.file_type, host.file_type.abbreviation, record.aux_type);
            println!("  HFS codes      {}/{}",
                     four_cc_string(host.file_type.type_code), four_cc_string(host.file_type.creator));
            println!("  Category       {:?}", host.file_type.category);
            println!("  Access         {} (locked: {})", access_string(record.access), host.access.is_locked());
            println!("  Created        {}", when(host.created));
            println!("  Modified       {}", when(host.modified));
            println!("  Archived       {}", when(host.archived));
            println!("  Data fork      {} B", host.data_fork_size);
            println!("  Resource fork  {} B", host.resource_fork_size);
            if let Some(comment) = &record.comment {
                println!("  Comment        {}", comment.replace('\n', "\n                 "));
            }
            println!("  NuFX xattr     {}", hex::encode(NufxXattr::from_record(record).to_bytes()));
        }

        // ── Cat ──────────────────────────────────────────────────────────────
        Commands::Cat { input, path, resource, hex_dump } => {
            let mut ar = Archive::open_with_options(&input, options)?;
            ar.build_model()?;
            let record = find_record(&ar, &path)?;
            let which = match (record.kind, resource) {
                (_, true) => ForkKind::Resource,
                (RecordKind::Disk, false) => ForkKind::Disk,
                _ => ForkKind::Data,
            };
            let bytes = ar.fork_contents(record, which)?;
            let mut out = std::io::stdout().lock();
            if hex_dump {
                for (i, line) in bytes.chunks(16).enumerate() {
                    writeln!(out, "{:08x}  {}", i * 16, hex::encode(line))?;
                }
            } else {
                out.write_all(&bytes)?;
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn find_record<'a>(ar: &'a Archive, path: &str) -> Result<&'a ArchiveRecord, Box<dyn std::error::Error>> {
    let tree = ar.tree().ok_or("archive model not built")?;
    let origin = tree
        .find_path(path)
        .and_then(|id| tree.node(id).origin)
        .ok_or_else(|| format!("no archive item at {path}"))?;
    ar.record(origin).ok_or_else(|| format!("record {origin} missing").into())
}

fn when(t: Option<chrono::DateTime<chrono::Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".into())
}
