//! CLI for hidetect: scan PDF/DOCX files or directories for hidden text.

#![cfg(feature = "cli")]

use clap::Parser;
use hidetect::{scan, sniff_file_type, summarize, FileType, ScanResult};
use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Parser)]
#[command(name = "hidetect")]
#[command(about = "Detect hidden or visually suppressed text in PDF and DOCX files", long_about = None)]
struct Args {
    /// Path to a file or directory to scan (use -d/--directory to scan a whole directory)
    path: Option<String>,

    /// Scan a whole directory (optionally with -r to recurse into subdirectories)
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    directory: Option<String>,

    /// When scanning a directory, recurse into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// File extensions to scan (comma-separated). No-extension files are always scanned (type guessed from content). Use --all to ignore the filter.
    #[arg(short, long, default_value = "pdf,docx")]
    extensions: String,

    /// Scan all files; type comes from the extension, or from content when there is none
    #[arg(long)]
    all: bool,

    /// Output JSON per result (one line per file unless --pretty)
    #[arg(long)]
    json: bool,

    /// Pretty-print JSON (use with --json)
    #[arg(long)]
    pretty: bool,

    /// Quiet: only print flagged paths
    #[arg(short, long)]
    quiet: bool,

    /// Log skipped streams/entries and scan failures to stderr (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose { "hidetect=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let exts: HashSet<String> = args
        .extensions
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let path_str = args
        .directory
        .as_ref()
        .or(args.path.as_ref())
        .ok_or("Missing path: give a file/directory as argument or use -d/--directory <DIR>")?;
    let path = Path::new(path_str.as_str());

    if !path.exists() {
        eprintln!("Not found: {}", path.display());
        std::process::exit(1);
    }

    if path.is_file() {
        if args.directory.is_some() {
            eprintln!("--directory expects a directory, not a file: {}", path.display());
            std::process::exit(1);
        }
        scan_file(path, &args, &exts)?;
        return Ok(());
    }

    if path.is_dir() {
        if !args.quiet {
            eprintln!(
                "Scanning directory: {} {}",
                path.display(),
                if args.recursive { "(recursive)" } else { "" }
            );
        }
        scan_dir(path, &args, &exts)?;
        return Ok(());
    }

    eprintln!("Not a file or directory: {}", path.display());
    std::process::exit(1);
}

fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Skip only when: not --all, the file has an extension, and it's not in the list.
fn skipped_by_extension(path: &Path, args: &Args, exts: &HashSet<String>) -> bool {
    let ext = lowercase_extension(path);
    !args.all && !ext.is_empty() && !exts.is_empty() && !exts.contains(&ext)
}

/// Scan one file. Files without an extension get a MIME type guessed from content.
fn scan_path(path: &Path, bytes: &[u8]) -> (ScanResult, Option<FileType>) {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let guessed = path.extension().is_none().then(|| sniff_file_type(bytes));
    let mime_type = guessed.and_then(FileType::mime_type).unwrap_or_default();
    (scan(bytes, mime_type, file_name), guessed)
}

fn scan_file(
    path: &Path,
    args: &Args,
    exts: &HashSet<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if skipped_by_extension(path, args, exts) {
        if !args.quiet {
            eprintln!("Skip (extension): {}", path.display());
        }
        return Ok(());
    }
    let bytes = fs::read(path)?;
    let (result, guessed) = scan_path(path, &bytes);
    print_result(path.display().to_string(), &result, guessed, args, &bytes)?;
    Ok(())
}

fn scan_dir(
    dir: &Path,
    args: &Args,
    exts: &HashSet<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let walker = if args.recursive {
        WalkDir::new(dir).into_iter()
    } else {
        WalkDir::new(dir).max_depth(1).into_iter()
    };

    let mut total = 0u64;
    let mut flagged = 0u64;
    let mut unscanned = 0u64;

    // Hidden entries are skipped, the root itself never is.
    let visible = |e: &walkdir::DirEntry| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.');
    for entry in walker.filter_entry(visible) {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || skipped_by_extension(path, args, exts) {
            continue;
        }
        total += 1;
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(_) => continue,
        };
        let (result, guessed) = scan_path(path, &bytes);
        if result.flagged {
            flagged += 1;
        }
        if result.file_type == FileType::Unknown {
            unscanned += 1;
        }
        print_result(path.display().to_string(), &result, guessed, args, &bytes)?;
    }

    if !args.quiet {
        eprintln!(
            "Scanned {} files, {} flagged, {} not scannable",
            total, flagged, unscanned
        );
    }
    Ok(())
}

fn print_result(
    path: String,
    result: &ScanResult,
    guessed: Option<FileType>,
    args: &Args,
    bytes: &[u8],
) -> Result<(), Box<dyn std::error::Error>> {
    if args.quiet && !result.flagged {
        return Ok(());
    }
    if args.json {
        let mut out = IndexMap::<String, serde_json::Value>::new();
        out.insert("sha256".to_string(), serde_json::Value::String(sha256_hex(bytes)));
        out.insert("path".to_string(), serde_json::Value::String(path));
        out.insert("size_bytes".to_string(), serde_json::to_value(bytes.len())?);
        out.insert("guessed_type".to_string(), serde_json::to_value(guessed)?);
        out.insert("result".to_string(), serde_json::to_value(result)?);
        out.insert("summary".to_string(), serde_json::to_value(summarize(result))?);
        let json_str = if args.pretty {
            serde_json::to_string_pretty(&out)?
        } else {
            serde_json::to_string(&out)?
        };
        println!("{}", json_str);
        return Ok(());
    }
    let size_str = format!("({} bytes)", bytes.len());
    if result.flagged {
        println!("FLAGGED {} {}", path, size_str);
    } else if result.file_type == FileType::Unknown {
        println!("UNSCANNED {} {}", path, size_str);
    } else {
        println!("OK {} {}", path, size_str);
    }
    println!("  sha256: {}", sha256_hex(bytes));
    if let Some(g) = guessed {
        println!("  guessed type: {} (no extension)", g.label());
    }
    println!(
        "  format: {}, indicators: {}",
        result.file_type.label(),
        result.total_indicators
    );
    for f in &result.flags {
        println!("  flag: {} [{}] x{}: {}", f.technique, f.severity, f.count, f.description);
        if let Some(ref s) = f.snippet {
            println!("    snippet: {:?}", s);
        }
    }
    if let Some(summary) = summarize(result) {
        println!("  summary: {}", summary);
    }
    Ok(())
}
