use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::codec;
use crate::store::{read_snapshot_text, remove_if_exists, write_atomic};

#[derive(Parser, Debug)]
#[command(
    name = "quiversnap",
    version,
    about = "Inspect and maintain snapshot files",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Decode every snapshot file under a directory; report malformed / non-canonical files
    Check {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long, default_value = "snap")]
        ext: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List keys of a snapshot file
    Keys {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print the body of one snapshot
    Show {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        key: String,
    },
    /// Rewrite a snapshot file in canonical encoding (atomic)
    Fmt {
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete the given keys from a snapshot file (atomic)
    Prune {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, required = true)]
        key: Vec<String>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Check { dir, ext, json } => cmd_check(&dir, &ext, json),
        Cmd::Keys { file } => cmd_keys(&file),
        Cmd::Show { file, key } => cmd_show(&file, &key),
        Cmd::Fmt { file } => cmd_fmt(&file),
        Cmd::Prune { file, key } => cmd_prune(&file, &key),
    }
}

fn load_entries(path: &Path) -> Result<(String, BTreeMap<String, String>)> {
    let text = read_snapshot_text(path)?
        .ok_or_else(|| anyhow!("snapshot file {} not found", path.display()))?;
    let entries =
        codec::decode(&text).with_context(|| format!("decode {}", path.display()))?;
    Ok((text, entries))
}

fn collect_files(dir: &Path, ext: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    let rd = fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    for entry in rd {
        let p = entry?.path();
        if p.is_dir() {
            collect_files(&p, ext, out)?;
        } else if p.extension().and_then(|e| e.to_str()) == Some(ext) {
            out.push(p);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct FileCheck {
    pub path: String,
    pub entries: usize,
    pub canonical: bool,
    pub error: Option<String>,
}

/// Check every `*.ext` file under `dir`.
pub fn check_dir(dir: &Path, ext: &str) -> Result<Vec<FileCheck>> {
    let mut paths = Vec::new();
    collect_files(dir, ext, &mut paths)?;
    paths.sort();

    let mut out = Vec::with_capacity(paths.len());
    for p in paths {
        let text = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
        let check = match codec::decode(&text) {
            Ok(entries) => FileCheck {
                path: p.display().to_string(),
                entries: entries.len(),
                canonical: codec::encode(&entries) == text,
                error: None,
            },
            Err(e) => FileCheck {
                path: p.display().to_string(),
                entries: 0,
                canonical: false,
                error: Some(e.to_string()),
            },
        };
        out.push(check);
    }
    Ok(out)
}

fn cmd_check(dir: &Path, ext: &str, json: bool) -> Result<()> {
    let checks = check_dir(dir, ext)?;
    let malformed = checks.iter().filter(|c| c.error.is_some()).count();

    if json {
        println!("{}", serde_json::to_string_pretty(&checks)?);
    } else {
        for c in &checks {
            match &c.error {
                Some(e) => println!("MALFORMED  {}  {}", c.path, e),
                None if !c.canonical => println!("REFORMAT   {}  ({} entries)", c.path, c.entries),
                None => println!("OK         {}  ({} entries)", c.path, c.entries),
            }
        }
        println!("Checked {} file(s), {} malformed", checks.len(), malformed);
    }

    if malformed > 0 {
        return Err(anyhow!("{} malformed snapshot file(s)", malformed));
    }
    Ok(())
}

fn cmd_keys(file: &Path) -> Result<()> {
    let (_, entries) = load_entries(file)?;
    for k in entries.keys() {
        println!("{}", k);
    }
    Ok(())
}

fn cmd_show(file: &Path, key: &str) -> Result<()> {
    let (_, entries) = load_entries(file)?;
    let body = entries
        .get(key)
        .ok_or_else(|| anyhow!("key '{}' not found in {}", key, file.display()))?;
    println!("{}", body);
    Ok(())
}

fn cmd_fmt(file: &Path) -> Result<()> {
    let (text, entries) = load_entries(file)?;
    let canonical = codec::encode(&entries);
    if canonical == text {
        println!("{} already canonical", file.display());
        return Ok(());
    }
    write_atomic(file, canonical.as_bytes())?;
    println!("Rewrote {} ({} entries)", file.display(), entries.len());
    Ok(())
}

/// Remove `keys` from the file; returns keys that were actually present.
pub fn prune_keys(file: &Path, keys: &[String]) -> Result<Vec<String>> {
    let (_, mut entries) = load_entries(file)?;
    let removed: Vec<String> = keys
        .iter()
        .filter(|k| entries.remove(k.as_str()).is_some())
        .cloned()
        .collect();
    if removed.is_empty() {
        return Ok(removed);
    }
    if entries.is_empty() {
        remove_if_exists(file)?;
    } else {
        write_atomic(file, codec::encode(&entries).as_bytes())?;
    }
    Ok(removed)
}

fn cmd_prune(file: &Path, keys: &[String]) -> Result<()> {
    let removed = prune_keys(file, keys)?;
    println!("Pruned {} key(s) from {}", removed.len(), file.display());
    for k in removed {
        println!("  - {}", k);
    }
    Ok(())
}
