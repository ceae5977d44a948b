use anyhow::{Context, Result};
use std::fs::{self, File, FileTimes};
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

pub const ENTITY_MARKER: &str = r#""type":"entity""#;
pub const RELATION_MARKER: &str = r#""type":"relation""#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub entities: usize,
    pub relations: usize,
}

/// Copies `resolved` over `local` unless both name the same file.
///
/// Returns `true` when a copy was made.
pub fn stage(resolved: Option<&Path>, local: &Path) -> Result<bool> {
    let Some(source) = resolved else {
        return Ok(false);
    };

    if is_same_file(source, local) {
        println!("Using {}", source.display());
        return Ok(false);
    }

    println!("Copying to {}", local.display());
    copy_with_times(source, local)?;
    println!("Ready to serve");

    Ok(true)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn copy_with_times(source: &Path, dest: &Path) -> Result<()> {
    fs::copy(source, dest).with_context(|| {
        format!("Failed to copy {} to {}", source.display(), dest.display())
    })?;

    let meta = fs::metadata(source)
        .with_context(|| format!("Failed to read metadata of {}", source.display()))?;
    let mut times = FileTimes::new().set_modified(meta.modified()?);
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }

    // Read-only handle: the copy inherits the source's permission bits
    File::open(dest)
        .and_then(|file| file.set_times(times))
        .with_context(|| format!("Failed to set timestamps on {}", dest.display()))?;

    info!("Staged {} -> {}", source.display(), dest.display());
    Ok(())
}

/// Counts marker lines in the staged file. `Ok(None)` when there is no file.
///
/// This is a line heuristic, not a JSON parse: a line is counted once per
/// marker it contains, wherever the marker appears.
pub fn summarize(local: &Path) -> Result<Option<Summary>> {
    if !local.is_file() {
        debug!("No staged file at {}, skipping summary", local.display());
        return Ok(None);
    }

    let file = File::open(local).with_context(|| format!("Failed to open {}", local.display()))?;
    let summary = count_markers(BufReader::new(file))
        .with_context(|| format!("Failed to read {}", local.display()))?;

    Ok(Some(summary))
}

pub fn count_markers<R: BufRead>(reader: R) -> std::io::Result<Summary> {
    let mut summary = Summary::default();

    for line in reader.lines() {
        let line = line?;
        if line.contains(ENTITY_MARKER) {
            summary.entities += 1;
        }
        if line.contains(RELATION_MARKER) {
            summary.relations += 1;
        }
    }

    Ok(summary)
}
