use std::path::{Path, PathBuf};
use tracing::debug;

pub const MEMORY_FILE_NAME: &str = "memory.json";

/// Ordered list of places a memory file may live, highest priority first.
pub struct MemoryLocator {
    home: Option<PathBuf>,
    local: PathBuf,
}

impl MemoryLocator {
    pub fn new(root: &Path) -> Self {
        Self::with_home(root, dirs::home_dir())
    }

    pub fn with_home(root: &Path, home: Option<PathBuf>) -> Self {
        Self {
            home,
            local: root.join(MEMORY_FILE_NAME),
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.local
    }

    /// The well-known locations, excluding any user-supplied path.
    pub fn default_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = vec![self.local.clone()];

        if let Some(home) = &self.home {
            candidates.push(home.join(MEMORY_FILE_NAME));
            candidates.push(home.join("code").join(MEMORY_FILE_NAME));
            candidates.push(home.join(".config").join("claude").join(MEMORY_FILE_NAME));
        }

        candidates
    }

    pub fn candidates(&self, custom_path: Option<&str>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(custom) = custom_path {
            candidates.push(self.expand_home(custom));
        }
        candidates.extend(self.default_candidates());
        candidates
    }

    /// Returns the first candidate that is a file (symlinks are followed).
    pub fn resolve(&self, custom_path: Option<&str>) -> Option<PathBuf> {
        let candidates = self.candidates(custom_path);

        for location in &candidates {
            debug!("Checking for memory file at {}", location.display());
            if location.is_file() {
                println!("Found memory.json at {}", location.display());
                return Some(location.clone());
            }
        }

        println!("No memory.json found in common locations:");
        for location in self.default_candidates() {
            println!("   x {}", location.display());
        }
        println!();
        println!("To use your memory file:");
        println!("   memviz /path/to/your/memory.json");
        println!("   OR copy it to ./{}", MEMORY_FILE_NAME);
        println!();
        println!("Will use demo data for visualization");

        None
    }

    /// Expands a leading `~` or `~/` to the home directory.
    pub fn expand_home(&self, raw: &str) -> PathBuf {
        let Some(home) = &self.home else {
            return PathBuf::from(raw);
        };

        if raw == "~" {
            return home.clone();
        }

        match raw.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => PathBuf::from(raw),
        }
    }
}
