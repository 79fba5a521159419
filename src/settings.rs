use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use compress_io::compress::CompressIo;
use serde::{Deserialize, Serialize};

/// Settings remembered between runs, stored in the working directory
pub const SETTINGS_FILE: &str = ".count_amr_kmers.json";

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    genome_dir: PathBuf,
    saved: String,
}

impl Settings {
    pub fn new(genome_dir: &Path) -> Self {
        Self {
            genome_dir: genome_dir.to_owned(),
            saved: Local::now().to_rfc2822(),
        }
    }

    /// Settings from an earlier run, if present and readable
    pub fn load() -> Option<Self> {
        let rdr = CompressIo::new().path(SETTINGS_FILE).bufreader().ok()?;
        match serde_json::from_reader(rdr) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("Ignoring unreadable settings file {}: {}", SETTINGS_FILE, e);
                None
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let wrt = CompressIo::new()
            .path(SETTINGS_FILE)
            .bufwriter()
            .with_context(|| format!("Could not open settings file {}", SETTINGS_FILE))?;
        serde_json::to_writer_pretty(wrt, self)
            .with_context(|| format!("Error writing settings file {}", SETTINGS_FILE))?;
        debug!("Saved genome directory to {}", SETTINGS_FILE);
        Ok(())
    }

    pub fn genome_dir(&self) -> &Path {
        &self.genome_dir
    }
}

mod test {
    #[allow(unused_imports)]
    use super::*;

    #[test]
    fn settings_survive_serialization() {
        let s = Settings::new(Path::new("/data/genomes"));
        let js = serde_json::to_string(&s).unwrap();
        let s2: Settings = serde_json::from_str(&js).unwrap();
        assert_eq!(s2.genome_dir(), Path::new("/data/genomes"));
    }
}
