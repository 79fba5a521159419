use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

use crate::settings::Settings;

mod cli_model;

pub struct Config {
    genome_dir: PathBuf,
    metadata: PathBuf,
    output: PathBuf,
    kmer_length: usize,
    threads: usize,
}

impl Config {
    pub fn genome_dir(&self) -> &Path {
        &self.genome_dir
    }

    pub fn metadata(&self) -> &Path {
        &self.metadata
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn kmer_length(&self) -> usize {
        self.kmer_length
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

/// Ask before committing to a thread count that uses more than half the
/// machine. Anything other than an explicit yes aborts the run.
fn confirm_threads(threads: usize, ncpus: usize) -> anyhow::Result<()> {
    eprint!("Use {} of {} available cores? [y/N] ", threads, ncpus);
    io::stderr().flush()?;
    let mut reply = String::new();
    io::stdin().lock().read_line(&mut reply)?;
    match reply.trim() {
        "y" | "Y" | "yes" | "YES" => Ok(()),
        _ => Err(anyhow!("Aborted by user")),
    }
}

pub fn handle_cli() -> anyhow::Result<Config> {
    let c = cli_model::cli_model();
    let m = c.get_matches();
    super::utils::init_log(&m);

    let metadata = m
        .get_one::<PathBuf>("metadata")
        .map(|p| p.to_owned())
        .expect("Missing required argument");

    let output = m
        .get_one::<PathBuf>("output")
        .map(|p| p.to_owned())
        .expect("Missing default argument");

    let kmer_length = *m
        .get_one::<u64>("kmer_length")
        .expect("Missing default argument") as usize;

    let ncpus = num_cpus::get();
    let mut threads = m
        .get_one::<u64>("threads")
        .map(|x| *x as usize)
        .unwrap_or_else(|| (ncpus / 2).max(1));
    if threads > ncpus {
        warn!("Reducing thread count from {} to the {} available cores", threads, ncpus);
        threads = ncpus;
    }
    if !m.get_flag("yes") && threads * 2 > ncpus {
        confirm_threads(threads, ncpus)?;
    }

    // A directory given on the command line is remembered for later runs
    let genome_dir = match m.get_one::<PathBuf>("genome_dir") {
        Some(d) => {
            if let Err(e) = Settings::new(d).save() {
                warn!("Could not save settings: {:?}", e);
            }
            d.to_owned()
        }
        None => match Settings::load() {
            Some(s) => {
                info!("Using saved genome directory {}", s.genome_dir().display());
                s.genome_dir().to_owned()
            }
            None => {
                return Err(anyhow!(
                    "No genome directory given and no saved settings found (use --genome_dir)"
                ))
            }
        },
    };
    if !genome_dir.is_dir() {
        return Err(anyhow!(
            "Genome directory {} is not a directory",
            genome_dir.display()
        ));
    }

    Ok(Config {
        genome_dir,
        metadata,
        output,
        kmer_length,
        threads,
    })
}
