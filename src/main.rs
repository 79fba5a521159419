#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

mod cli;
mod genomes;
mod kmers;
mod merge;
mod output;
mod phenotypes;
mod process;
mod settings;
mod table;
mod utils;

fn main() -> anyhow::Result<()> {
    let cfg = cli::handle_cli()?;
    let phenotypes = phenotypes::PhenotypeTable::from_csv(cfg.metadata())?;
    let plan = genomes::assign_genomes(&cfg, &phenotypes)?;
    let tables = process::process(&cfg, &plan)?;
    let records = merge::merge_tables(tables);
    output::output(&cfg, plan.genomes(), records)
}
