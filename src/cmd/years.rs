//! Years command - list the published tax year configurations.

use crate::config::ConfigRepository;
use clap::Args;
use std::fs::File;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

#[derive(Args, Debug)]
pub struct YearsCommand {
    /// Additional tax year configurations to publish before listing
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Tabled)]
struct YearRow {
    #[tabled(rename = "Jurisdiction")]
    jurisdiction: String,
    #[tabled(rename = "Tax Year")]
    tax_year: String,
    #[tabled(rename = "Version")]
    version: u32,
}

impl YearsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let repository = ConfigRepository::builtin();
        if let Some(path) = &self.config {
            repository.load_json(File::open(path)?)?;
        }

        let rows: Vec<YearRow> = repository
            .published()
            .into_iter()
            .map(|(jurisdiction, tax_year, version)| YearRow {
                jurisdiction: jurisdiction.to_string(),
                tax_year: tax_year.display(),
                version,
            })
            .collect();

        let table = Table::new(&rows).with(Style::rounded()).to_string();
        println!("{table}");
        Ok(())
    }
}
