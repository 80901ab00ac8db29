//! Residency command - run the determination engine on a facts file.

use crate::cmd::read_json;
use crate::residency::{determine_residency, ResidencyFacts};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ResidencyCommand {
    /// Residency facts JSON (or - for stdin)
    #[arg(short, long)]
    facts: PathBuf,

    /// Output the determination as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

impl ResidencyCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let facts: ResidencyFacts = read_json(&self.facts)?;
        let determination = determine_residency(&facts);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&determination)?);
            return Ok(());
        }

        println!();
        println!("RESIDENCY DETERMINATION");
        println!(
            "  UK: {}",
            if determination.uk_resident {
                "resident"
            } else {
                "non-resident"
            }
        );
        println!(
            "  SA: {}",
            if determination.sa_resident {
                "resident"
            } else {
                "non-resident"
            }
        );
        println!(
            "  Domicile: {}{}",
            if determination.domicile.uk_domiciled {
                "UK"
            } else {
                "non-UK"
            },
            if determination.domicile.deemed_domiciled {
                " (deemed UK domiciled)"
            } else {
                ""
            }
        );
        println!();
        println!("DECISION PATH");
        for step in &determination.decision_path {
            println!("  {:48} {}", step.rule, step.outcome);
        }
        for warning in &determination.warnings {
            println!("WARNING: {warning:?}");
        }
        Ok(())
    }
}
