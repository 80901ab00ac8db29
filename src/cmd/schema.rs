//! Schema command - print expected input formats.

use crate::engine::TaxCalculationRequest;
use crate::residency::ResidencyFacts;
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Which input schema to print
    #[arg(value_enum, default_value = "request")]
    target: SchemaTarget,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaTarget {
    /// JSON Schema for the calculation request
    Request,
    /// JSON Schema for residency facts
    Facts,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let schema = match self.target {
            SchemaTarget::Request => schema_for!(TaxCalculationRequest),
            SchemaTarget::Facts => schema_for!(ResidencyFacts),
        };
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }
}
