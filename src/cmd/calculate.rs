//! Calculate command - run a composite calculation from a request file.

use crate::bands::BandSlice;
use crate::cmd::read_json;
use crate::config::ConfigRepository;
use crate::engine::{SaAssessment, TaxCalculationRequest, TaxCalculationResult, TaxEngine, UkAssessment};
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};

#[derive(Args, Debug)]
pub struct CalculateCommand {
    /// Calculation request JSON (or - for stdin)
    #[arg(short, long)]
    request: PathBuf,

    /// Additional tax year configurations to publish before calculating
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output the full result as JSON instead of formatted text
    #[arg(long)]
    json: bool,

    /// Output the per-band breakdown as CSV
    #[arg(long)]
    csv: bool,
}

#[derive(Debug, Clone, Tabled)]
struct BandRow {
    #[tabled(rename = "Jurisdiction")]
    jurisdiction: String,
    #[tabled(rename = "Band")]
    band: String,
    #[tabled(rename = "Rate")]
    rate: String,
    #[tabled(rename = "Taxable")]
    taxable: String,
    #[tabled(rename = "Tax")]
    tax: String,
}

/// CSV record for band breakdown output.
#[derive(Debug, Serialize)]
struct BandCsvRecord {
    jurisdiction: String,
    section: String,
    band: String,
    rate: String,
    taxable: String,
    tax: String,
}

impl CalculateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let repository = Arc::new(ConfigRepository::builtin());
        if let Some(path) = &self.config {
            let count = repository.load_json(File::open(path)?)?;
            log::info!("published {count} configuration(s) from {}", path.display());
        }
        let engine = TaxEngine::new(repository);

        let request: TaxCalculationRequest = read_json(&self.request)?;
        let result = engine.calculate(&request)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else if self.csv {
            write_band_csv(&result, io::stdout())?;
        } else {
            print_summary(&result);
        }
        Ok(())
    }
}

fn band_rows<'a>(
    jurisdiction: &str,
    section: &str,
    slices: impl IntoIterator<Item = &'a BandSlice>,
) -> Vec<BandCsvRecord> {
    slices
        .into_iter()
        .map(|slice| BandCsvRecord {
            jurisdiction: jurisdiction.to_string(),
            section: section.to_string(),
            band: slice.band.clone(),
            rate: format!("{}", slice.rate),
            taxable: format!("{:.2}", slice.taxable),
            tax: format!("{:.2}", slice.tax),
        })
        .collect()
}

fn write_band_csv<W: io::Write>(result: &TaxCalculationResult, writer: W) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut records = Vec::new();
    if let Some(uk) = &result.uk {
        records.extend(band_rows("UK", "income", &uk.liability.income_tax.breakdown.slices));
        records.extend(band_rows("UK", "dividends", &uk.liability.dividend_tax.breakdown.slices));
    }
    if let Some(sa) = &result.sa {
        records.extend(band_rows("SA", "income", &sa.liability.income_tax.breakdown.slices));
    }
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn print_summary(result: &TaxCalculationResult) {
    println!();
    println!("TAX CALCULATION ({})", result.tax_year);
    println!();

    println!("RESIDENCY");
    println!(
        "  UK: {} | SA: {} | Treaty residence: {:?} (resolved by {})",
        if result.residency.uk_resident { "resident" } else { "non-resident" },
        if result.residency.sa_resident { "resident" } else { "non-resident" },
        result.treaty_residence.residence,
        result.treaty_residence.resolved_by,
    );
    if result.residency.domicile.deemed_domiciled {
        println!("  Deemed UK domiciled");
    }
    println!();

    let mut rows: Vec<BandRow> = Vec::new();
    if let Some(uk) = &result.uk {
        rows.extend(table_rows("UK", &uk.liability.income_tax.breakdown.slices));
        rows.extend(table_rows("UK", &uk.liability.dividend_tax.breakdown.slices));
    }
    if let Some(sa) = &result.sa {
        rows.extend(table_rows("SA", &sa.liability.income_tax.breakdown.slices));
    }
    if !rows.is_empty() {
        let table = Table::new(&rows).with(Style::rounded()).to_string();
        println!("{table}");
        println!();
    }

    if let Some(uk) = &result.uk {
        print_uk(uk);
    }
    if let Some(sa) = &result.sa {
        print_sa(sa);
    }

    if !result.relief.is_empty() {
        println!("TREATY RELIEF");
        for relief in &result.relief {
            println!(
                "  {} ({:?}): source tax {:.2}, residence tax {:.2}, credit {:.2}",
                relief.item_id,
                relief.article,
                relief.source_tax,
                relief.residence_tax,
                relief.credit
            );
        }
        println!();
    }

    for warning in &result.warnings {
        println!("WARNING: {warning:?}");
    }
    println!("Audit record: {}", result.audit_record_id);
}

fn table_rows(jurisdiction: &str, slices: &[BandSlice]) -> Vec<BandRow> {
    slices
        .iter()
        .map(|slice| BandRow {
            jurisdiction: jurisdiction.to_string(),
            band: slice.band.clone(),
            rate: format!("{}%", slice.rate * Decimal::from(100)),
            taxable: format!("{:.2}", slice.taxable),
            tax: format!("{:.2}", slice.tax),
        })
        .collect()
}

fn print_uk(uk: &UkAssessment) {
    println!("UK ({:?})", uk.scope);
    println!(
        "  Income tax: £{:.2} (allowance £{:.2})",
        uk.liability.income_tax.breakdown.total_tax, uk.liability.income_tax.personal_allowance
    );
    println!(
        "  National Insurance: £{:.2} | Dividend tax: £{:.2} | CGT: £{:.2}",
        uk.liability.national_insurance.total,
        uk.liability.dividend_tax.breakdown.total_tax,
        uk.liability.property_gains.tax + uk.liability.other_gains.tax,
    );
    println!(
        "  Total: £{:.2} | Relief: £{:.2} | Due: £{:.2}",
        uk.liability.total_tax, uk.relief_applied, uk.total_due
    );
    println!();
}

fn print_sa(sa: &SaAssessment) {
    println!("SA ({:?})", sa.scope);
    println!(
        "  Income tax: R{:.2} (rebate R{:.2})",
        sa.liability.income_tax.tax_payable, sa.liability.income_tax.rebate_applied
    );
    println!(
        "  CGT: R{:.2} | Dividend withholding: R{:.2}",
        sa.liability.capital_gains.tax, sa.liability.dividend_withholding
    );
    println!(
        "  Total: R{:.2} | Relief: R{:.2} | Due: R{:.2}",
        sa.liability.total_tax, sa.relief_applied, sa.total_due
    );
    println!();
}
