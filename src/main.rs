use clap::{Parser, Subcommand};
use dualtax::cmd::{
    calculate::CalculateCommand, residency::ResidencyCommand, schema::SchemaCommand,
    years::YearsCommand,
};

#[derive(Parser, Debug)]
#[command(name = "dualtax", version, about = "UK & SA cross-border tax calculator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a composite tax calculation from a request file
    Calculate(CalculateCommand),
    /// Determine residency and domicile from a facts file
    Residency(ResidencyCommand),
    /// List published tax year configurations
    Years(YearsCommand),
    /// Print input JSON schemas
    Schema(SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Calculate(cmd) => cmd.exec(),
        Command::Residency(cmd) => cmd.exec(),
        Command::Years(cmd) => cmd.exec(),
        Command::Schema(cmd) => cmd.exec(),
    }
}
