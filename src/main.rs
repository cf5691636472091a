mod cmd;
mod core;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dutyclaim")]
#[command(version)]
#[command(about = "Compute EU import VAT, customs duty and reclaims for a quarter of parcel data")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify and compute every line item, then show totals per category and country
    Run(cmd::run::RunCommand),
    /// Print the return forms: Dutch VAT return, OSS return, duty claim and revenue
    Returns(cmd::returns::ReturnsCommand),
    /// List rejected records; exits with status 1 if there are any
    Rejected(cmd::rejected::RejectedCommand),
    /// Print the expected input formats
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(run) => run.exec(),
        Command::Returns(returns) => returns.exec(),
        Command::Rejected(rejected) => rejected.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
