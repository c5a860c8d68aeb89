mod cli;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    if let Some(command) = &cli.command {
        return match command {
            Command::Catalog(args) => run::print_catalog(&cli, args),
            Command::Check => run::check_catalog(&cli),
        };
    }
    run::run(cli)
}
