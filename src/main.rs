use clap::Parser;
use tradesim::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    tradesim::cli::init_tracing(&cli.log_level);
    run(cli)
}
