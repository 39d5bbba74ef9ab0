use clap::Parser;
use tracing_subscriber::EnvFilter;
use wafsmith::cli::{self, Cli, Commands, GlobalOptions};
use wafsmith::errors::WafsmithError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.with_ansi(!cli.no_color).init();
    }
    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let global = GlobalOptions {
        config: cli.config.as_deref(),
        quiet: cli.quiet,
    };
    let result = match cli.command {
        Commands::Create(args) => cli::create::handle_create(args, global).await,
        Commands::Evaluate(args) => cli::evaluate::handle_evaluate(args, global).await,
        Commands::Extract(args) => cli::extract::handle_extract(args, global).await,
        Commands::Validate(args) => cli::validate::handle_validate(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            WafsmithError::Config(_) => 2,
            WafsmithError::Environment(_) => 3,
            WafsmithError::Authentication(_) => 4,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}
