use crate::cli::commands::ValidateArgs;
use crate::config;
use crate::errors::WafsmithError;
use tracing::info;

pub async fn handle_validate(args: ValidateArgs) -> Result<(), WafsmithError> {
    let config = config::parse_config(&args.file).await?;
    let target = config.probe_target()?;
    info!(
        endpoint = %target.endpoint,
        method = %target.method,
        position = %target.position,
        threads = config.threads(),
        "Configuration resolved"
    );
    println!("Configuration is valid: {}", args.file.display());
    Ok(())
}
