use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &LauncherConfig) -> Result<()> {
    validate_log_level(&config.log_level)?;
    validate_command(&config.command)?;

    if let Some(ref exe_name) = config.exe_name {
        validate_exe_name(exe_name)?;
    }

    Ok(())
}

fn validate_log_level(level: &str) -> Result<()> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            level
        )),
    }
}

/// The child can only find its channel through an argument, so the
/// template must mention the placeholder somewhere.
fn validate_command(command: &[String]) -> Result<()> {
    let program = command
        .first()
        .ok_or_else(|| anyhow!("Command cannot be empty"))?;

    if program.trim().is_empty() {
        return Err(anyhow!("Program name cannot be empty"));
    }

    if let Some(arg) = command.iter().find(|arg| arg.contains('\0')) {
        return Err(anyhow!("Argument contains a NUL byte: {:?}", arg));
    }

    if !command.iter().any(|arg| arg.contains(FD_PLACEHOLDER)) {
        return Err(anyhow!(
            "Command must pass the channel to the child: no argument contains {}",
            FD_PLACEHOLDER
        ));
    }

    Ok(())
}

fn validate_exe_name(exe_name: &str) -> Result<()> {
    if exe_name.is_empty() {
        return Err(anyhow!("exe_name cannot be empty when set"));
    }

    if !exe_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(anyhow!(
            "exe_name can only contain alphanumeric characters, dots, hyphens, and underscores: {}",
            exe_name
        ));
    }

    Ok(())
}
