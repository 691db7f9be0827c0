use std::io::{self, Write};

use anyhow::{bail, Result};
use rpassword::read_password;

/// Prompt for one of the mount secrets without echoing it.
///
/// For non-interactive use, pass the corresponding flag or environment
/// variable instead.
pub fn prompt_secret(label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush()?;

    let secret = read_password()?;
    if secret.is_empty() {
        bail!("{label} cannot be empty");
    }
    Ok(secret)
}

/// Resolve a secret from its flag value or an interactive prompt.
pub fn resolve_secret(provided: Option<String>, label: &str) -> Result<String> {
    match provided {
        Some(value) if !value.is_empty() => Ok(value),
        _ => prompt_secret(label),
    }
}
