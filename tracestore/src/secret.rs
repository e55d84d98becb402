//! Installation secret resolution.
//!
//! The secret seeds the keystream and therefore the log file name. It must
//! stay fixed for the lifetime of an installation: a new secret starts a new,
//! empty log rather than making the old one unreadable.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write as _};
use std::path::Path;

use rand::Rng;
use tracing::info;

use crate::config::{ConfigError, SecretSource};

const GENERATED_SECRET_BYTES: usize = 32;

/// Resolve the configured secret into raw key material.
///
/// # Errors
///
/// Returns [`ConfigError::EmptySecret`] for a blank secret and
/// [`ConfigError::SecretIo`] when the secret file cannot be read or created.
pub fn resolve(source: &SecretSource) -> Result<Vec<u8>, ConfigError> {
    let secret = match source {
        SecretSource::Inline(secret) => secret.trim().to_owned(),
        SecretSource::File(path) => load_or_create(path)?,
    };
    if secret.is_empty() {
        return Err(ConfigError::EmptySecret);
    }
    Ok(secret.into_bytes())
}

/// Read the secret file, generating a random one if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::SecretIo`] on filesystem failures.
pub fn load_or_create(path: &Path) -> Result<String, ConfigError> {
    let io_err = |source| ConfigError::SecretIo { path: path.to_path_buf(), source };

    match fs::read_to_string(path) {
        Ok(secret) => return Ok(secret.trim().to_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(e)),
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let secret = generate_secret();
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    match options.open(path) {
        Ok(mut file) => {
            file.write_all(secret.as_bytes()).map_err(io_err)?;
            info!(path = %path.display(), "generated installation secret");
            Ok(secret)
        }
        // Lost a race with another process creating it first.
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            fs::read_to_string(path).map(|s| s.trim().to_owned()).map_err(io_err)
        }
        Err(e) => Err(io_err(e)),
    }
}

fn generate_secret() -> String {
    let bytes: [u8; GENERATED_SECRET_BYTES] = rand::rng().random();
    let mut s = String::with_capacity(GENERATED_SECRET_BYTES * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
#[path = "secret_test.rs"]
mod tests;
