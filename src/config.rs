use std::path::PathBuf;

use anyhow::Context as _;

pub const DEFAULT_DRIVE_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart&fields=id";

#[derive(Debug, Clone)]
pub struct Config {
    pub clients_db_path: PathBuf,
    pub profiles_db_path: PathBuf,
    pub port: u16,
    /// Admin routes are disabled when unset
    pub admin_password: Option<String>,
    pub google_token_path: PathBuf,
    pub drive_folder_id: Option<String>,
    pub drive_upload_url: String,
    pub upload_staging_dir: PathBuf,
    pub simulations_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            clients_db_path: PathBuf::from("clientes.db"),
            profiles_db_path: PathBuf::from("client_profiles.db"),
            port: 3000,
            admin_password: None,
            google_token_path: PathBuf::from("token.json"),
            drive_folder_id: None,
            drive_upload_url: DEFAULT_DRIVE_UPLOAD_URL.to_string(),
            upload_staging_dir: PathBuf::from("uploads"),
            simulations_dir: PathBuf::from("simulations"),
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (environment, test map, ...)
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Config {
            clients_db_path: non_empty("CLIENTS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.clients_db_path),
            profiles_db_path: non_empty("PROFILES_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.profiles_db_path),
            port: match lookup("PORT") {
                Some(port) => port
                    .trim()
                    .parse()
                    .with_context(|| format!("PORT must be a valid number between 1-65535, got {:?}", port))?,
                None => defaults.port,
            },
            admin_password: match lookup("ADMIN_PASSWORD") {
                Some(pass) if pass.trim().is_empty() => {
                    anyhow::bail!("ADMIN_PASSWORD cannot be empty (unset it to disable admin routes)")
                }
                other => other,
            },
            google_token_path: non_empty("GOOGLE_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.google_token_path),
            drive_folder_id: non_empty("DRIVE_FOLDER_ID"),
            drive_upload_url: non_empty("DRIVE_UPLOAD_URL")
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("DRIVE_UPLOAD_URL must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?
                .unwrap_or(defaults.drive_upload_url),
            upload_staging_dir: non_empty("UPLOAD_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_staging_dir),
            simulations_dir: non_empty("SIMULATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.simulations_dir),
            max_upload_bytes: match lookup("MAX_UPLOAD_BYTES") {
                Some(limit) => limit
                    .trim()
                    .parse()
                    .with_context(|| format!("MAX_UPLOAD_BYTES must be a byte count, got {:?}", limit))?,
                None => defaults.max_upload_bytes,
            },
        };

        // Never log the admin password itself
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Clients store: {}", config.clients_db_path.display());
        tracing::debug!("Profiles store: {}", config.profiles_db_path.display());
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!("Admin routes enabled: {}", config.admin_password.is_some());
        if let Some(ref folder) = config.drive_folder_id {
            tracing::info!("Drive folder configured: {}", folder);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.clients_db_path, PathBuf::from("clientes.db"));
        assert_eq!(config.profiles_db_path, PathBuf::from("client_profiles.db"));
        assert_eq!(config.port, 3000);
        assert!(config.admin_password.is_none());
        assert_eq!(config.drive_upload_url, DEFAULT_DRIVE_UPLOAD_URL);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CLIENTS_DB_PATH", "/tmp/c.db"),
            ("PORT", "8080"),
            ("ADMIN_PASSWORD", "s3cret"),
            ("DRIVE_FOLDER_ID", "folder-1"),
            ("MAX_UPLOAD_BYTES", "1024"),
        ]))
        .unwrap();

        assert_eq!(config.clients_db_path, PathBuf::from("/tmp/c.db"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.admin_password.as_deref(), Some("s3cret"));
        assert_eq!(config.drive_folder_id.as_deref(), Some("folder-1"));
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn test_invalid_port_is_error() {
        assert!(Config::from_lookup(lookup(&[("PORT", "not-a-port")])).is_err());
        assert!(Config::from_lookup(lookup(&[("PORT", "70000")])).is_err());
    }

    #[test]
    fn test_empty_admin_password_is_error() {
        assert!(Config::from_lookup(lookup(&[("ADMIN_PASSWORD", "  ")])).is_err());
    }

    #[test]
    fn test_upload_url_must_be_http() {
        assert!(Config::from_lookup(lookup(&[("DRIVE_UPLOAD_URL", "ftp://x")])).is_err());
    }
}
