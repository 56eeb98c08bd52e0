use std::time::Duration;

use bemidb_pg_catalog::CatalogConfig;
use getset::{Getters, Setters, WithSetters};

/// Runtime configuration of the gateway, populated from flags and
/// `BEMIDB_*` environment variables by the CLI.
#[derive(Getters, Setters, WithSetters, Clone, Debug)]
#[getset(get = "pub", set = "pub", set_with = "pub")]
pub struct GatewayConfig {
    host: String,
    port: u16,
    database: String,
    user: String,
    password: Option<String>,
    max_connections: usize,
    query_timeout: Duration,
    memory_limit: Option<String>,
    temp_directory: Option<String>,
    threads: Option<u16>,
    /// Connection URL of the lakehouse catalog database.
    ducklake_catalog_url: Option<String>,
    /// Object storage prefix holding the columnar data files.
    ducklake_data_path: Option<String>,
    r2_endpoint: Option<String>,
    r2_access_key_id: Option<String>,
    r2_secret_access_key: Option<String>,
    r2_bucket: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            host: "0.0.0.0".to_string(),
            port: 54321,
            database: "bemidb".to_string(),
            user: "bemidb".to_string(),
            password: None,
            max_connections: 100,
            query_timeout: Duration::from_secs(300),
            memory_limit: None,
            temp_directory: None,
            threads: None,
            ducklake_catalog_url: None,
            ducklake_data_path: None,
            r2_endpoint: None,
            r2_access_key_id: None,
            r2_secret_access_key: None,
            r2_bucket: None,
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        GatewayConfig::default()
    }

    /// Catalog-facing slice of this configuration.
    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig {
            database: self.database.clone(),
            user: self.user.clone(),
            ..CatalogConfig::default()
        }
    }

    /// `start` refuses to run without the lakehouse catalog coordinates.
    pub fn validate_for_start(&self) -> Result<(), String> {
        if self.ducklake_catalog_url.is_none() {
            return Err("missing lakehouse catalog URL (--ducklake-catalog-url / BEMIDB_DUCKLAKE_CATALOG_URL)".to_string());
        }
        if self.ducklake_data_path.is_none() {
            return Err(
                "missing lakehouse data path (--ducklake-data-path / BEMIDB_DUCKLAKE_DATA_PATH)"
                    .to_string(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.host(), "0.0.0.0");
        assert_eq!(*config.port(), 54321);
        assert_eq!(config.database(), "bemidb");
        assert_eq!(*config.max_connections(), 100);
        assert_eq!(*config.query_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_start_validation_requires_catalog_coordinates() {
        let config = GatewayConfig::default();
        assert!(config.validate_for_start().is_err());

        let config = config
            .with_ducklake_catalog_url(Some("postgres://catalog".to_string()))
            .with_ducklake_data_path(Some("s3://bucket/data".to_string()));
        assert!(config.validate_for_start().is_ok());
    }
}
