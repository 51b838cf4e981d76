use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, str::FromStr};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub thumbnail_size: u32,
    pub table: String,
    pub region: String,
    pub public_base_url: Option<String>,
    pub scan_page_size: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Upload-triggered image thumbnail service")]
pub struct Args {
    /// Host to bind to (overrides THUMBNAILER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides THUMBNAILER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where objects are stored (overrides THUMBNAILER_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides THUMBNAILER_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Thumbnail edge length in pixels (overrides THUMBNAIL_SIZE)
    #[arg(long)]
    pub thumbnail_size: Option<u32>,

    /// Metadata table name (overrides METADATA_TABLE, then DYNAMODB_TABLE)
    #[arg(long)]
    pub table: Option<String>,

    /// Storage region identifier (overrides REGION_NAME)
    #[arg(long)]
    pub region: Option<String>,

    /// Base URL thumbnails are served from (overrides PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Records per metadata scan page (overrides SCAN_PAGE_SIZE)
    #[arg(long)]
    pub scan_page_size: Option<usize>,

    /// Create the database schema and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::from_sources(args, |name| env::var(name))?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values found through `lookup`, then validate.
    pub fn from_sources<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let text = |name: &str, default: &str| -> Result<String> {
            match lookup(name) {
                Ok(value) => Ok(value),
                Err(env::VarError::NotPresent) => Ok(default.to_string()),
                Err(err) => Err(err).with_context(|| format!("reading {}", name)),
            }
        };

        // First variable that is present wins.
        let first_of = |names: &[&str], default: &str| -> Result<String> {
            for &name in names {
                match lookup(name) {
                    Ok(value) => return Ok(value),
                    Err(env::VarError::NotPresent) => continue,
                    Err(err) => return Err(err).with_context(|| format!("reading {}", name)),
                }
            }
            Ok(default.to_string())
        };

        let cfg = Self {
            host: args.host.map_or_else(|| text("THUMBNAILER_HOST", "0.0.0.0"), Ok)?,
            port: args
                .port
                .map_or_else(|| parsed(&lookup, "THUMBNAILER_PORT", 3000), Ok)?,
            storage_dir: args
                .storage_dir
                .map_or_else(|| text("THUMBNAILER_STORAGE_DIR", "./data/objects"), Ok)?,
            database_url: args.database_url.map_or_else(
                || text("THUMBNAILER_DATABASE_URL", "sqlite://./data/meta/thumbnails.db"),
                Ok,
            )?,
            thumbnail_size: args
                .thumbnail_size
                .map_or_else(|| parsed(&lookup, "THUMBNAIL_SIZE", 128), Ok)?,
            table: args
                .table
                .map_or_else(|| first_of(&["METADATA_TABLE", "DYNAMODB_TABLE"], "thumbnail"), Ok)?,
            region: args
                .region
                .map_or_else(|| text("REGION_NAME", "us-east-1"), Ok)?
                .trim()
                .to_lowercase(),
            public_base_url: match args.public_base_url {
                Some(url) => Some(url),
                None => text("PUBLIC_BASE_URL", "")
                    .map(|url| Some(url).filter(|url| !url.is_empty()))?,
            },
            scan_page_size: args
                .scan_page_size
                .map_or_else(|| parsed(&lookup, "SCAN_PAGE_SIZE", 100), Ok)?,
        };

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.thumbnail_size == 0 {
            bail!("thumbnail size must be greater than zero");
        }
        if self.scan_page_size == 0 {
            bail!("scan page size must be greater than zero");
        }
        if self.region.is_empty() {
            bail!("region must not be blank");
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T, F>(lookup: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(args: Args, vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_sources(args, |name| {
            vars.get(name).cloned().ok_or(env::VarError::NotPresent)
        })
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = from_map(Args::default(), &[]).unwrap();
        assert_eq!(cfg.thumbnail_size, 128);
        assert_eq!(cfg.table, "thumbnail");
        assert_eq!(cfg.region, "us-east-1");
        assert_eq!(cfg.public_base_url, None);
        assert_eq!(cfg.scan_page_size, 100);
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = from_map(
            Args::default(),
            &[
                ("THUMBNAIL_SIZE", "256"),
                ("METADATA_TABLE", "thumbs"),
                ("REGION_NAME", "EU-WEST-1"),
                ("PUBLIC_BASE_URL", "http://localhost:3000/objects"),
            ],
        )
        .unwrap();
        assert_eq!(cfg.thumbnail_size, 256);
        assert_eq!(cfg.table, "thumbs");
        assert_eq!(cfg.region, "eu-west-1");
        assert_eq!(
            cfg.public_base_url.as_deref(),
            Some("http://localhost:3000/objects")
        );
    }

    #[test]
    fn cli_args_override_environment() {
        let args = Args::try_parse_from(["thumbnail-service", "--thumbnail-size", "64", "--port", "8080"])
            .unwrap();
        let cfg = from_map(args, &[("THUMBNAIL_SIZE", "256"), ("THUMBNAILER_PORT", "9000")]).unwrap();
        assert_eq!(cfg.thumbnail_size, 64);
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(from_map(Args::default(), &[("THUMBNAIL_SIZE", "big")]).is_err());
        assert!(from_map(Args::default(), &[("THUMBNAIL_SIZE", "0")]).is_err());
        assert!(from_map(Args::default(), &[("REGION_NAME", "  ")]).is_err());
        assert!(from_map(Args::default(), &[("SCAN_PAGE_SIZE", "0")]).is_err());
    }

    #[test]
    fn any_region_identifier_is_accepted() {
        for region in ["eu-central-1", "sa-east-1", "ca-central-1", "local"] {
            let cfg = from_map(Args::default(), &[("REGION_NAME", region)]).unwrap();
            assert_eq!(cfg.region, region);
        }
    }

    #[test]
    fn legacy_table_variable_is_a_fallback() {
        let cfg = from_map(Args::default(), &[("DYNAMODB_TABLE", "legacy")]).unwrap();
        assert_eq!(cfg.table, "legacy");

        let cfg = from_map(
            Args::default(),
            &[("DYNAMODB_TABLE", "legacy"), ("METADATA_TABLE", "thumbs")],
        )
        .unwrap();
        assert_eq!(cfg.table, "thumbs");
    }
}
