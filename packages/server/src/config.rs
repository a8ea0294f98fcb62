use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// How the generated visual is represented on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetMode {
    /// A single emoji glyph stored inline
    #[default]
    Glyph,
    /// A generated sticker image stored as a blob, referenced by URL
    ImageAsset,
}

impl AssetMode {
    /// Key used for the created record in the upload response body.
    pub fn response_key(&self) -> &'static str {
        match self {
            AssetMode::Glyph => "emoji",
            AssetMode::ImageAsset => "sticker",
        }
    }
}

impl FromStr for AssetMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "glyph" => Ok(AssetMode::Glyph),
            "image-asset" | "image_asset" => Ok(AssetMode::ImageAsset),
            other => bail!("unknown asset mode '{}' (expected 'glyph' or 'image-asset')", other),
        }
    }
}

impl fmt::Display for AssetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetMode::Glyph => write!(f, "glyph"),
            AssetMode::ImageAsset => write!(f, "image-asset"),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub openai_api_key: String,
    pub asset_mode: AssetMode,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub vision_model: String,
    pub image_model: String,
    pub blob_dir: PathBuf,
    pub public_base_url: String,
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("PORT must be a valid number")?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port,
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            asset_mode: env::var("ASSET_MODE")
                .unwrap_or_else(|_| "glyph".to_string())
                .parse()
                .context("ASSET_MODE is invalid")?,
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            embedding_dimensions: env::var("EMBEDDING_DIMENSIONS")
                .unwrap_or_else(|_| "1536".to_string())
                .parse()
                .context("EMBEDDING_DIMENSIONS must be a positive integer")?,
            vision_model: env::var("VISION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            image_model: env::var("IMAGE_MODEL").unwrap_or_else(|_| "gpt-image-1".to_string()),
            blob_dir: env::var("BLOB_DIR")
                .unwrap_or_else(|_| "./data/blobs".to_string())
                .into(),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", port))
                .trim_end_matches('/')
                .to_string(),
            allowed_origins: parse_list(&env::var("ALLOWED_ORIGINS").unwrap_or_default()),
        })
    }

    /// Public URL prefix under which stored blobs are served.
    pub fn blob_base_url(&self) -> String {
        format!("{}/blobs", self.public_base_url)
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
