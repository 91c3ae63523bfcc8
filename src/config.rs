use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub import: ImportConfig,
    #[serde(default)]
    pub collections: CollectionsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    /// Flat directory holding the `*_category.json`, `*_gallery.json` and
    /// `*_<blog_code>_blog.json` files.
    pub root: PathBuf,
    pub blog_code: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

/// Per-kind overrides for the target collection and business key.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CollectionsConfig {
    #[serde(default)]
    pub articles: CollectionOverride,
    #[serde(default)]
    pub categories: CollectionOverride,
    #[serde(default)]
    pub gallery: CollectionOverride,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CollectionOverride {
    pub name: Option<String>,
    pub key: Option<String>,
}

/// The three record families the site is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Articles,
    Categories,
    Gallery,
}

impl ImportKind {
    /// Order used by `import all`: categories and gallery entries first so
    /// articles never reference something that is not there yet.
    pub const ALL: [ImportKind; 3] = [
        ImportKind::Categories,
        ImportKind::Gallery,
        ImportKind::Articles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::Articles => "articles",
            ImportKind::Categories => "categories",
            ImportKind::Gallery => "gallery",
        }
    }

    fn default_collection(&self) -> &'static str {
        match self {
            ImportKind::Articles => "blog",
            ImportKind::Categories => "category",
            ImportKind::Gallery => "gallery",
        }
    }

    fn default_key(&self) -> &'static str {
        match self {
            ImportKind::Articles => "blog_id",
            ImportKind::Categories => "category_id",
            ImportKind::Gallery => "gallery_id",
        }
    }

    /// Filename ending that selects this kind's files.
    pub fn suffix(&self, blog_code: &str) -> String {
        match self {
            ImportKind::Articles => format!("_{}_blog.json", blog_code),
            ImportKind::Categories => "_category.json".to_string(),
            ImportKind::Gallery => "_gallery.json".to_string(),
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ImportKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "articles" => Ok(ImportKind::Articles),
            "categories" => Ok(ImportKind::Categories),
            "gallery" => Ok(ImportKind::Gallery),
            other => bail!(
                "Unknown import kind: '{}'. Available: articles, categories, gallery, all",
                other
            ),
        }
    }
}

/// Fully resolved import settings for one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportTarget {
    pub kind: ImportKind,
    pub root: PathBuf,
    pub collection: String,
    pub key_field: String,
    pub suffix: String,
}

impl Config {
    pub fn target(&self, kind: ImportKind) -> ImportTarget {
        let overrides = match kind {
            ImportKind::Articles => &self.collections.articles,
            ImportKind::Categories => &self.collections.categories,
            ImportKind::Gallery => &self.collections.gallery,
        };
        ImportTarget {
            kind,
            root: self.import.root.clone(),
            collection: overrides
                .name
                .clone()
                .unwrap_or_else(|| kind.default_collection().to_string()),
            key_field: overrides
                .key
                .clone()
                .unwrap_or_else(|| kind.default_key().to_string()),
            suffix: kind.suffix(&self.import.blog_code),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.import.blog_code.trim().is_empty() {
        bail!("import.blog_code must not be empty");
    }
    if config.import.max_retries > 10 {
        bail!("import.max_retries must be <= 10");
    }

    for kind in ImportKind::ALL {
        let target = config.target(kind);
        if target.collection.trim().is_empty() {
            bail!("collections.{}.name must not be empty", kind);
        }
        if target.key_field.trim().is_empty() {
            bail!("collections.{}.key must not be empty", kind);
        }
    }

    Ok(())
}
