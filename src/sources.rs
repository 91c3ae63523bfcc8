use anyhow::Result;

use crate::config::{Config, ImportKind};
use crate::import::discover;

/// Print each import kind with its collection, key, suffix and how many
/// files it would pick up right now.
pub fn list_sources(config: &Config) -> Result<()> {
    println!(
        "{:<12} {:<12} {:<14} {:<24} FILES",
        "KIND", "COLLECTION", "KEY", "SUFFIX"
    );

    for kind in ImportKind::ALL {
        let target = config.target(kind);
        let files = match discover(&target.root, &target.suffix) {
            Ok(files) => files.len().to_string(),
            Err(_) => "NOT FOUND (root does not exist)".to_string(),
        };
        println!(
            "{:<12} {:<12} {:<14} {:<24} {}",
            kind, target.collection, target.key_field, target.suffix, files
        );
    }

    println!();
    println!("root: {}", config.import.root.display());

    Ok(())
}
