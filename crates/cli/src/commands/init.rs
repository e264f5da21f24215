//! `promptgraph init`: write the default config file.

use promptgraph_config::AppConfig;
use std::path::Path;

pub async fn run(config: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config {
        Some(path) => path.to_path_buf(),
        None => AppConfig::config_dir().join("config.toml"),
    };

    if config_path.exists() && !force {
        println!("  Config already exists: {}", config_path.display());
        println!("  Use --force to overwrite it.");
        return Ok(());
    }

    if let Some(dir) = config_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Wrote {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  promptgraph analyze graph.json");
    println!("  promptgraph budget graph.json --budget 8000");

    Ok(())
}
