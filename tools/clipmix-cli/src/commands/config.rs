//! Show or write the configuration file.

use clipmix_common::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, write: bool) -> anyhow::Result<()> {
    let path = config_file_path();
    if write {
        config.save()?;
        println!("Configuration written to: {}", path.display());
        return Ok(());
    }

    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
