//! `loopwright config`: print the effective configuration.

use loopwright_config::AppConfig;

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let has_key = config.has_api_key();
    config.provider.api_key = None;

    println!(
        "# {}",
        AppConfig::config_dir().join("config.toml").display()
    );
    if has_key {
        println!("# provider.api_key is set (hidden)");
    }
    println!("{}", config.to_toml());
    Ok(())
}
