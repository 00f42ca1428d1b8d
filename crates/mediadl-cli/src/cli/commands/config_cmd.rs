//! Show the resolved configuration.

use console::style;

use mediadl::{Config, Settings};

pub fn cmd_config_show(settings: &Settings, config: &Config, json: bool) -> anyhow::Result<()> {
    let optional = |p: &Option<std::path::PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    };

    if json {
        let value = serde_json::json!({
            "source": config.source_path,
            "download_dir": settings.download_dir,
            "overwrite": settings.overwrite,
            "delete_file_path": settings.delete_file_path,
            "delete_dir_path": settings.delete_dir_path,
            "timeout_seconds": settings.default_timeout.as_secs(),
            "ffmpeg": settings.ffmpeg,
            "ffprobe": settings.ffprobe,
            "user_agent": settings.user_agent,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let source = config
        .source_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults (no config file found)".to_string());

    println!("{}", style("Configuration").bold());
    println!("  {:<18} {}", "source", style(source).dim());
    println!("  {:<18} {}", "download_dir", settings.download_dir.display());
    println!("  {:<18} {}", "overwrite", settings.overwrite);
    println!(
        "  {:<18} {}",
        "delete_file_path",
        optional(&settings.delete_file_path)
    );
    println!(
        "  {:<18} {}",
        "delete_dir_path",
        optional(&settings.delete_dir_path)
    );
    println!(
        "  {:<18} {}s",
        "timeout",
        settings.default_timeout.as_secs()
    );
    println!("  {:<18} {}", "ffmpeg", settings.ffmpeg.display());
    println!("  {:<18} {}", "ffprobe", settings.ffprobe.display());
    println!("  {:<18} {}", "user_agent", settings.user_agent);
    Ok(())
}
