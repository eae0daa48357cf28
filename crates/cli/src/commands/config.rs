use safework_core::config::{AppConfig, LoadOptions, LogFormat};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let format = match config.logging.format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    };

    let mut lines =
        vec!["effective config (source precedence: overrides > env > file > default):".to_string()];

    lines.push(format!("  database.url = {}", config.database.url));
    lines.push(format!("  database.max_connections = {}", config.database.max_connections));
    lines.push(format!("  database.timeout_secs = {}", config.database.timeout_secs));
    lines.push(format!("  server.bind_address = {}", config.server.bind_address));
    lines.push(format!("  server.api_port = {}", config.server.api_port));
    lines.push(format!("  server.health_check_port = {}", config.server.health_check_port));
    lines.push(format!(
        "  server.graceful_shutdown_secs = {}",
        config.server.graceful_shutdown_secs
    ));
    lines.push(format!("  notify.enabled = {}", config.notify.enabled));
    lines.push(format!(
        "  notify.gateway_url = {}",
        config.notify.gateway_url.as_deref().unwrap_or("<unset>")
    ));
    lines.push(format!(
        "  notify.api_token = {}",
        if config.notify.api_token.is_some() { "<redacted>" } else { "<unset>" }
    ));
    lines.push(format!("  notify.from_address = {}", config.notify.from_address));
    lines.push(format!("  notify.timeout_secs = {}", config.notify.timeout_secs));
    lines.push(format!("  notify.max_retries = {}", config.notify.max_retries));
    lines.push(format!("  logging.level = {}", config.logging.level));
    lines.push(format!("  logging.format = {format}"));

    lines.join("\n")
}
