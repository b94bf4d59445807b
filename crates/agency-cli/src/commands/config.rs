//! `agency config` — print the public configuration.

pub fn run() -> Result<(), String> {
    let settings = super::load_settings()?;
    let value = serde_json::to_value(settings.public_view())
        .map_err(|e| format!("Failed to serialize configuration: {}", e))?;
    super::print_json(&value);
    Ok(())
}
