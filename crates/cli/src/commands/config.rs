//! Effective settings

use anyhow::{Context, Result};
use bankrecon_common::Settings;

use crate::args::GlobalArgs;
use crate::output::{print_json, print_success, OutputFormat};

pub fn execute(global: &GlobalArgs, save: bool) -> Result<()> {
    let settings = global.settings()?;
    let shown = redacted(&settings);
    match global.format {
        OutputFormat::Table => print!("{}", shown.to_toml()?),
        OutputFormat::Json => print_json(&shown),
    }

    if save {
        settings
            .save(&global.config)
            .with_context(|| format!("Failed to write {}", global.config.display()))?;
        print_success(&format!("Settings saved to {}", global.config.display()));
    }
    Ok(())
}

/// Settings with passwords masked
pub fn redacted(settings: &Settings) -> Settings {
    let mut settings = settings.clone();
    settings.site.password = "***".to_string();
    settings.api.password = "***".to_string();
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_masks_both_passwords() {
        let settings = redacted(&Settings::default());
        assert_eq!(settings.site.password, "***");
        assert_eq!(settings.api.password, "***");
        assert_eq!(settings.site.user, "jsmith");
    }
}
