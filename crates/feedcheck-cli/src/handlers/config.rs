//! Config command handler

use crate::config::Settings;
use crate::error::CliResult;
use crate::ConfigArgs;

/// Execute the config command
pub fn execute_config(settings: &Settings, args: &ConfigArgs) -> CliResult<()> {
    print!("{}", settings_yaml(settings, args)?);
    Ok(())
}

/// YAML shown by the config command
pub fn settings_yaml(settings: &Settings, args: &ConfigArgs) -> CliResult<String> {
    if args.defaults {
        Settings::default().to_yaml()
    } else {
        settings.to_yaml()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_settings() {
        let settings = Settings {
            target_count: 7,
            ..Settings::default()
        };
        let yaml = settings_yaml(&settings, &ConfigArgs { defaults: false }).unwrap();
        assert!(yaml.contains("target_count: 7"));
    }

    #[test]
    fn test_defaults_ignore_loaded_settings() {
        let settings = Settings {
            target_count: 7,
            ..Settings::default()
        };
        let yaml = settings_yaml(&settings, &ConfigArgs { defaults: true }).unwrap();
        assert!(yaml.contains("target_count: 100"));
        assert!(yaml.contains("coverage_threshold: 0.7"));
    }
}
