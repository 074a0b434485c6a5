use serde::Deserialize;
use std::path::PathBuf;

static DEFAULT_CONFIG: &str = include_str!("default_config.toml");

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub fonts: FontConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("document.md"),
            output: PathBuf::from("document.pdf"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub system: bool,
    pub embedded: bool,
    pub sans_serif: Vec<String>,
    pub serif: Vec<String>,
    pub monospace: Vec<String>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            system: true,
            embedded: true,
            sans_serif: vec!["DejaVu Sans".to_string()],
            serif: vec!["Libertinus Serif".to_string()],
            monospace: vec!["DejaVu Sans Mono".to_string()],
        }
    }
}

impl FontConfig {
    /// Expand a CSS `font-family` list into concrete family names.
    ///
    /// Generic families are replaced by the configured lists; duplicates are
    /// dropped so the first occurrence keeps its priority.
    pub fn resolve_families(&self, families: &[String]) -> Vec<String> {
        let mut resolved: Vec<String> = Vec::new();
        for family in families {
            let expanded: &[String] = match family.to_ascii_lowercase().as_str() {
                "sans-serif" | "system-ui" => &self.sans_serif,
                "serif" => &self.serif,
                "monospace" => &self.monospace,
                _ => std::slice::from_ref(family),
            };
            for name in expanded {
                if !resolved.iter().any(|r| r.eq_ignore_ascii_case(name)) {
                    resolved.push(name.clone());
                }
            }
        }
        resolved
    }
}

impl Config {
    /// The settings compiled into the binary from `default_config.toml`.
    pub fn compiled_default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("default_config.toml is validated by build.rs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_default_parses() {
        let config = Config::compiled_default();
        assert_eq!(config.paths.input, PathBuf::from("document.md"));
        assert_eq!(config.paths.output, PathBuf::from("document.pdf"));
        assert!(config.fonts.embedded);
        assert_eq!(config.fonts.sans_serif[0], "Helvetica Neue");
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str("[fonts]\nsystem = false\n").unwrap();
        assert!(!config.fonts.system);
        assert!(config.fonts.embedded);
        assert_eq!(config.paths.output, PathBuf::from("document.pdf"));
    }

    #[test]
    fn generic_families_expand() {
        let fonts = FontConfig {
            sans_serif: vec!["Arial".to_string(), "DejaVu Sans".to_string()],
            ..FontConfig::default()
        };
        let css = vec![
            "Helvetica".to_string(),
            "Arial".to_string(),
            "sans-serif".to_string(),
        ];
        assert_eq!(
            fonts.resolve_families(&css),
            vec!["Helvetica", "Arial", "DejaVu Sans"]
        );
    }
}
