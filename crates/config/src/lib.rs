//! INI-style configuration file parser
//!
//! Section-fallback key lookup plus a small typed-option layer, in the
//! style of a Ceph-conf reader: sections are looked up in priority order
//! (e.g. a per-volume section, then `client`, then `global`) so the same
//! file can carry both defaults and overrides.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config value: {0}")]
    Parse(String),

    #[error("missing required option: {0}")]
    MissingOption(String),
}

/// Trait for types that can be parsed from a config value string.
pub trait ConfigValue: Sized + Clone {
    fn parse_config_value(s: &str) -> Result<Self, ConfigError>;
    fn type_name() -> &'static str;
}

/// Size value in bytes (supports SI/IEC prefixes: K, M, G, T, KB, MB, GB, TB).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size(pub u64);

impl ConfigValue for Size {
    fn parse_config_value(s: &str) -> Result<Self, ConfigError> {
        parse_size(s).map(Size)
    }

    fn type_name() -> &'static str {
        "size"
    }
}

/// Duration value (supports time units: s, ms, us, m, h, d).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration(pub std::time::Duration);

impl ConfigValue for Duration {
    fn parse_config_value(s: &str) -> Result<Self, ConfigError> {
        parse_duration(s).map(Duration)
    }

    fn type_name() -> &'static str {
        "duration"
    }
}

/// Count value (plain integer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count(pub u64);

impl ConfigValue for Count {
    fn parse_config_value(s: &str) -> Result<Self, ConfigError> {
        s.parse()
            .map(Count)
            .map_err(|_| ConfigError::Parse(format!("invalid count: {s}")))
    }

    fn type_name() -> &'static str {
        "count"
    }
}

impl ConfigValue for bool {
    fn parse_config_value(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ConfigError::Parse(format!("invalid bool: {s}"))),
        }
    }

    fn type_name() -> &'static str {
        "bool"
    }
}

impl ConfigValue for String {
    fn parse_config_value(s: &str) -> Result<Self, ConfigError> {
        Ok(s.to_string())
    }

    fn type_name() -> &'static str {
        "string"
    }
}

/// A configuration option with name, type, and default value.
pub struct ConfigOption<T: ConfigValue> {
    name: &'static str,
    default: T,
    description: Option<&'static str>,
}

impl<T: ConfigValue> ConfigOption<T> {
    pub const fn new(name: &'static str, default: T) -> Self {
        Self {
            name,
            default,
            description: None,
        }
    }

    pub const fn with_description(mut self, desc: &'static str) -> Self {
        self.description = Some(desc);
        self
    }

    pub fn get(&self, config: &IniConfig, sections: &[&str]) -> T {
        config
            .get_with_fallback(sections, self.name)
            .and_then(|s| T::parse_config_value(s).ok())
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn description(&self) -> Option<&'static str> {
        self.description
    }
}

fn parse_size(s: &str) -> Result<u64, ConfigError> {
    let s = s.trim().replace('_', "");

    let mut num_end = s.len();
    for (i, c) in s.chars().enumerate() {
        if !c.is_ascii_digit() && c != '.' {
            num_end = i;
            break;
        }
    }

    let num_str = &s[..num_end];
    let unit = s[num_end..].to_uppercase();

    let num: f64 = num_str
        .parse()
        .map_err(|_| ConfigError::Parse(format!("invalid number: {num_str}")))?;

    let multiplier: u64 = match unit.as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        "T" | "TB" => 1024 * 1024 * 1024 * 1024,
        _ => return Err(ConfigError::Parse(format!("unknown size unit: {unit}"))),
    };

    Ok((num * multiplier as f64) as u64)
}

fn parse_duration(s: &str) -> Result<std::time::Duration, ConfigError> {
    let s = s.trim();

    let mut num_end = s.len();
    for (i, c) in s.chars().enumerate() {
        if !c.is_ascii_digit() && c != '.' {
            num_end = i;
            break;
        }
    }

    let num_str = &s[..num_end];
    let unit = s[num_end..].trim().to_lowercase();

    let num: f64 = num_str
        .parse()
        .map_err(|_| ConfigError::Parse(format!("invalid number: {num_str}")))?;

    let seconds = match unit.as_str() {
        "" | "s" | "sec" | "second" | "seconds" => num,
        "ms" | "msec" | "millisecond" | "milliseconds" => num / 1000.0,
        "us" | "usec" | "microsecond" | "microseconds" => num / 1_000_000.0,
        "m" | "min" | "minute" | "minutes" => num * 60.0,
        "h" | "hr" | "hour" | "hours" => num * 3600.0,
        "d" | "day" | "days" => num * 86400.0,
        _ => return Err(ConfigError::Parse(format!("unknown time unit: {unit}"))),
    };

    Ok(std::time::Duration::from_secs_f64(seconds))
}

/// A parsed INI-style configuration: `[section]` headers, `key = value`
/// pairs, `;`/`#` comments. Keys default into an implicit `global` section.
#[derive(Debug, Clone)]
pub struct IniConfig {
    sections: HashMap<String, HashMap<String, String>>,
}

impl IniConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current_section = String::from("global");

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].to_string();
                sections.entry(current_section.clone()).or_default();
                continue;
            }

            if let Some(eq_pos) = line.find('=') {
                let key = line[..eq_pos].trim().to_string();
                let value = line[eq_pos + 1..].trim().to_string();

                sections
                    .entry(current_section.clone())
                    .or_default()
                    .insert(key, value);
            }
        }

        Ok(Self { sections })
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(|v| v.as_str())
    }

    /// Checks sections in priority order, returning the first match.
    pub fn get_with_fallback(&self, sections: &[&str], key: &str) -> Option<&str> {
        for section in sections {
            if let Some(value) = self.get(section, key) {
                return Some(value);
            }
        }
        None
    }

    pub fn sections(&self) -> Vec<&str> {
        self.sections.keys().map(|s| s.as_str()).collect()
    }

    pub fn keys(&self, section: &str) -> Vec<&str> {
        self.sections
            .get(section)
            .map(|s| s.keys().map(|k| k.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Define a configuration struct with typed options loaded from an
/// [`IniConfig`], with section fallback and compile-time defaults.
#[macro_export]
macro_rules! define_options {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field:ident: $ty:ty = $default:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field: $ty,
            )*
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: $default,
                    )*
                }
            }

            pub fn from_config(config: &$crate::IniConfig, sections: &[&str]) -> Self {
                Self {
                    $(
                        $field: {
                            let opt = $crate::ConfigOption::new(stringify!($field), $default);
                            opt.get(config, sections)
                        },
                    )*
                }
            }

            pub fn option_names() -> &'static [&'static str] {
                &[
                    $(stringify!($field),)*
                ]
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CONFIG: &str = r#"
; test configuration
[global]
lease_timeout_ms = 15000
osd_rpc_timeout_ms = 30000

[coordinator]
capability_timeout = 120s
advertised_address = xlocsetd-1.example.internal:6789
"#;

    #[test]
    fn parses_sections_and_keys() {
        let config = IniConfig::parse(TEST_CONFIG).unwrap();
        assert_eq!(config.get("global", "lease_timeout_ms"), Some("15000"));
        assert_eq!(
            config.get("coordinator", "capability_timeout"),
            Some("120s")
        );
    }

    #[test]
    fn fallback_checks_sections_in_order() {
        let config = IniConfig::parse(TEST_CONFIG).unwrap();
        assert_eq!(
            config.get_with_fallback(&["coordinator", "global"], "lease_timeout_ms"),
            Some("15000")
        );
        assert_eq!(
            config.get_with_fallback(&["coordinator", "global"], "nonexistent"),
            None
        );
    }

    #[test]
    fn parses_size_and_duration_suffixes() {
        assert_eq!(parse_size("100M").unwrap(), 100 * 1024 * 1024);
        assert_eq!(
            parse_duration("120s").unwrap(),
            std::time::Duration::from_secs(120)
        );
        assert_eq!(
            parse_duration("15000ms").unwrap(),
            std::time::Duration::from_millis(15000)
        );
    }

    #[test]
    fn define_options_loads_with_defaults_and_overrides() {
        define_options! {
            pub struct TestOptions {
                lease_timeout_ms: Count = Count(15000),
                capability_timeout: Duration = Duration(std::time::Duration::from_secs(60)),
                advertised_address: String = String::new(),
            }
        }

        let config = IniConfig::parse(TEST_CONFIG).unwrap();
        let opts = TestOptions::from_config(&config, &["coordinator", "global"]);
        assert_eq!(opts.lease_timeout_ms.0, 15000);
        assert_eq!(opts.capability_timeout.0, std::time::Duration::from_secs(120));
        assert_eq!(opts.advertised_address, "xlocsetd-1.example.internal:6789");

        let defaults = TestOptions::new();
        assert_eq!(defaults.lease_timeout_ms.0, 15000);
        assert_eq!(defaults.advertised_address, "");
    }
}
