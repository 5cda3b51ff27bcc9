//! File configuration for CLI defaults.
//!
//! `config.toml` holds flat `key = value` lines. CLI flags override it.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use resource_dl::user_agent::{ANDROID_CHROME_UA, DESKTOP_CHROME_UA, IPHONE_SAFARI_UA};
use resource_dl::{
    DEFAULT_MOBILE_RETRIGGER_DELAY, DEFAULT_REVOKE_GRACE, MobileTactics, StrategyTuning,
};

use crate::cli::{Args, Platform};

/// Defaults loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Directory to save into.
    pub output_dir: Option<PathBuf>,
    /// Maximum accepted payload size.
    pub size_limit_bytes: Option<u64>,
    /// Fetch timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// User-Agent used for platform detection.
    pub user_agent: Option<String>,
    /// Download counter endpoint.
    pub record_endpoint: Option<String>,
    /// Delay before releasing a blob after its trigger fired.
    pub revoke_grace_ms: Option<u64>,
    /// Re-trigger blob saves on non-iOS mobile.
    pub mobile_double_activate: Option<bool>,
    /// Delay before the mobile re-trigger.
    pub mobile_retrigger_delay_ms: Option<u64>,
    /// Whether new browsing contexts may be opened.
    pub allow_new_contexts: Option<bool>,
}

impl FileConfig {
    /// Validates values against the same ranges the CLI enforces.
    pub fn validate(&self) -> Result<()> {
        if self.size_limit_bytes == Some(0) {
            bail!("Invalid config value for `size_limit_bytes`: 0. Expected a positive size");
        }
        validate_millis("timeout_ms", self.timeout_ms, 1, 600_000)?;
        validate_millis("revoke_grace_ms", self.revoke_grace_ms, 0, 60_000)?;
        validate_millis(
            "mobile_retrigger_delay_ms",
            self.mobile_retrigger_delay_ms,
            0,
            10_000,
        )?;
        if let Some(endpoint) = &self.record_endpoint
            && url::Url::parse(endpoint).is_err()
        {
            bail!("Invalid config value for `record_endpoint`: '{endpoint}' is not a URL");
        }
        Ok(())
    }
}

/// Effective settings for one run: CLI flags over file config over defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub output_dir: PathBuf,
    pub size_limit_bytes: Option<u64>,
    pub timeout: Option<Duration>,
    pub user_agent: String,
    pub record_endpoint: Option<String>,
    pub allow_new_contexts: bool,
    pub tuning: StrategyTuning,
}

impl RunSettings {
    pub fn resolve(args: &Args, file: &FileConfig) -> Self {
        let user_agent = match (&args.user_agent, args.platform) {
            (Some(ua), _) => ua.clone(),
            (None, Some(platform)) => platform_user_agent(platform).to_string(),
            (None, None) => file
                .user_agent
                .clone()
                .unwrap_or_else(|| DESKTOP_CHROME_UA.to_string()),
        };

        let tuning = StrategyTuning {
            revoke_grace: file
                .revoke_grace_ms
                .map_or(DEFAULT_REVOKE_GRACE, Duration::from_millis),
            mobile: MobileTactics {
                double_activate: file.mobile_double_activate.unwrap_or(true),
                retrigger_delay: file
                    .mobile_retrigger_delay_ms
                    .map_or(DEFAULT_MOBILE_RETRIGGER_DELAY, Duration::from_millis),
            },
        };

        Self {
            output_dir: args
                .output_dir
                .clone()
                .or_else(|| file.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            size_limit_bytes: args.size_limit.or(file.size_limit_bytes),
            timeout: args
                .timeout_ms
                .or(file.timeout_ms)
                .map(Duration::from_millis),
            user_agent,
            record_endpoint: args
                .record_endpoint
                .clone()
                .or_else(|| file.record_endpoint.clone()),
            allow_new_contexts: !args.no_new_contexts && file.allow_new_contexts.unwrap_or(true),
            tuning,
        }
    }
}

fn platform_user_agent(platform: Platform) -> &'static str {
    match platform {
        Platform::Desktop => DESKTOP_CHROME_UA,
        Platform::Android => ANDROID_CHROME_UA,
        Platform::Ios => IPHONE_SAFARI_UA,
    }
}

fn validate_millis(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/resource-dl/config.toml`
/// 2. `$HOME/.config/resource-dl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("resource-dl")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("resource-dl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path, or defaults when there is none.
pub fn load_default_file_config() -> Result<FileConfig> {
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {}", line_index + 1);

        match key {
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(context)?,
                ));
            }
            "size_limit_bytes" => {
                cfg.size_limit_bytes = Some(parse_integer_u64(value).with_context(context)?);
            }
            "timeout_ms" => {
                cfg.timeout_ms = Some(parse_integer_u64(value).with_context(context)?);
            }
            "user_agent" => {
                cfg.user_agent = Some(parse_string_literal(value).with_context(context)?);
            }
            "record_endpoint" => {
                cfg.record_endpoint = Some(parse_string_literal(value).with_context(context)?);
            }
            "revoke_grace_ms" => {
                cfg.revoke_grace_ms = Some(parse_integer_u64(value).with_context(context)?);
            }
            "mobile_double_activate" => {
                cfg.mobile_double_activate = Some(parse_boolean(value).with_context(context)?);
            }
            "mobile_retrigger_delay_ms" => {
                cfg.mobile_retrigger_delay_ms =
                    Some(parse_integer_u64(value).with_context(context)?);
            }
            "allow_new_contexts" => {
                cfg.allow_new_contexts = Some(parse_boolean(value).with_context(context)?);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim().replace('_', "");
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_resolve_settings_defaults() {
        let args = Args::try_parse_from(["resource-dl", "https://h/x"]).unwrap();
        let settings = RunSettings::resolve(&args, &FileConfig::default());
        assert_eq!(settings.output_dir, PathBuf::from("."));
        assert_eq!(settings.user_agent, DESKTOP_CHROME_UA);
        assert!(settings.allow_new_contexts);
        assert!(settings.timeout.is_none());
        assert_eq!(settings.tuning, StrategyTuning::default());
    }

    #[test]
    fn test_resolve_settings_cli_overrides_file() {
        let args = Args::try_parse_from([
            "resource-dl",
            "https://h/x",
            "-o",
            "/cli",
            "-t",
            "50",
            "--platform",
            "ios",
            "--no-new-contexts",
        ])
        .unwrap();
        let file = FileConfig {
            output_dir: Some(PathBuf::from("/file")),
            timeout_ms: Some(9000),
            user_agent: Some("file-ua".to_string()),
            size_limit_bytes: Some(1024),
            allow_new_contexts: Some(true),
            ..FileConfig::default()
        };
        let settings = RunSettings::resolve(&args, &file);
        assert_eq!(settings.output_dir, PathBuf::from("/cli"));
        assert_eq!(settings.timeout, Some(Duration::from_millis(50)));
        assert_eq!(settings.user_agent, IPHONE_SAFARI_UA);
        assert_eq!(settings.size_limit_bytes, Some(1024));
        assert!(!settings.allow_new_contexts);
    }

    #[test]
    fn test_resolve_settings_file_tuning() {
        let args = Args::try_parse_from(["resource-dl", "https://h/x"]).unwrap();
        let file = FileConfig {
            user_agent: Some("file-ua".to_string()),
            revoke_grace_ms: Some(5),
            mobile_double_activate: Some(false),
            mobile_retrigger_delay_ms: Some(7),
            ..FileConfig::default()
        };
        let settings = RunSettings::resolve(&args, &file);
        assert_eq!(settings.user_agent, "file-ua");
        assert_eq!(settings.tuning.revoke_grace, Duration::from_millis(5));
        assert!(!settings.tuning.mobile.double_activate);
        assert_eq!(settings.tuning.mobile.retrigger_delay, Duration::from_millis(7));
    }

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
output_dir = "/tmp/downloads"
size_limit_bytes = 52_428_800
timeout_ms = 30000
user_agent = "Mozilla/5.0 (Linux; Android 14)"
record_endpoint = "https://api.example.com/rpc/increment_download_count"
revoke_grace_ms = 500
mobile_double_activate = false
mobile_retrigger_delay_ms = 250
allow_new_contexts = true
"#,
        )
        .expect("full config should parse");
        assert_eq!(cfg.output_dir, Some(PathBuf::from("/tmp/downloads")));
        assert_eq!(cfg.size_limit_bytes, Some(52_428_800));
        assert_eq!(cfg.timeout_ms, Some(30_000));
        assert_eq!(
            cfg.user_agent.as_deref(),
            Some("Mozilla/5.0 (Linux; Android 14)")
        );
        assert_eq!(cfg.revoke_grace_ms, Some(500));
        assert_eq!(cfg.mobile_double_activate, Some(false));
        assert_eq!(cfg.mobile_retrigger_delay_ms, Some(250));
        assert_eq!(cfg.allow_new_contexts, Some(true));
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
timeout_ms = 5000 # five seconds
user_agent = "a # not a comment"
"#,
        )
        .expect("config with comments should parse");
        assert_eq!(cfg.timeout_ms, Some(5000));
        assert_eq!(cfg.user_agent.as_deref(), Some("a # not a comment"));
    }

    #[test]
    fn test_parse_config_rejects_zero_timeout() {
        let err = parse_config_str("timeout_ms = 0").expect_err("invalid timeout expected");
        assert!(err.to_string().contains("timeout_ms"));
    }

    #[test]
    fn test_parse_config_rejects_zero_size_limit() {
        let err = parse_config_str("size_limit_bytes = 0").expect_err("invalid size expected");
        assert!(err.to_string().contains("size_limit_bytes"));
    }

    #[test]
    fn test_parse_config_rejects_bad_endpoint() {
        let err = parse_config_str(r#"record_endpoint = "not a url""#)
            .expect_err("invalid endpoint expected");
        assert!(err.to_string().contains("record_endpoint"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_key() {
        let err = parse_config_str("concurrency = 4").expect_err("unknown key expected");
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_boolean() {
        let err = parse_config_str("allow_new_contexts = yes").expect_err("invalid boolean");
        let chain = format!("{err:#}");
        assert!(chain.contains("allow_new_contexts"), "{chain}");
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        let err = parse_config_str("output_dir = /tmp").expect_err("unquoted string");
        assert!(format!("{err:#}").contains("output_dir"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("timeout_ms 5").expect_err("syntax error expected");
        assert!(err.to_string().contains("line 1"));
    }
}
