// 应用配置
// 默认值 + 环境变量覆盖，命令行参数在 main 中再覆盖一次

use std::path::PathBuf;
use std::str::FromStr;

use log::LevelFilter;
use tokio::time::Duration;

use crate::services::generator::GeneratorConfig;
use crate::utils;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
    pub tick_interval: Duration, // 倒计时周期，正常为 1 秒
    pub generator: GeneratorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: utils::get_database_path(),
            log_level: LevelFilter::Info,
            log_file: None,
            tick_interval: Duration::from_secs(1),
            generator: GeneratorConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取，无法解析的值忽略并保留默认
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("EDUQUEST_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = parse_var::<LevelFilter>(&lookup, "EDUQUEST_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(path) = lookup("EDUQUEST_LOG_FILE") {
            config.log_file = Some(PathBuf::from(path));
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "EDUQUEST_TICK_MS").filter(|ms| *ms > 0) {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(url) = lookup("EDUQUEST_COMPLETION_URL") {
            config.generator.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(tokens) = parse_var::<u32>(&lookup, "EDUQUEST_MAX_TOKENS") {
            config.generator.max_tokens = tokens;
        }
        if let Some(temp) = parse_var::<f32>(&lookup, "EDUQUEST_TEMPERATURE") {
            config.generator.temperature = temp;
        }

        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring invalid value for {}: {}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.log_level, LevelFilter::Info);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert!(config.log_file.is_none());
        assert!(config.db_path.ends_with("eduquest.db"));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("EDUQUEST_DB_PATH", "/tmp/q.db"),
            ("EDUQUEST_LOG_LEVEL", "debug"),
            ("EDUQUEST_TICK_MS", "250"),
            ("EDUQUEST_COMPLETION_URL", "http://10.0.0.2:9000/"),
            ("EDUQUEST_TEMPERATURE", "0.2"),
        ]);

        assert_eq!(config.db_path, PathBuf::from("/tmp/q.db"));
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.generator.base_url, "http://10.0.0.2:9000");
        assert_eq!(config.generator.temperature, 0.2);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[("EDUQUEST_TICK_MS", "0"), ("EDUQUEST_MAX_TOKENS", "lots")]);

        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.generator.max_tokens, GeneratorConfig::default().max_tokens);
    }
}
