//! 扫描配置：默认值、校验和JSON配置文件

use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, ScanError};

/// 并发任务数上限。再大只会耗尽本地端口和文件描述符
pub const MAX_CONCURRENCY: usize = 10_000;

/// 扫描配置
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// 每个候选域名的最大尝试次数（仅超时会重试）
    pub max_retries: u32,
    /// 两次尝试之间的固定等待时间
    pub retry_delay: Duration,
    /// 同时进行的查询任务上限
    pub concurrency: usize,
    /// 单次查询的超时时间
    pub per_query_timeout: Duration,
    /// DNS服务器列表，为空时使用系统配置
    pub resolvers: Vec<IpAddr>,
    /// 扫描前是否检测泛解析
    pub wildcard_check: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            concurrency: 100,
            per_query_timeout: Duration::from_secs(5),
            resolvers: Vec::new(),
            wildcard_check: false,
        }
    }
}

impl ScanConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(ScanError::InvalidConfig(
                "maxRetries must be at least 1".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(ScanError::InvalidConfig(format!(
                "concurrency must be at most {}, got {}",
                MAX_CONCURRENCY, self.concurrency
            )));
        }
        if self.per_query_timeout.is_zero() {
            return Err(ScanError::InvalidConfig(
                "perQueryTimeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// 用配置文件中出现的字段覆盖当前配置
    pub fn merge_file(&mut self, file: ConfigFile) -> Result<()> {
        if let Some(max_retries) = file.max_retries {
            self.max_retries = max_retries;
        }
        if let Some(secs) = file.retry_delay {
            self.retry_delay = parse_seconds("retryDelay", secs)?;
        }
        if let Some(concurrency) = file.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(secs) = file.per_query_timeout {
            self.per_query_timeout = parse_seconds("perQueryTimeout", secs)?;
        }
        if let Some(resolvers) = file.resolvers {
            self.resolvers = resolvers;
        }
        if let Some(wildcard_check) = file.wildcard_check {
            self.wildcard_check = wildcard_check;
        }
        Ok(())
    }
}

/// JSON配置文件，所有字段可选
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    /// `maxRetries`
    pub max_retries: Option<u32>,
    /// `retryDelay`，单位秒
    pub retry_delay: Option<f64>,
    /// `concurrency`
    pub concurrency: Option<usize>,
    /// `perQueryTimeout`，单位秒
    pub per_query_timeout: Option<f64>,
    /// `resolvers`
    pub resolvers: Option<Vec<IpAddr>>,
    /// `wildcardCheck`
    pub wildcard_check: Option<bool>,
}

impl ConfigFile {
    /// 从文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ScanError::ReadInput {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ScanError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// 将秒数转换为 `Duration`，拒绝负数和非有限值
pub fn parse_seconds(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        ScanError::InvalidConfig(format!(
            "{} must be a non-negative number of seconds, got {}",
            field, secs
        ))
    })
}
