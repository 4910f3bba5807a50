//! 单次DNS存在性探测
//!
//! 一次探测只发一次A记录查询，结果分为存在、不存在、超时和其他错误。
//! 是否重试由 [`RetryPolicy`](crate::retry::RetryPolicy) 决定，探测本身不重试。

use std::fmt;
use std::io;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::error::ProtoErrorKind;
use trust_dns_resolver::TokioAsyncResolver;

/// 单次查询的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// 返回了至少一个地址
    Exists,
    /// 权威的否定回答：NXDOMAIN、无应答或没有可用的DNS服务器
    Absent,
    /// 查询超时，可以重试
    Timeout,
    /// 其他无法归类的失败
    Error(String),
}

/// 重试结束后一个候选域名的最终结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 域名存在
    Exists,
    /// 域名不存在，或重试次数耗尽仍然超时
    Absent,
    /// 未归类的失败。统计时按不存在处理，但会单独上报
    Error(String),
}

impl ProbeOutcome {
    /// 是否计入已确认集合
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ProbeOutcome::Exists)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Exists => write!(f, "exists"),
            ProbeOutcome::Absent => write!(f, "absent"),
            ProbeOutcome::Error(cause) => write!(f, "error: {}", cause),
        }
    }
}

/// 域名存在性探测
#[async_trait]
pub trait Probe: Send + Sync {
    /// 对完整域名执行一次查询
    async fn probe(&self, name: &str) -> ProbeResult;
}

/// 拼接候选域名
pub fn candidate_name(label: &str, domain: &str) -> String {
    let mut name = String::with_capacity(label.len() + domain.len() + 1);
    name.push_str(label);
    name.push('.');
    name.push_str(domain);
    name
}

/// 将解析器错误归类为探测结果
pub fn classify_error(err: &ResolveError) -> ProbeResult {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => ProbeResult::Absent,
        ResolveErrorKind::NoConnections => ProbeResult::Absent,
        ResolveErrorKind::Timeout => ProbeResult::Timeout,
        ResolveErrorKind::Proto(proto) if matches!(proto.kind(), ProtoErrorKind::Timeout) => {
            ProbeResult::Timeout
        }
        ResolveErrorKind::Io(e) if e.kind() == io::ErrorKind::TimedOut => ProbeResult::Timeout,
        _ => ProbeResult::Error(err.to_string()),
    }
}

/// 转换为完全限定域名（以 `.` 结尾），查询时不再拼接 search 后缀
pub fn fully_qualified(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        let mut fqdn = String::with_capacity(name.len() + 1);
        fqdn.push_str(name);
        fqdn.push('.');
        fqdn
    }
}

/// 去掉系统配置中的 `domain` 和 `search` 列表，只保留DNS服务器
pub fn without_search(config: &ResolverConfig) -> ResolverConfig {
    ResolverConfig::from_parts(None, Vec::new(), config.name_servers().to_vec())
}

/// 基于 trust-dns 的A记录探测器
pub struct DnsProbe {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsProbe {
    /// 创建探测器。`resolvers` 为空时读取系统DNS配置
    pub fn new(resolvers: &[IpAddr], timeout: Duration) -> Self {
        let (config, opts) = if resolvers.is_empty() {
            match trust_dns_resolver::system_conf::read_system_conf() {
                Ok((conf, opts)) => (without_search(&conf), opts),
                Err(e) => {
                    warn!("无法读取系统DNS配置，使用默认DNS服务器: {}", e);
                    (ResolverConfig::default(), ResolverOpts::default())
                }
            }
        } else {
            let group = NameServerConfigGroup::from_ips_clear(resolvers, 53, true);
            (
                ResolverConfig::from_parts(None, Vec::new(), group),
                ResolverOpts::default(),
            )
        };

        Self::with_config(config, opts, timeout)
    }

    /// 使用给定的解析器配置创建探测器
    pub fn with_config(config: ResolverConfig, mut opts: ResolverOpts, timeout: Duration) -> Self {
        // 只做一次尝试，重试交给 RetryPolicy
        opts.timeout = timeout;
        opts.attempts = 1;

        DnsProbe {
            resolver: TokioAsyncResolver::tokio(config, opts),
            timeout,
        }
    }
}

#[async_trait]
impl Probe for DnsProbe {
    async fn probe(&self, name: &str) -> ProbeResult {
        let fqdn = fully_qualified(name);
        let lookup = self.resolver.ipv4_lookup(fqdn.as_str());
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(lookup)) => {
                if lookup.iter().next().is_some() {
                    ProbeResult::Exists
                } else {
                    ProbeResult::Absent
                }
            }
            Ok(Err(e)) => {
                let result = classify_error(&e);
                debug!("{} 查询失败 ({:?}): {}", name, result, e);
                result
            }
            Err(_) => ProbeResult::Timeout,
        }
    }
}
