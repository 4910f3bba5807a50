//! 扫描引擎：按域名依次分发、聚合并写出结果

use std::future::Future;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::ScanConfig;
use crate::dispatch::{DispatchMessage, Dispatcher};
use crate::error::Result;
use crate::events::{ConsoleReporter, EventSink, ScanEvent};
use crate::handle::{ResultAggregator, ScanResult};
use crate::input::OutputFormat;
use crate::output::{FileSink, ResultSink};
use crate::probe::{DnsProbe, Probe};
use crate::retry::RetryPolicy;
use crate::state::{ScanPhase, ScanState};
use crate::wildcard::WildcardDetector;

/// 域名暴破引擎
///
/// 依次扫描每个域名，域名之间除了同一份配置以外不共享任何状态。
pub struct SubdomainBruteEngine {
    config: ScanConfig,
    dispatcher: Dispatcher,
    wildcard_detector: Option<WildcardDetector>,
    events: Arc<dyn EventSink>,
    sink: Arc<dyn ResultSink>,
}

impl SubdomainBruteEngine {
    /// 使用指定的探测器创建引擎
    pub fn new(
        config: ScanConfig,
        probe: Arc<dyn Probe>,
        events: Arc<dyn EventSink>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self> {
        config.validate()?;

        let policy = RetryPolicy::from_config(&config);
        let dispatcher = Dispatcher::new(probe.clone(), policy, config.concurrency);
        let wildcard_detector = if config.wildcard_check {
            Some(WildcardDetector::new(probe, policy))
        } else {
            None
        };

        Ok(SubdomainBruteEngine {
            config,
            dispatcher,
            wildcard_detector,
            events,
            sink,
        })
    }

    /// 使用真实DNS查询创建引擎
    pub fn with_dns(
        config: ScanConfig,
        events: Arc<dyn EventSink>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self> {
        let probe = Arc::new(DnsProbe::new(&config.resolvers, config.per_query_timeout));
        Self::new(config, probe, events, sink)
    }

    /// 当前配置
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// 扫描所有域名
    pub async fn run(
        &self,
        domains: &[String],
        labels: impl Into<Arc<[String]>>,
    ) -> Result<Vec<ScanResult>> {
        self.run_until(domains, labels, std::future::pending()).await
    }

    /// 扫描所有域名，`shutdown` 完成时中断当前域名并不再扫描后续域名
    pub async fn run_until<F>(
        &self,
        domains: &[String],
        labels: impl Into<Arc<[String]>>,
        shutdown: F,
    ) -> Result<Vec<ScanResult>>
    where
        F: Future<Output = ()>,
    {
        let labels = labels.into();
        tokio::pin!(shutdown);

        let mut results = Vec::with_capacity(domains.len());
        for domain in domains {
            info!("Processing domain: {}", domain);
            let result = self
                .scan_domain_until(domain, labels.clone(), &mut shutdown)
                .await?;
            let interrupted = result.interrupted;
            results.push(result);
            if interrupted {
                break;
            }
        }
        Ok(results)
    }

    /// 扫描单个域名
    pub async fn scan_domain(&self, domain: &str, labels: Arc<[String]>) -> Result<ScanResult> {
        self.scan_domain_until(domain, labels, &mut std::future::pending())
            .await
    }

    /// 扫描单个域名，可被 `shutdown` 中断。中断时已完成的结果照常写出，在途任务被丢弃
    pub async fn scan_domain_until<F>(
        &self,
        domain: &str,
        labels: Arc<[String]>,
        shutdown: &mut F,
    ) -> Result<ScanResult>
    where
        F: Future<Output = ()> + Unpin,
    {
        let mut state = ScanState::new();
        let mut interrupted = false;
        let total = labels.len();
        if total == 0 {
            warn!("{} 的候选子域名列表为空", domain);
        }

        if let Some(detector) = &self.wildcard_detector {
            tokio::select! {
                detected = detector.detect_wildcard(domain) => {
                    if detected {
                        self.events.emit(&ScanEvent::WildcardDetected {
                            domain: domain.to_string(),
                        });
                    }
                }
                _ = &mut *shutdown => interrupted = true,
            }
        }

        self.events.emit(&ScanEvent::ScanStarted {
            domain: domain.to_string(),
            total,
        });
        let mut aggregator = ResultAggregator::new(domain, total, self.events.as_ref());
        state.advance(ScanPhase::Dispatching)?;

        if !interrupted {
            let mut handle = self.dispatcher.dispatch(domain, labels);
            loop {
                tokio::select! {
                    message = handle.recv() => match message {
                        Some(DispatchMessage::Completed(completion)) => {
                            aggregator.record(completion)
                        }
                        Some(DispatchMessage::AllSubmitted { submitted }) => {
                            debug!("{} 的 {} 个任务已全部提交，等待剩余任务", domain, submitted);
                            state.advance(ScanPhase::Draining)?;
                        }
                        None => break,
                    },
                    _ = &mut *shutdown => {
                        warn!("收到中断信号，停止扫描 {}", domain);
                        handle.abort();
                        interrupted = true;
                        break;
                    }
                }
            }
        }

        if state.phase() == ScanPhase::Dispatching {
            state.advance(ScanPhase::Draining)?;
        }
        if !interrupted && aggregator.completed() < total {
            warn!(
                "{} 有 {} 个任务没有返回结果",
                domain,
                total - aggregator.completed()
            );
        }

        let result = aggregator.finalize(self.sink.as_ref(), interrupted)?;
        state.advance(ScanPhase::Finalized)?;
        Ok(result)
    }
}

/// 便捷的域名暴破函数：真实DNS查询，终端输出，结果写入当前目录
pub async fn brute_force_subdomains(
    domains: Vec<String>,
    labels: Vec<String>,
    config: ScanConfig,
) -> Result<Vec<ScanResult>> {
    let engine = SubdomainBruteEngine::with_dns(
        config,
        Arc::new(ConsoleReporter::new(false)),
        Arc::new(FileSink::new(".", OutputFormat::Txt)),
    )?;
    engine.run(&domains, labels).await
}
