//! 结果聚合：已确认集合、进度计数和最终写出

use std::fmt;

use crate::dispatch::Completion;
use crate::error::Result;
use crate::events::{EventSink, ScanEvent};
use crate::output::ResultSink;
use crate::probe::ProbeOutcome;

/// 单个域名的扫描结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// 目标域名
    pub domain: String,
    /// 已确认存在的子域名，按完成顺序
    pub confirmed: Vec<String>,
    /// 提交的候选数量
    pub total: usize,
    /// 已得到结果的候选数量
    pub completed: usize,
    /// 未归类失败的数量
    pub failed: usize,
    /// 是否被中断
    pub interrupted: bool,
    /// 结果写出的位置
    pub location: Option<String>,
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<30} {:>6} / {:<6} failed: {:<4}{}",
            self.domain,
            self.confirmed.len(),
            self.total,
            self.failed,
            if self.interrupted { " (interrupted)" } else { "" }
        )
    }
}

/// 结果聚合器
///
/// 是已确认集合和进度计数的唯一写入者，按完成顺序消费任务结果。
pub struct ResultAggregator<'a> {
    domain: String,
    total: usize,
    completed: usize,
    failed: usize,
    confirmed: Vec<String>,
    events: &'a dyn EventSink,
}

impl<'a> ResultAggregator<'a> {
    /// `total` 为该域名提交的候选数量
    pub fn new(domain: &str, total: usize, events: &'a dyn EventSink) -> Self {
        ResultAggregator {
            domain: domain.to_string(),
            total,
            completed: 0,
            failed: 0,
            confirmed: Vec::new(),
            events,
        }
    }

    /// 处理一个完成的任务
    pub fn record(&mut self, completion: Completion) {
        self.completed += 1;

        match completion.outcome {
            ProbeOutcome::Exists => {
                self.events.emit(&ScanEvent::Found {
                    domain: self.domain.clone(),
                    name: completion.name.clone(),
                });
                self.confirmed.push(completion.name);
            }
            ProbeOutcome::Absent => {}
            ProbeOutcome::Error(cause) => {
                self.failed += 1;
                self.events.emit(&ScanEvent::ProbeFailed {
                    domain: self.domain.clone(),
                    name: completion.name,
                    cause,
                });
            }
        }

        self.events.emit(&ScanEvent::Progress {
            domain: self.domain.clone(),
            current: self.completed,
            total: self.total,
        });
    }

    /// 目前已确认的子域名
    pub fn confirmed(&self) -> &[String] {
        &self.confirmed
    }

    /// 已完成的候选数量
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// 候选总数
    pub fn total(&self) -> usize {
        self.total
    }

    /// 写出已确认集合并发出汇总事件，每个扫描只调用一次
    pub fn finalize(self, sink: &dyn ResultSink, interrupted: bool) -> Result<ScanResult> {
        let location = sink.write(&self.domain, &self.confirmed)?;

        if interrupted {
            self.events.emit(&ScanEvent::Interrupted {
                domain: self.domain.clone(),
                completed: self.completed,
                total: self.total,
            });
        }
        self.events.emit(&ScanEvent::Summary {
            domain: self.domain.clone(),
            found: self.confirmed.len(),
            total: self.total,
            failed: self.failed,
            location: location.clone(),
        });

        Ok(ScanResult {
            domain: self.domain,
            confirmed: self.confirmed,
            total: self.total,
            completed: self.completed,
            failed: self.failed,
            interrupted,
            location,
        })
    }
}
