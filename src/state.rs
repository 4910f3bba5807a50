//! 单域名扫描的状态机
//!
//! 每个域名的扫描都经过 `Idle -> Dispatching -> Draining -> Finalized`，
//! 不允许跳过 `Draining`。`Finalized` 之后只能回到 `Idle` 开始下一个域名。

use crate::error::{Result, ScanError};

/// 扫描阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// 空闲，尚未开始
    Idle,
    /// 任务正在提交和执行
    Dispatching,
    /// 全部任务已提交，等待剩余任务完成
    Draining,
    /// 结果已写出
    Finalized,
}

impl ScanPhase {
    /// 是否允许从当前阶段跳转到 `next`
    pub fn can_advance_to(self, next: ScanPhase) -> bool {
        matches!(
            (self, next),
            (ScanPhase::Idle, ScanPhase::Dispatching)
                | (ScanPhase::Dispatching, ScanPhase::Draining)
                | (ScanPhase::Draining, ScanPhase::Finalized)
                | (ScanPhase::Finalized, ScanPhase::Idle)
        )
    }
}

/// 扫描状态，记录当前阶段
#[derive(Debug, Clone)]
pub struct ScanState {
    phase: ScanPhase,
}

impl ScanState {
    /// 初始状态为 `Idle`
    pub fn new() -> Self {
        ScanState {
            phase: ScanPhase::Idle,
        }
    }

    /// 当前状态
    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// 跳转到下一个阶段，非法跳转返回错误且状态不变
    pub fn advance(&mut self, next: ScanPhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(ScanError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        log::debug!("扫描状态: {:?} -> {:?}", self.phase, next);
        self.phase = next;
        Ok(())
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}
