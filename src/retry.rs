//! 超时重试策略

use std::time::Duration;

use log::debug;

use crate::config::ScanConfig;
use crate::probe::{Probe, ProbeOutcome, ProbeResult};

/// 一次尝试之后的下一步
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStep {
    /// 得到最终结果
    Done(ProbeOutcome),
    /// 等待后再次尝试
    RetryAfter(Duration),
}

/// 带重试的探测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome {
    /// 最终结果
    pub outcome: ProbeOutcome,
    /// 实际调用探测器的次数
    pub attempts: u32,
}

/// 超时重试策略：最多尝试 `max_attempts` 次，只有超时才重试
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` 至少为1
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// 使用配置中的 `max_retries` 和 `retry_delay`
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay)
    }

    /// 最大尝试次数
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 两次尝试之间的等待时间
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 根据第 `attempt` 次（从1开始）尝试的结果决定下一步
    pub fn next_step(&self, attempt: u32, result: ProbeResult) -> RetryStep {
        match result {
            ProbeResult::Exists => RetryStep::Done(ProbeOutcome::Exists),
            ProbeResult::Absent => RetryStep::Done(ProbeOutcome::Absent),
            ProbeResult::Error(cause) => RetryStep::Done(ProbeOutcome::Error(cause)),
            ProbeResult::Timeout if attempt < self.max_attempts => {
                RetryStep::RetryAfter(self.delay)
            }
            ProbeResult::Timeout => RetryStep::Done(ProbeOutcome::Absent),
        }
    }

    /// 执行带重试的探测，最多调用 `max_attempts` 次
    pub async fn run<P: Probe + ?Sized>(&self, probe: &P, name: &str) -> RetryOutcome {
        let mut attempt = 1;
        loop {
            let result = probe.probe(name).await;
            match self.next_step(attempt, result) {
                RetryStep::Done(outcome) => {
                    return RetryOutcome {
                        outcome,
                        attempts: attempt,
                    };
                }
                RetryStep::RetryAfter(delay) => {
                    debug!("{} 第{}次查询超时，{:?}后重试", name, attempt, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// 按脚本依次返回结果，用完后一直返回最后一个
    struct ScriptedProbe {
        script: Mutex<Vec<ProbeResult>>,
        calls: AtomicU32,
    }

    impl ScriptedProbe {
        fn new(mut script: Vec<ProbeResult>) -> Self {
            script.reverse();
            ScriptedProbe {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn probe(&self, _name: &str) -> ProbeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop().unwrap()
            } else {
                script[0].clone()
            }
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_next_step_never_retries_definitive() {
        let policy = fast_policy(3);
        assert_eq!(policy.next_step(1, ProbeResult::Exists), RetryStep::Done(ProbeOutcome::Exists));
        assert_eq!(policy.next_step(1, ProbeResult::Absent), RetryStep::Done(ProbeOutcome::Absent));
        assert_eq!(
            policy.next_step(1, ProbeResult::Error("bad".into())),
            RetryStep::Done(ProbeOutcome::Error("bad".into()))
        );
    }

    #[test]
    fn test_next_step_timeout() {
        let policy = fast_policy(3);
        assert_eq!(
            policy.next_step(1, ProbeResult::Timeout),
            RetryStep::RetryAfter(Duration::from_millis(1))
        );
        assert_eq!(
            policy.next_step(2, ProbeResult::Timeout),
            RetryStep::RetryAfter(Duration::from_millis(1))
        );
        assert_eq!(
            policy.next_step(3, ProbeResult::Timeout),
            RetryStep::Done(ProbeOutcome::Absent)
        );
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_always_timeout_exhausts_attempts() {
        let probe = ScriptedProbe::new(vec![ProbeResult::Timeout]);
        let result = fast_policy(3).run(&probe, "a.example.com").await;

        assert_eq!(result.outcome, ProbeOutcome::Absent);
        assert_eq!(result.attempts, 3);
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test]
    async fn test_timeout_then_exists() {
        let probe = ScriptedProbe::new(vec![
            ProbeResult::Timeout,
            ProbeResult::Timeout,
            ProbeResult::Exists,
        ]);
        let result = fast_policy(3).run(&probe, "a.example.com").await;

        assert_eq!(result.outcome, ProbeOutcome::Exists);
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test]
    async fn test_absent_not_retried() {
        let probe = ScriptedProbe::new(vec![ProbeResult::Absent, ProbeResult::Exists]);
        let result = fast_policy(3).run(&probe, "ghost.example.com").await;

        assert_eq!(result.outcome, ProbeOutcome::Absent);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_error_not_retried() {
        let probe =
            ScriptedProbe::new(vec![ProbeResult::Error("servfail".into()), ProbeResult::Exists]);
        let result = fast_policy(5).run(&probe, "x.example.com").await;

        assert_eq!(result.outcome, ProbeOutcome::Error("servfail".into()));
        assert_eq!(result.attempts, 1);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_waits_between_attempts() {
        let probe = ScriptedProbe::new(vec![ProbeResult::Timeout]);
        let policy = RetryPolicy::new(3, Duration::from_millis(20));

        let start = std::time::Instant::now();
        policy.run(&probe, "slow.example.com").await;
        // 三次尝试之间等待两次
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
