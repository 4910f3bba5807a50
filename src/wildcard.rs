//! 泛解析检测

use std::sync::Arc;

use log::debug;
use rand::Rng;

use crate::probe::{candidate_name, Probe, ProbeOutcome};
use crate::retry::RetryPolicy;

const SAMPLE_COUNT: usize = 3;
const LABEL_LEN: usize = 12;

/// 泛解析检测器
pub struct WildcardDetector {
    probe: Arc<dyn Probe>,
    policy: RetryPolicy,
}

impl WildcardDetector {
    /// 使用与扫描相同的探测器和重试策略
    pub fn new(probe: Arc<dyn Probe>, policy: RetryPolicy) -> Self {
        WildcardDetector { probe, policy }
    }

    /// 检测域名是否存在泛解析：随机子域名全部能解析则认为存在
    pub async fn detect_wildcard(&self, domain: &str) -> bool {
        for label in generate_test_labels(SAMPLE_COUNT) {
            let name = candidate_name(&label, domain);
            let result = self.policy.run(self.probe.as_ref(), &name).await;
            debug!("泛解析探测 {}: {}", name, result.outcome);
            if result.outcome != ProbeOutcome::Exists {
                // 如果随机域名无法解析，说明不存在泛解析
                return false;
            }
        }
        true
    }
}

/// 生成测试用的随机标签
fn generate_test_labels(count: usize) -> Vec<String> {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..count)
        .map(|_| {
            (0..LABEL_LEN)
                .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
                .collect()
        })
        .collect()
}
