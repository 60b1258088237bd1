//! 变化检测 / 去重过滤器
//!
//! # 设计思路
//!
//! 操作系统剪贴板在每次轮询时都会重复报告相同内容；没有这层过滤，
//! 静止的剪贴板会让存储无限增长。检测器记住上一次**被接受**的观察值，
//! 只放行真正的新内容。
//!
//! 文本与图片是两条独立通道：文本变化不会重置图片的去重状态，反之亦然。
//! 状态归监控循环实例所有（不是进程级全局），测试中的多个独立实例互不干扰；
//! 仅在进程重启时重置。
//!
//! 图片比较使用 128 位 MD5 内容指纹，避免每个周期保留并逐字节比较
//! 可能很大的图片负载。这里只用于去重，不承担任何安全属性。

/// 每条通道上一次被接受的观察值
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_text: Option<String>,
    last_image_fingerprint: Option<[u8; 16]>,
}

/// 计算图片内容指纹（128 位 MD5 摘要）
pub fn fingerprint(data: &[u8]) -> [u8; 16] {
    md5::compute(data).0
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 判定文本观察是否为新内容；接受时更新通道状态。
    ///
    /// 空白文本永远不被接受；与上次接受值逐字符相等的文本被抑制。
    pub fn accept_text(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        if self.last_text.as_deref() == Some(text) {
            return false;
        }
        self.last_text = Some(text.to_string());
        true
    }

    /// 判定图片观察是否为新内容；接受时更新通道状态。
    pub fn accept_image(&mut self, data: &[u8]) -> bool {
        if data.is_empty() {
            return false;
        }
        let digest = fingerprint(data);
        if self.last_image_fingerprint == Some(digest) {
            return false;
        }
        self.last_image_fingerprint = Some(digest);
        true
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{ChangeDetector, fingerprint};

    #[test]
    fn distinct_texts_are_both_accepted() {
        let mut detector = ChangeDetector::new();
        assert!(detector.accept_text("t1"));
        assert!(detector.accept_text("t2"));
    }

    #[test]
    fn repeated_text_is_accepted_once() {
        let mut detector = ChangeDetector::new();
        assert!(detector.accept_text("hello"));
        assert!(!detector.accept_text("hello"));
        assert!(!detector.accept_text("hello"));
    }

    #[test]
    fn whitespace_only_text_is_never_accepted() {
        let mut detector = ChangeDetector::new();
        assert!(!detector.accept_text(""));
        assert!(!detector.accept_text("   \t\n"));
    }

    #[test]
    fn historical_repeat_is_accepted_again() {
        // 去重只抑制连续重复，不抑制历史上出现过的内容
        let mut detector = ChangeDetector::new();
        assert!(detector.accept_image(b"IMG1"));
        assert!(detector.accept_image(b"IMG2"));
        assert!(detector.accept_image(b"IMG1"));
    }

    #[test]
    fn channels_are_independent() {
        let mut detector = ChangeDetector::new();
        assert!(detector.accept_text("hello"));
        assert!(detector.accept_image(b"IMG1"));
        // 图片通道的接受不影响文本通道的状态
        assert!(!detector.accept_text("hello"));
        assert!(!detector.accept_image(b"IMG1"));
    }

    proptest! {
        #[test]
        fn fingerprint_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(fingerprint(&data), fingerprint(&data));
        }

        #[test]
        fn fingerprint_discriminates_appended_bytes(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            extra in any::<u8>(),
        ) {
            let mut other = data.clone();
            other.push(extra);
            prop_assert_ne!(fingerprint(&data), fingerprint(&other));
        }

        #[test]
        fn distinct_text_pairs_are_both_accepted(a in ".*", b in ".*") {
            prop_assume!(a != b);
            prop_assume!(!a.trim().is_empty() && !b.trim().is_empty());
            let mut detector = ChangeDetector::new();
            prop_assert!(detector.accept_text(&a));
            prop_assert!(detector.accept_text(&b));
        }
    }
}
