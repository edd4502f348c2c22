//! 时间控制 - 业务能力层
//!
//! 节流（首尾两端触发）和防抖（仅尾端触发）都是显式的截止时间状态机：
//! 调用方传入当前时间，并在 `deadline()` 到达时调用 `poll()`。

use std::time::Duration;

use tokio::time::Instant;

/// 节流器：窗口内第一次调用立即触发，窗口内后续调用合并为窗口结束时的一次触发
///
/// 尾端触发时携带窗口内最后一次调用的参数，并开启新的窗口
#[derive(Debug)]
pub struct Throttle<T> {
    wait: Duration,
    window_end: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            window_end: None,
            pending: None,
        }
    }

    /// 调用一次，返回 Some 表示应立即触发
    pub fn call(&mut self, now: Instant, arg: T) -> Option<T> {
        // 先结算已到期的尾端触发，保证顺序
        if self.pending.is_some() {
            if let Some(end) = self.window_end {
                if now >= end {
                    self.pending = Some(arg);
                    return self.poll(now);
                }
            }
        }

        match self.window_end {
            Some(end) if now < end => {
                self.pending = Some(arg);
                None
            }
            _ => {
                self.window_end = Some(now + self.wait);
                self.pending = None;
                Some(arg)
            }
        }
    }

    /// 到期时返回尾端触发的参数
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let end = self.window_end?;
        if now < end {
            return None;
        }
        match self.pending.take() {
            Some(arg) => {
                self.window_end = Some(now + self.wait);
                Some(arg)
            }
            None => {
                self.window_end = None;
                None
            }
        }
    }

    /// 下一次尾端触发的时间
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().and(self.window_end)
    }

    /// 丢弃待触发的调用，保留当前窗口
    pub fn drop_pending(&mut self) {
        self.pending = None;
    }

    /// 丢弃窗口和待触发的调用
    pub fn cancel(&mut self) {
        self.window_end = None;
        self.pending = None;
    }
}

/// 防抖器：每次调用重新计时，只有在静默 `wait` 之后才触发一次
#[derive(Debug)]
pub struct Debounce<T> {
    wait: Duration,
    deadline: Option<Instant>,
    pending: Option<T>,
}

impl<T> Debounce<T> {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            deadline: None,
            pending: None,
        }
    }

    pub fn call(&mut self, now: Instant, arg: T) {
        self.deadline = Some(now + self.wait);
        self.pending = Some(arg);
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_throttle_leading_and_trailing() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(ms(2000));

        assert_eq!(throttle.call(t0, 1), Some(1));
        assert_eq!(throttle.call(t0 + ms(100), 2), None);
        assert_eq!(throttle.call(t0 + ms(500), 3), None);
        assert_eq!(throttle.deadline(), Some(t0 + ms(2000)));

        assert_eq!(throttle.poll(t0 + ms(1999)), None);
        assert_eq!(throttle.poll(t0 + ms(2000)), Some(3));
        // 尾端触发后开启新窗口，窗口内无调用则自然结束
        assert_eq!(throttle.deadline(), None);
        assert_eq!(throttle.poll(t0 + ms(4000)), None);
        assert_eq!(throttle.call(t0 + ms(4001), 4), Some(4));
    }

    #[test]
    fn test_throttle_single_call_has_no_trailing() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(ms(1000));

        assert_eq!(throttle.call(t0, ()), Some(()));
        assert_eq!(throttle.deadline(), None);
        assert_eq!(throttle.poll(t0 + ms(1000)), None);
    }

    #[test]
    fn test_throttle_call_after_missed_deadline_flushes_latest() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(ms(1000));

        throttle.call(t0, 1);
        throttle.call(t0 + ms(10), 2);
        assert_eq!(throttle.call(t0 + ms(1500), 3), Some(3));
        assert_eq!(throttle.call(t0 + ms(1600), 4), None);
        assert_eq!(throttle.deadline(), Some(t0 + ms(2500)));
    }

    #[test]
    fn test_zero_wait_throttle_passes_through() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(Duration::ZERO);
        assert_eq!(throttle.call(t0, 1), Some(1));
        assert_eq!(throttle.call(t0, 2), Some(2));
    }

    #[test]
    fn test_debounce_fires_once_after_quiet_period() {
        let t0 = Instant::now();
        let mut debounce = Debounce::new(ms(2000));

        for i in 0..10 {
            debounce.call(t0 + ms(i * 100), i);
            assert_eq!(debounce.poll(t0 + ms(i * 100)), None);
        }
        assert_eq!(debounce.deadline(), Some(t0 + ms(2900)));
        assert_eq!(debounce.poll(t0 + ms(2899)), None);
        assert_eq!(debounce.poll(t0 + ms(2900)), Some(9));
        assert_eq!(debounce.poll(t0 + ms(9000)), None);
    }

    #[test]
    fn test_cancel_drops_pending() {
        let t0 = Instant::now();
        let mut debounce = Debounce::new(ms(10));
        debounce.call(t0, ());
        debounce.cancel();
        assert_eq!(debounce.poll(t0 + ms(20)), None);

        let mut throttle = Throttle::new(ms(10));
        throttle.call(t0, 1);
        throttle.call(t0, 2);
        throttle.cancel();
        assert_eq!(throttle.poll(t0 + ms(20)), None);
    }

    #[test]
    fn test_drop_pending_keeps_window() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(ms(1000));
        throttle.call(t0, 1);
        throttle.call(t0 + ms(10), 2);
        throttle.drop_pending();

        assert_eq!(throttle.deadline(), None);
        assert_eq!(throttle.call(t0 + ms(500), 3), None);
        assert_eq!(throttle.poll(t0 + ms(1000)), Some(3));
    }
}
