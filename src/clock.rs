//! 时钟抽象
//!
//! 熔断器的冷却判断和重试退避都通过 [`Clock`] 获取时间，
//! 生产环境使用 [`SystemClock`]，测试使用 [`ManualClock`] 手动推进时间。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// 时间源
#[async_trait]
pub trait Clock: Send + Sync {
    /// 当前时间
    fn now(&self) -> DateTime<Utc>;

    /// 等待指定时长
    async fn sleep(&self, duration: Duration);
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 手动控制的时钟
///
/// `sleep` 不会真正等待，而是立即把时间向前推进并记录等待时长，
/// 便于断言退避间隔。克隆体共享同一时间线。
///
/// # 示例
/// ```rust
/// use svcguard::clock::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_secs(60));
/// assert_eq!((clock.now() - start).num_seconds(), 60);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    now: DateTime<Utc>,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    /// 从 UNIX 纪元开始的时钟
    pub fn new() -> Self {
        Self::starting_at(DateTime::<Utc>::default())
    }

    /// 从指定时间开始的时钟
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                now: start,
                sleeps: Vec::new(),
            })),
        }
    }

    /// 推进时间
    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock();
        state.now = add_duration(state.now, duration);
    }

    /// 已记录的所有等待时长
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().sleeps.clone()
    }

    /// 已等待的总时长
    pub fn total_slept(&self) -> Duration {
        self.inner.lock().sleeps.iter().sum()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.inner.lock().now
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.inner.lock();
            state.now = add_duration(state.now, duration);
            state.sleeps.push(duration);
        }
        tokio::task::yield_now().await;
    }
}

/// 时间点加上时长，溢出时饱和到最大时间
pub(crate) fn add_duration(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| at.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
