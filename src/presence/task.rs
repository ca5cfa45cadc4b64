use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// 定时任务句柄
///
/// 取消只在两次 tick 之间生效：已经开始的一轮会跑完，`stop` 会等它结束。
pub(crate) struct PeriodicTask {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// 第一次 tick 在一个完整周期之后
    pub(crate) fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {}
                }
                tick().await;
            }
            tracing::debug!("{} stopped", name);
        });

        Self {
            name,
            token,
            handle,
        }
    }

    /// 取消并等待正在进行的一轮完成
    pub(crate) async fn stop(mut self) {
        self.token.cancel();
        if let Err(e) = (&mut self.handle).await {
            if e.is_panic() {
                tracing::error!("{} panicked: {}", self.name, e);
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
