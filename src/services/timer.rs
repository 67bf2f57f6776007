//! 测验倒计时
//! 以固定周期回调的可取消定时任务

use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// 回调返回值，决定定时器是否继续
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// 可取消的周期定时器，drop 时自动停止
pub struct QuizTimer {
    stop_sender: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl QuizTimer {
    /// 启动定时器，每个周期调用一次 `on_tick`，第一次回调发生在一个周期之后
    pub fn start<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickControl> + Send + 'static,
    {
        let (stop_sender, mut stop_receiver) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval 的第一次 tick 立即完成
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stop_receiver => break,
                    _ = ticker.tick() => {
                        if on_tick().await == TickControl::Stop {
                            break;
                        }
                    }
                }
            }
            log::debug!("quiz timer stopped");
        });

        Self {
            stop_sender: Some(stop_sender),
            handle: Some(handle),
        }
    }

    /// 立即停止，之后不会再有回调
    pub fn stop(&mut self) {
        if let Some(sender) = self.stop_sender.take() {
            let _ = sender.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for QuizTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
