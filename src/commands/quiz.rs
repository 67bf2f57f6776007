// 测验作答命令模块
// 一个控制器对应一次作答：连接会话引擎、倒计时与内容存储

use chrono::{NaiveDate, Utc};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{watch, Mutex};
use tokio::time::Duration;

use crate::models::{Quiz, QuizAttempt, UserProfile};
use crate::services::certificate::Certificate;
use crate::services::database::QuizStore;
use crate::services::session::{
    Phase, QuizResult, QuizSession, ReviewEntry, SessionEvent, SessionSnapshot,
};
use crate::services::timer::{QuizTimer, TickControl};

/// 交卷后的收尾：写入作答记录并通知等待方
struct Completion {
    store: Arc<dyn QuizStore>,
    user_id: String,
    sender: watch::Sender<Option<QuizResult>>,
    unsaved: StdMutex<Option<QuizAttempt>>, // 保存失败的记录，等下次交卷重试
}

impl Completion {
    /// 先保存再通知；保存失败时保留记录供重试
    fn record(&self, quiz: &Quiz, result: &QuizResult) -> Result<(), String> {
        let attempt = QuizAttempt {
            quiz_id: quiz.id.clone(),
            quiz_title: quiz.title.clone(),
            score: result.score,
            total: result.total,
            date: Utc::now().to_rfc3339(),
        };

        log::info!(
            "user {} finished quiz {}: {}/{} ({}%)",
            self.user_id,
            quiz.id,
            result.score,
            result.total,
            result.score_percent
        );

        let saved = self.save(attempt);
        self.sender.send_replace(Some(result.clone()));
        saved
    }

    fn save(&self, attempt: QuizAttempt) -> Result<(), String> {
        let mut unsaved = self
            .unsaved
            .lock()
            .map_err(|_| "Attempt state lock poisoned".to_string())?;

        match self.store.append_quiz_attempt(&self.user_id, &attempt) {
            Ok(()) => {
                *unsaved = None;
                Ok(())
            }
            Err(e) => {
                log::error!("failed to save attempt for quiz {}: {:#}", attempt.quiz_id, e);
                *unsaved = Some(attempt);
                Err(format!("Failed to save attempt: {}", e))
            }
        }
    }

    /// 重试之前保存失败的记录，没有待保存的记录时直接成功
    fn retry(&self) -> Result<(), String> {
        let pending = self
            .unsaved
            .lock()
            .map_err(|_| "Attempt state lock poisoned".to_string())?
            .take();

        match pending {
            Some(attempt) => {
                log::info!("retrying save of attempt for quiz {}", attempt.quiz_id);
                self.save(attempt)
            }
            None => Ok(()),
        }
    }

    fn has_unsaved(&self) -> bool {
        self.unsaved
            .lock()
            .map(|unsaved| unsaved.is_some())
            .unwrap_or(true)
    }
}

/// 单次作答控制器
pub struct QuizController {
    user: UserProfile,
    quiz: Quiz,
    session: Arc<Mutex<QuizSession>>,
    completion: Arc<Completion>,
    finished: watch::Receiver<Option<QuizResult>>,
    timer: Option<QuizTimer>,
}

impl QuizController {
    /// 加载测验与用户并开始作答，测验带时限时启动倒计时
    pub async fn start(
        store: Arc<dyn QuizStore>,
        user_id: &str,
        quiz_id: &str,
        tick_period: Duration,
    ) -> Result<Self, String> {
        let quiz = store.load_quiz(quiz_id).map_err(|e| e.to_string())?;
        let user = store.load_user(user_id).map_err(|e| e.to_string())?;

        let session = QuizSession::start(quiz.clone())
            .map_err(|e| format!("Cannot start quiz '{}': {}", quiz.title, e))?;
        let session = Arc::new(Mutex::new(session));

        let (sender, finished) = watch::channel(None);
        let completion = Arc::new(Completion {
            store,
            user_id: user.id.clone(),
            sender,
            unsaved: StdMutex::new(None),
        });

        let timer = quiz
            .has_timer()
            .then(|| Self::start_timer(session.clone(), completion.clone(), tick_period));

        log::info!(
            "user {} started quiz {} ({} questions, {}s limit)",
            user.id,
            quiz.id,
            quiz.questions.len(),
            quiz.time_limit_seconds
        );

        Ok(Self {
            user,
            quiz,
            session,
            completion,
            finished,
            timer,
        })
    }

    fn start_timer(
        session: Arc<Mutex<QuizSession>>,
        completion: Arc<Completion>,
        period: Duration,
    ) -> QuizTimer {
        QuizTimer::start(period, move || {
            let session = session.clone();
            let completion = completion.clone();
            async move {
                let mut guard = session.lock().await;
                match guard.tick() {
                    SessionEvent::Ticked(_) => TickControl::Continue,
                    SessionEvent::Finished(result) => {
                        log::info!("time is up for quiz {}", guard.quiz().id);
                        // 保存失败的记录留到下次 finish 重试
                        if completion.record(guard.quiz(), &result).is_err() {
                            log::warn!("attempt for quiz {} kept for retry", guard.quiz().id);
                        }
                        TickControl::Stop
                    }
                    _ => TickControl::Stop,
                }
            }
        })
    }

    /// 处理一次状态转移的结果：交卷时保存并停表，已交卷时重试未保存的记录
    fn settle(&mut self, session: &QuizSession, event: &SessionEvent) -> Result<(), String> {
        match event {
            SessionEvent::Finished(result) => {
                self.stop_timer();
                self.completion.record(session.quiz(), result)
            }
            _ if session.phase() == Phase::Finished => self.completion.retry(),
            _ => Ok(()),
        }
    }

    fn stop_timer(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
    }

    pub async fn select_answer(&self, option: usize) -> Result<SessionSnapshot, String> {
        let mut session = self.session.lock().await;
        session.select_answer(option).map_err(|e| e.to_string())?;
        Ok(session.snapshot())
    }

    /// 下一题；在最后一题时交卷
    pub async fn next(&mut self) -> Result<SessionSnapshot, String> {
        let session = self.session.clone();
        let mut session = session.lock().await;
        let event = session.next();
        self.settle(&session, &event)?;
        Ok(session.snapshot())
    }

    /// 手动交卷，重复调用返回同一结果；记录尚未保存时会重试并返回保存错误
    pub async fn finish(&mut self) -> Result<QuizResult, String> {
        let session = self.session.clone();
        let mut session = session.lock().await;
        let event = session.finish();
        self.settle(&session, &event)?;

        session
            .result()
            .cloned()
            .ok_or_else(|| "Quiz is not finished".to_string())
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    pub async fn review(&self) -> Option<Vec<ReviewEntry>> {
        self.session.lock().await.review()
    }

    pub fn result(&self) -> Option<QuizResult> {
        self.finished.borrow().clone()
    }

    /// 交卷后作答记录是否仍未写入存储
    pub fn has_unsaved_attempt(&self) -> bool {
        self.completion.has_unsaved()
    }

    pub fn is_timer_running(&self) -> bool {
        self.timer.as_ref().map(QuizTimer::is_running).unwrap_or(false)
    }

    /// 等待交卷（手动或超时）
    pub async fn wait_finished(&self) -> Result<QuizResult, String> {
        let mut receiver = self.finished.clone();
        let result = receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|e| e.to_string())?;

        result
            .clone()
            .ok_or_else(|| "Quiz is not finished".to_string())
    }

    /// 及格时生成证书
    pub fn certificate(&self, issued_on: NaiveDate) -> Option<Certificate> {
        let result = self.result()?;
        Certificate::issue(&self.user, &self.quiz, &result, issued_on)
    }

    pub fn user(&self) -> &UserProfile {
        &self.user
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    /// 放弃作答，不保存任何记录
    pub fn abandon(mut self) {
        self.stop_timer();
        log::info!("user {} abandoned quiz {}", self.user.id, self.quiz.id);
    }
}
