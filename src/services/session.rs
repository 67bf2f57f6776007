//! 限时测验会话引擎
//! 管理单次作答的生命周期：选项记录、题目切换、倒计时、判分与及格判定

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{round_percent, Question, Quiz, OPTIONS_PER_QUESTION, PASS_THRESHOLD_PERCENT};

/// 会话错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("quiz has no questions")]
    EmptyQuiz,
    #[error("question {question} has {found} options, expected 4")]
    WrongOptionCount { question: usize, found: usize },
    #[error("question {question} has correct index {index} outside 0..4")]
    CorrectIndexOutOfRange { question: usize, index: usize },
    #[error("option index {0} is outside 0..4")]
    InvalidOption(usize),
}

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    InProgress,
    Finished,
}

/// 判分结果，会话结束时生成一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub score: u32,
    pub total: u32,
    pub score_percent: u32,
    pub passed: bool,
}

impl QuizResult {
    fn new(score: u32, total: u32) -> Self {
        let score_percent = round_percent(score, total);
        Self {
            score,
            total,
            score_percent,
            passed: score_percent >= PASS_THRESHOLD_PERCENT,
        }
    }
}

/// 每次状态转移的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    AnswerRecorded { question: usize, option: usize },
    Advanced(usize),
    Ticked(u32),
    Finished(QuizResult),
    /// 会话已结束或不计时，调用无效果
    Ignored,
}

/// 会话快照，宿主据此重新渲染
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub quiz_id: String,
    pub quiz_title: String,
    pub current_index: usize,
    pub total_questions: usize,
    pub current_answer: Option<usize>,
    pub answered_count: usize,
    pub remaining_seconds: u32,
    pub has_timer: bool,
    pub phase: Phase,
    pub result: Option<QuizResult>,
}

/// 结束后的逐题回顾
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub index: usize,
    pub text: String,
    pub selected: Option<usize>,
    pub correct_index: usize,
    pub is_correct: bool,
}

/// 检查测验能否开始作答
pub fn validate_quiz(quiz: &Quiz) -> Result<(), SessionError> {
    if quiz.questions.is_empty() {
        return Err(SessionError::EmptyQuiz);
    }

    for (i, q) in quiz.questions.iter().enumerate() {
        if q.options.len() != OPTIONS_PER_QUESTION {
            return Err(SessionError::WrongOptionCount {
                question: i,
                found: q.options.len(),
            });
        }
        if q.correct_index >= OPTIONS_PER_QUESTION {
            return Err(SessionError::CorrectIndexOutOfRange {
                question: i,
                index: q.correct_index,
            });
        }
    }

    Ok(())
}

/// 单次作答会话
#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz: Quiz,
    current_index: usize,
    answers: BTreeMap<usize, usize>,
    remaining_seconds: u32,
    phase: Phase,
    result: Option<QuizResult>,
}

impl QuizSession {
    /// 开始作答，测验不合法时拒绝创建会话
    pub fn start(quiz: Quiz) -> Result<Self, SessionError> {
        validate_quiz(&quiz)?;

        let remaining_seconds = quiz.time_limit_seconds;
        Ok(Self {
            quiz,
            current_index: 0,
            answers: BTreeMap::new(),
            remaining_seconds,
            phase: Phase::InProgress,
            result: None,
        })
    }

    /// 记录当前题目的选项，覆盖之前的选择
    pub fn select_answer(&mut self, option: usize) -> Result<SessionEvent, SessionError> {
        if self.is_finished() {
            return Ok(SessionEvent::Ignored);
        }
        if option >= OPTIONS_PER_QUESTION {
            return Err(SessionError::InvalidOption(option));
        }

        self.answers.insert(self.current_index, option);
        Ok(SessionEvent::AnswerRecorded {
            question: self.current_index,
            option,
        })
    }

    /// 进入下一题；最后一题时交卷
    ///
    /// 未作答的题目不会阻止前进，是否要求先作答由宿主决定。
    pub fn next(&mut self) -> SessionEvent {
        if self.is_finished() {
            return SessionEvent::Ignored;
        }

        if self.current_index + 1 < self.quiz.questions.len() {
            self.current_index += 1;
            SessionEvent::Advanced(self.current_index)
        } else {
            self.finish()
        }
    }

    /// 倒计时走一秒，归零时自动交卷
    pub fn tick(&mut self) -> SessionEvent {
        if self.is_finished() || !self.quiz.has_timer() {
            return SessionEvent::Ignored;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.finish()
        } else {
            SessionEvent::Ticked(self.remaining_seconds)
        }
    }

    /// 交卷并判分，只有第一次调用生效
    pub fn finish(&mut self) -> SessionEvent {
        if self.is_finished() {
            return SessionEvent::Ignored;
        }

        let score = self
            .quiz
            .questions
            .iter()
            .enumerate()
            .filter(|(i, q)| self.answers.get(i) == Some(&q.correct_index))
            .count() as u32;

        let result = QuizResult::new(score, self.quiz.questions.len() as u32);
        self.phase = Phase::Finished;
        self.result = Some(result.clone());

        SessionEvent::Finished(result)
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> &Question {
        &self.quiz.questions[self.current_index]
    }

    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 == self.quiz.questions.len()
    }

    pub fn answer_for(&self, index: usize) -> Option<usize> {
        self.answers.get(&index).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    /// 当前进度（第几题 / 总题数）
    pub fn progress_percent(&self) -> u32 {
        round_percent(
            self.current_index as u32 + 1,
            self.quiz.questions.len() as u32,
        )
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            quiz_id: self.quiz.id.clone(),
            quiz_title: self.quiz.title.clone(),
            current_index: self.current_index,
            total_questions: self.quiz.questions.len(),
            current_answer: self.answer_for(self.current_index),
            answered_count: self.answered_count(),
            remaining_seconds: self.remaining_seconds,
            has_timer: self.quiz.has_timer(),
            phase: self.phase,
            result: self.result.clone(),
        }
    }

    /// 交卷后逐题回顾，作答中返回 None
    pub fn review(&self) -> Option<Vec<ReviewEntry>> {
        if !self.is_finished() {
            return None;
        }

        let entries = self
            .quiz
            .questions
            .iter()
            .enumerate()
            .map(|(index, q)| {
                let selected = self.answer_for(index);
                ReviewEntry {
                    index,
                    text: q.text.clone(),
                    selected,
                    correct_index: q.correct_index,
                    is_correct: selected == Some(q.correct_index),
                }
            })
            .collect();

        Some(entries)
    }
}
