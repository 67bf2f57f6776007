//! 结业证书

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Quiz, UserProfile};
use crate::services::session::QuizResult;

const ISSUER: &str = "EduQuest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub user_name: String,
    pub quiz_title: String,
    pub score_percent: u32,
    pub issued_on: NaiveDate,
}

impl Certificate {
    /// 及格才发放证书
    pub fn issue(user: &UserProfile, quiz: &Quiz, result: &QuizResult, issued_on: NaiveDate) -> Option<Self> {
        if !result.passed {
            return None;
        }

        Some(Self {
            user_name: user.name.clone(),
            quiz_title: quiz.title.clone(),
            score_percent: result.score_percent,
            issued_on,
        })
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CERTIFICATE OF ACHIEVEMENT")?;
        writeln!(f, "This certificate is proudly presented to {}", self.user_name)?;
        writeln!(
            f,
            "for successfully completing the {} quiz with a score of {}%.",
            self.quiz_title, self.score_percent
        )?;
        write!(f, "Issued by {} on {}", ISSUER, self.issued_on.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::session::tests::sample_quiz;

    fn user() -> UserProfile {
        UserProfile {
            id: "u1".into(),
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            role: Role::Student,
        }
    }

    fn result(score: u32, total: u32, score_percent: u32) -> QuizResult {
        QuizResult { score, total, score_percent, passed: score_percent >= 70 }
    }

    #[test]
    fn test_issue_only_when_passed() {
        let quiz = sample_quiz(10, 0);
        let date = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();

        assert!(Certificate::issue(&user(), &quiz, &result(6, 10, 60), date).is_none());

        let cert = Certificate::issue(&user(), &quiz, &result(7, 10, 70), date).unwrap();
        assert_eq!(cert.user_name, "Ada Lovelace");
        assert_eq!(cert.quiz_title, quiz.title);
        assert_eq!(cert.score_percent, 70);
    }

    #[test]
    fn test_display_mentions_name_and_score() {
        let cert = Certificate {
            user_name: "Ada".into(),
            quiz_title: "Ownership".into(),
            score_percent: 90,
            issued_on: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
        };

        let text = cert.to_string();
        assert!(text.contains("Ada"));
        assert!(text.contains("Ownership quiz with a score of 90%"));
        assert!(text.ends_with("2026-05-01"));
    }
}
