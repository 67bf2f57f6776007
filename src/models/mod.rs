use serde::{Deserialize, Serialize};

/// 每道选择题固定的选项数量
pub const OPTIONS_PER_QUESTION: usize = 4;

/// 及格线（百分比），也是证书发放门槛
pub const PASS_THRESHOLD_PERCENT: u32 = 70;

/// 测验
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(default, alias = "timeLimit")]
    pub time_limit_seconds: u32, // 0 表示不计时
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn has_timer(&self) -> bool {
        self.time_limit_seconds > 0
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }
}

/// 单选题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(alias = "question")]
    pub text: String,
    pub options: Vec<String>,
    #[serde(alias = "answerIndex")]
    pub correct_index: usize,
}

/// 一次完成的测验记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub quiz_id: String,
    pub quiz_title: String,
    pub score: u32,
    pub total: u32,
    pub date: String, // RFC 3339
}

impl QuizAttempt {
    /// 该次记录的得分百分比，四舍五入
    pub fn percent(&self) -> u32 {
        round_percent(self.score, self.total)
    }

    pub fn passed(&self) -> bool {
        self.percent() >= PASS_THRESHOLD_PERCENT
    }
}

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
            Role::SuperAdmin => "superadmin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            "superadmin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }
}

/// 用户资料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// 用户测验统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptStats {
    pub quizzes_taken: u32,
    pub average_score: u32, // 各次百分比的平均值
    pub passed_count: u32,
}

impl AttemptStats {
    pub fn from_attempts(attempts: &[QuizAttempt]) -> Self {
        if attempts.is_empty() {
            return Self::default();
        }

        let count = attempts.len() as u32;
        let percent_sum: u32 = attempts.iter().map(QuizAttempt::percent).sum();

        Self {
            quizzes_taken: count,
            average_score: round_ratio(percent_sum, count),
            passed_count: attempts.iter().filter(|a| a.passed()).count() as u32,
        }
    }
}

/// round(100 * part / whole)，0.5 向上取整；whole 为 0 时返回 0
pub fn round_percent(part: u32, whole: u32) -> u32 {
    round_ratio(part.saturating_mul(100), whole)
}

fn round_ratio(numerator: u32, denominator: u32) -> u32 {
    if denominator == 0 {
        return 0;
    }
    let (n, d) = (numerator as u64, denominator as u64);
    ((2 * n + d) / (2 * d)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(score: u32, total: u32) -> QuizAttempt {
        QuizAttempt {
            quiz_id: "q".to_string(),
            quiz_title: "Quiz".to_string(),
            score,
            total,
            date: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_round_percent_half_up() {
        assert_eq!(round_percent(7, 10), 70);
        assert_eq!(round_percent(1, 8), 13);
        assert_eq!(round_percent(2, 3), 67);
        assert_eq!(round_percent(1, 3), 33);
        assert_eq!(round_percent(0, 0), 0);
    }

    #[test]
    fn test_attempt_stats() {
        let stats = AttemptStats::from_attempts(&[attempt(7, 10), attempt(1, 2), attempt(4, 4)]);

        assert_eq!(stats.quizzes_taken, 3);
        assert_eq!(stats.average_score, 73);
        assert_eq!(stats.passed_count, 2);
        assert_eq!(AttemptStats::from_attempts(&[]), AttemptStats::default());
    }

    #[test]
    fn test_quiz_accepts_original_field_names() {
        let json = r#"{
            "title": "Rust basics",
            "category": "programming",
            "timeLimit": 60,
            "questions": [
                {"question": "2 + 2?", "options": ["1", "2", "3", "4"], "answerIndex": 3}
            ]
        }"#;

        let quiz: Quiz = serde_json::from_str(json).unwrap();
        assert_eq!(quiz.time_limit_seconds, 60);
        assert!(quiz.id.is_empty());
        assert_eq!(quiz.questions[0].correct_index, 3);
        assert_eq!(quiz.questions[0].text, "2 + 2?");
    }

    #[test]
    fn test_role_round_trip_str() {
        for role in [Role::Student, Role::Teacher, Role::Admin, Role::SuperAdmin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("guest"), None);
    }
}
