// 数据库命令模块
// 提供供宿主调用的题库与作答历史命令

use serde::{Deserialize, Serialize};

use crate::models::{AttemptStats, Quiz, Role, UserProfile};
use crate::services::database::DatabaseService;

/// 测验列表项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSummaryDto {
    pub id: String,
    pub title: String,
    pub category: String,
    pub question_count: usize,
    pub time_limit_seconds: u32,
}

impl From<Quiz> for QuizSummaryDto {
    fn from(q: Quiz) -> Self {
        QuizSummaryDto {
            id: q.id,
            title: q.title,
            category: q.category,
            question_count: q.questions.len(),
            time_limit_seconds: q.time_limit_seconds,
        }
    }
}

/// 作答历史传输对象
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttemptDto {
    pub quiz_id: String,
    pub quiz_title: String,
    pub score: u32,
    pub total: u32,
    pub percent: u32,
    pub passed: bool,
    pub date: String,
}

/// 批量导入结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    pub imported_ids: Vec<String>,
    pub errors: Vec<String>,
}

/// 获取测验列表，可按分类过滤
pub fn get_quizzes(db: &DatabaseService, category: Option<&str>) -> Result<Vec<QuizSummaryDto>, String> {
    let quizzes = match category {
        Some(c) => db.list_quizzes_by_category(c),
        None => db.list_quizzes(),
    }
    .map_err(|e| e.to_string())?;

    Ok(quizzes.into_iter().map(QuizSummaryDto::from).collect())
}

pub fn get_categories(db: &DatabaseService) -> Result<Vec<String>, String> {
    db.list_categories().map_err(|e| e.to_string())
}

pub fn delete_quiz(db: &DatabaseService, id: &str) -> Result<(), String> {
    if db.delete_quiz(id).map_err(|e| e.to_string())? {
        Ok(())
    } else {
        Err(format!("Quiz {} not found", id))
    }
}

/// 从 JSON 导入测验，接受单个对象或数组；逐个校验，失败的记录到 errors
pub fn import_quizzes(db: &DatabaseService, json: &str) -> Result<ImportResult, String> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| format!("Invalid JSON: {}", e))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };

    let mut imported_ids = Vec::new();
    let mut errors = Vec::new();

    for (idx, item) in items.into_iter().enumerate() {
        let quiz = match serde_json::from_value::<Quiz>(item) {
            Ok(q) => q,
            Err(e) => {
                errors.push(format!("Quiz {}: {}", idx + 1, e));
                continue;
            }
        };

        match db.add_quiz(&quiz) {
            Ok(id) => imported_ids.push(id),
            Err(e) => errors.push(format!("Quiz {}: {}", idx + 1, e)),
        }
    }

    Ok(ImportResult {
        success: errors.is_empty(),
        imported_ids,
        errors,
    })
}

pub fn create_user(db: &DatabaseService, name: &str, email: &str, role: &str) -> Result<UserProfile, String> {
    let role = Role::parse(role).ok_or_else(|| format!("Unknown role: {}", role))?;
    db.add_user(name, email, role).map_err(|e| e.to_string())
}

pub fn get_quiz_history(db: &DatabaseService, user_id: &str) -> Result<Vec<QuizAttemptDto>, String> {
    let history = db.get_quiz_history(user_id).map_err(|e| e.to_string())?;

    let dtos = history
        .into_iter()
        .map(|a| QuizAttemptDto {
            percent: a.percent(),
            passed: a.passed(),
            quiz_id: a.quiz_id,
            quiz_title: a.quiz_title,
            score: a.score,
            total: a.total,
            date: a.date,
        })
        .collect();

    Ok(dtos)
}

pub fn get_attempt_stats(db: &DatabaseService, user_id: &str) -> Result<AttemptStats, String> {
    db.get_attempt_stats(user_id).map_err(|e| e.to_string())
}
