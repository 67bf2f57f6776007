// 数据库服务模块
// 提供 SQLite 存储：测验、用户与作答历史

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{AttemptStats, Question, Quiz, QuizAttempt, Role, UserProfile};
use crate::services::session::validate_quiz;

/// 会话引擎依赖的内容存储
pub trait QuizStore: Send + Sync {
    fn load_quiz(&self, quiz_id: &str) -> Result<Quiz>;
    fn load_user(&self, user_id: &str) -> Result<UserProfile>;
    fn append_quiz_attempt(&self, user_id: &str, attempt: &QuizAttempt) -> Result<()>;
}

/// 数据库服务
pub struct DatabaseService {
    pool: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// 打开（必要时创建）数据库文件
    pub fn open(db_path: &Path) -> Result<Self> {
        // 确保数据目录存在
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open database {}", db_path.display()))?;

        let service = Self {
            pool: Arc::new(Mutex::new(conn)),
            db_path: Some(db_path.to_path_buf()),
        };
        service.initialize()?;
        log::info!("database ready at {}", db_path.display());
        Ok(service)
    }

    /// 内存数据库，用于测试
    pub fn open_in_memory() -> Result<Self> {
        let service = Self {
            pool: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            db_path: None,
        };
        service.initialize()?;
        Ok(service)
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.pool
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    /// 初始化数据库表结构
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS quizzes (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                category TEXT NOT NULL,
                time_limit INTEGER NOT NULL DEFAULT 0,
                questions TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS quiz_attempts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                quiz_id TEXT NOT NULL,
                quiz_title TEXT NOT NULL,
                score INTEGER NOT NULL,
                total INTEGER NOT NULL,
                date TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_quizzes_category ON quizzes(category);
            CREATE INDEX IF NOT EXISTS idx_attempts_user_id ON quiz_attempts(user_id);
            ",
        )
        .context("failed to create tables")?;

        Ok(())
    }

    // ==================== 测验 ====================

    /// 添加测验，返回新 id；quiz.id 为空时生成 uuid
    pub fn add_quiz(&self, quiz: &Quiz) -> Result<String> {
        validate_quiz(quiz).map_err(|e| anyhow!("invalid quiz '{}': {}", quiz.title, e))?;

        let id = if quiz.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            quiz.id.clone()
        };
        let questions = serde_json::to_string(&quiz.questions)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn()?;
        // 已存在的 id 不覆盖，交给调用方报错
        conn.execute(
            "INSERT INTO quizzes (id, title, category, time_limit, questions, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            rusqlite::params![id, quiz.title, quiz.category, quiz.time_limit_seconds, questions, now],
        )
        .with_context(|| format!("failed to store quiz {}", id))?;

        log::info!("stored quiz {} ({} questions)", id, quiz.questions.len());
        Ok(id)
    }

    pub fn get_quiz(&self, id: &str) -> Result<Option<Quiz>> {
        let conn = self.conn()?;

        let quiz = conn
            .query_row(
                "SELECT id, title, category, time_limit, questions FROM quizzes WHERE id = ?",
                rusqlite::params![id],
                Self::row_to_quiz,
            )
            .optional()?;

        Ok(quiz)
    }

    pub fn list_quizzes(&self) -> Result<Vec<Quiz>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, title, category, time_limit, questions
             FROM quizzes ORDER BY created_at DESC, title",
        )?;
        let rows = stmt.query_map([], Self::row_to_quiz)?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn list_quizzes_by_category(&self, category: &str) -> Result<Vec<Quiz>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, title, category, time_limit, questions
             FROM quizzes WHERE category = ? ORDER BY title",
        )?;
        let rows = stmt.query_map(rusqlite::params![category], Self::row_to_quiz)?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// 所有测验分类（去重、排序）
    pub fn list_categories(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT DISTINCT category FROM quizzes ORDER BY category")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// 删除测验，返回是否存在
    pub fn delete_quiz(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM quizzes WHERE id = ?", rusqlite::params![id])?;
        Ok(deleted > 0)
    }

    // ==================== 用户 ====================

    pub fn add_user(&self, name: &str, email: &str, role: Role) -> Result<UserProfile> {
        let user = UserProfile {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role,
        };

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, name, email, role, created_at) VALUES (?, ?, ?, ?, ?)",
            rusqlite::params![user.id, user.name, user.email, role.as_str(), Utc::now().to_rfc3339()],
        )?;

        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserProfile>> {
        let conn = self.conn()?;

        let user = conn
            .query_row(
                "SELECT id, name, email, role FROM users WHERE id = ?",
                rusqlite::params![id],
                |row| {
                    let role: String = row.get(3)?;
                    let role = Role::parse(&role).ok_or_else(|| {
                        rusqlite::Error::FromSqlConversionFailure(
                            3,
                            rusqlite::types::Type::Text,
                            format!("unknown role '{}'", role).into(),
                        )
                    })?;
                    Ok(UserProfile {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        role,
                    })
                },
            )
            .optional()?;

        Ok(user)
    }

    // ==================== 作答历史 ====================

    /// 写入一次作答；日期统一转成 UTC 保存，历史按文本排序才正确
    pub fn append_attempt(&self, user_id: &str, attempt: &QuizAttempt) -> Result<()> {
        let date = DateTime::parse_from_rfc3339(&attempt.date)
            .with_context(|| format!("attempt date '{}' is not RFC 3339", attempt.date))?
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO quiz_attempts (id, user_id, quiz_id, quiz_title, score, total, date)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                user_id,
                attempt.quiz_id,
                attempt.quiz_title,
                attempt.score,
                attempt.total,
                date,
            ],
        )?;

        Ok(())
    }

    /// 用户的作答历史，最新的在前
    pub fn get_quiz_history(&self, user_id: &str) -> Result<Vec<QuizAttempt>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT quiz_id, quiz_title, score, total, date
             FROM quiz_attempts WHERE user_id = ? ORDER BY date DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(rusqlite::params![user_id], |row| {
            Ok(QuizAttempt {
                quiz_id: row.get(0)?,
                quiz_title: row.get(1)?,
                score: row.get(2)?,
                total: row.get(3)?,
                date: row.get(4)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_attempt_stats(&self, user_id: &str) -> Result<AttemptStats> {
        let history = self.get_quiz_history(user_id)?;
        Ok(AttemptStats::from_attempts(&history))
    }

    // ==================== 辅助方法 ====================

    fn row_to_quiz(row: &Row) -> rusqlite::Result<Quiz> {
        let questions: String = row.get(4)?;
        let questions: Vec<Question> = serde_json::from_str(&questions).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Quiz {
            id: row.get(0)?,
            title: row.get(1)?,
            category: row.get(2)?,
            time_limit_seconds: row.get(3)?,
            questions,
        })
    }
}

impl QuizStore for DatabaseService {
    fn load_quiz(&self, quiz_id: &str) -> Result<Quiz> {
        match self.get_quiz(quiz_id)? {
            Some(quiz) => Ok(quiz),
            None => bail!("quiz {} not found", quiz_id),
        }
    }

    fn load_user(&self, user_id: &str) -> Result<UserProfile> {
        match self.get_user(user_id)? {
            Some(user) => Ok(user),
            None => bail!("user {} not found", user_id),
        }
    }

    fn append_quiz_attempt(&self, user_id: &str, attempt: &QuizAttempt) -> Result<()> {
        self.append_attempt(user_id, attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session::tests::sample_quiz;

    fn attempt(quiz: &Quiz, score: u32, date: &str) -> QuizAttempt {
        QuizAttempt {
            quiz_id: quiz.id.clone(),
            quiz_title: quiz.title.clone(),
            score,
            total: quiz.questions.len() as u32,
            date: date.to_string(),
        }
    }

    #[test]
    fn test_quiz_round_trip() {
        let db = DatabaseService::open_in_memory().unwrap();
        let mut quiz = sample_quiz(3, 90);
        quiz.id.clear();

        let id = db.add_quiz(&quiz).unwrap();
        let loaded = db.get_quiz(&id).unwrap().unwrap();

        assert_eq!(loaded.id, id);
        assert_eq!(loaded.questions, quiz.questions);
        assert_eq!(loaded.time_limit_seconds, 90);
        assert!(db.get_quiz("missing").unwrap().is_none());
        assert!(db.load_quiz("missing").is_err());
    }

    #[test]
    fn test_add_quiz_rejects_malformed() {
        let db = DatabaseService::open_in_memory().unwrap();
        let mut quiz = sample_quiz(2, 0);
        quiz.questions[0].options.truncate(2);

        assert!(db.add_quiz(&quiz).is_err());
        assert!(db.list_quizzes().unwrap().is_empty());
    }

    #[test]
    fn test_categories_and_delete() {
        let db = DatabaseService::open_in_memory().unwrap();
        let mut a = sample_quiz(1, 0);
        a.id = "a".into();
        a.category = "math".into();
        let mut b = sample_quiz(1, 0);
        b.id = "b".into();
        b.category = "art".into();
        let mut c = sample_quiz(1, 0);
        c.id = "c".into();
        c.category = "math".into();
        for q in [&a, &b, &c] {
            db.add_quiz(q).unwrap();
        }

        assert_eq!(db.list_categories().unwrap(), vec!["art", "math"]);
        assert_eq!(db.list_quizzes_by_category("math").unwrap().len(), 2);

        assert!(db.delete_quiz("a").unwrap());
        assert!(!db.delete_quiz("a").unwrap());
        assert_eq!(db.list_quizzes().unwrap().len(), 2);
    }

    #[test]
    fn test_history_newest_first_and_stats() {
        let db = DatabaseService::open_in_memory().unwrap();
        let user = db.add_user("Ada", "ada@example.com", Role::Student).unwrap();
        let quiz = sample_quiz(10, 0);

        db.append_quiz_attempt(&user.id, &attempt(&quiz, 7, "2026-03-01T10:00:00+00:00"))
            .unwrap();
        db.append_quiz_attempt(&user.id, &attempt(&quiz, 4, "2026-03-02T10:00:00+00:00"))
            .unwrap();

        let history = db.get_quiz_history(&user.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].score, 4);

        let stats = db.get_attempt_stats(&user.id).unwrap();
        assert_eq!(stats.quizzes_taken, 2);
        assert_eq!(stats.average_score, 55);
        assert_eq!(stats.passed_count, 1);
    }

    #[test]
    fn test_append_rejects_bad_date() {
        let db = DatabaseService::open_in_memory().unwrap();
        let user = db.add_user("Ada", "ada@example.com", Role::Student).unwrap();

        let result = db.append_quiz_attempt(&user.id, &attempt(&sample_quiz(1, 0), 1, "yesterday"));
        assert!(result.is_err());
        assert!(db.get_quiz_history(&user.id).unwrap().is_empty());
    }

    #[test]
    fn test_history_orders_mixed_offsets() {
        let db = DatabaseService::open_in_memory().unwrap();
        let user = db.add_user("Ada", "ada@example.com", Role::Student).unwrap();
        let quiz = sample_quiz(4, 0);

        db.append_attempt(&user.id, &attempt(&quiz, 1, "2026-03-01T10:00:00Z"))
            .unwrap();
        // 09:00Z，比上一条早
        db.append_attempt(&user.id, &attempt(&quiz, 2, "2026-03-01T17:00:00+08:00"))
            .unwrap();

        let history = db.get_quiz_history(&user.id).unwrap();
        assert_eq!(history[0].score, 1);
        assert_eq!(history[0].date, "2026-03-01T10:00:00Z");
        assert_eq!(history[1].score, 2);
        assert_eq!(history[1].date, "2026-03-01T09:00:00Z");
    }

    #[test]
    fn test_add_quiz_keeps_existing_id() {
        let db = DatabaseService::open_in_memory().unwrap();
        let quiz = sample_quiz(2, 0);
        db.add_quiz(&quiz).unwrap();

        let mut other = sample_quiz(3, 0);
        other.title = "Other".into();
        assert!(db.add_quiz(&other).is_err());

        let stored = db.get_quiz(&quiz.id).unwrap().unwrap();
        assert_eq!(stored.title, quiz.title);
        assert_eq!(stored.questions.len(), 2);
    }

    #[test]
    fn test_unknown_role_is_an_error() {
        let db = DatabaseService::open_in_memory().unwrap();
        let user = db.add_user("Ada", "ada@example.com", Role::Student).unwrap();
        {
            let conn = db.conn().unwrap();
            conn.execute(
                "UPDATE users SET role = 'janitor' WHERE id = ?",
                rusqlite::params![user.id],
            )
            .unwrap();
        }

        assert!(db.get_user(&user.id).is_err());
        assert!(db.load_user(&user.id).is_err());
    }

    #[test]
    fn test_load_user() {
        let db = DatabaseService::open_in_memory().unwrap();
        let user = db.add_user("Grace", "grace@example.com", Role::Teacher).unwrap();

        assert_eq!(db.load_user(&user.id).unwrap(), user);
        assert!(db.load_user("nobody").is_err());
    }
}
