//! AI 出题命令模块
//! 生成测验草稿并可直接存入题库

use serde::{Deserialize, Serialize};

use crate::services::database::DatabaseService;
use crate::services::generator::{GenerateQuizInput, GeneratedQuiz, QuizGenerator};

/// 生成结果传输对象
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuizDto {
    pub quiz_id: Option<String>,
    pub title: String,
    pub question_count: usize,
}

/// 生成测验；`save` 为 true 时写入题库
pub async fn generate_quiz(
    generator: &QuizGenerator,
    db: &DatabaseService,
    input: GenerateQuizInput,
    time_limit_seconds: u32,
    save: bool,
) -> Result<GeneratedQuizDto, String> {
    let generated = generator.generate(&input).await.map_err(|e| format!("{:#}", e))?;

    store_generated(db, generated, &input.category, time_limit_seconds, save)
}

fn store_generated(
    db: &DatabaseService,
    generated: GeneratedQuiz,
    category: &str,
    time_limit_seconds: u32,
    save: bool,
) -> Result<GeneratedQuizDto, String> {
    let quiz = generated
        .into_quiz(category, time_limit_seconds)
        .map_err(|e| e.to_string())?;

    let quiz_id = if save {
        Some(db.add_quiz(&quiz).map_err(|e| e.to_string())?)
    } else {
        None
    };

    Ok(GeneratedQuizDto {
        quiz_id,
        title: quiz.title,
        question_count: quiz.questions.len(),
    })
}
