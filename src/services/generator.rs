//! AI 出题服务
//! 通过 llama-server 风格的补全接口，根据主题或笔记生成单选题测验

use anyhow::{anyhow, bail, Context, Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Instant;

use crate::models::{Question, Quiz, OPTIONS_PER_QUESTION};
use crate::services::session::validate_quiz;

/// 单次生成允许的题目数量上限
pub const MAX_GENERATED_QUESTIONS: u32 = 10;

/// 出题来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Topic,
    Note,
}

impl SourceType {
    fn as_str(&self) -> &'static str {
        match self {
            SourceType::Topic => "topic",
            SourceType::Note => "note",
        }
    }
}

/// 出题请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateQuizInput {
    pub source_type: SourceType,
    pub source_text: String,
    pub num_questions: u32,
    pub category: String,
}

impl GenerateQuizInput {
    pub fn validate(&self) -> Result<()> {
        if self.source_text.trim().is_empty() {
            bail!("source text is empty");
        }
        if !(1..=MAX_GENERATED_QUESTIONS).contains(&self.num_questions) {
            bail!(
                "num_questions must be between 1 and {}, got {}",
                MAX_GENERATED_QUESTIONS,
                self.num_questions
            );
        }
        Ok(())
    }
}

/// 模型输出的题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer_index: usize,
}

/// 模型输出的测验
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuiz {
    pub title: String,
    pub questions: Vec<GeneratedQuestion>,
}

impl GeneratedQuiz {
    /// 转换为可作答的测验，id 留空由存储层生成
    pub fn into_quiz(self, category: &str, time_limit_seconds: u32) -> Result<Quiz> {
        let quiz = Quiz {
            id: String::new(),
            title: self.title,
            category: category.to_string(),
            time_limit_seconds,
            questions: self
                .questions
                .into_iter()
                .map(|q| Question {
                    text: q.question,
                    options: q.options,
                    correct_index: q.answer_index,
                })
                .collect(),
        };

        validate_quiz(&quiz).map_err(|e| anyhow!("generated quiz is unusable: {}", e))?;
        Ok(quiz)
    }
}

/// 补全服务配置
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

/// Completion 请求
#[derive(Debug, Serialize)]
struct CompletionRequest {
    prompt: String,
    n_predict: u32,
    temperature: f32,
    stop: Vec<String>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_prompt: Option<bool>,
}

/// Completion 响应
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

/// 出题提示词
pub struct QuizGenerationPrompt;

impl QuizGenerationPrompt {
    pub fn build(input: &GenerateQuizInput) -> String {
        format!(
            r#"You are an expert educator tasked with creating a multiple-choice quiz.
The quiz should be based on the provided source material and belong to the given category.
Generate a quiz with exactly {} questions.
For each question, provide {} options and indicate the correct answer's index.
The questions should be clear, concise, and relevant to the source material.
The options should be plausible, with one clear correct answer.
Generate a creative and descriptive title for the quiz.

Category: {}
Source Material (from a {}):
---
{}
---

Output format (JSON):
{{
  "title": "Quiz title",
  "questions": [
    {{"question": "Question text", "options": ["A", "B", "C", "D"], "answerIndex": 0}}
  ]
}}

Output only the JSON, no other text."#,
            input.num_questions,
            OPTIONS_PER_QUESTION,
            input.category,
            input.source_type.as_str(),
            input.source_text
        )
    }
}

fn json_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"))
}

/// 解析模型输出，容忍代码块和前后说明文字
pub fn parse_generated_quiz(text: &str) -> Result<GeneratedQuiz> {
    let json = json_object_pattern()
        .find(text)
        .map(|m| m.as_str())
        .ok_or_else(|| anyhow!("model output contains no JSON object"))?;

    let quiz: GeneratedQuiz =
        serde_json::from_str(json).context("failed to parse generated quiz")?;

    if quiz.questions.is_empty() {
        bail!("generated quiz has no questions");
    }
    Ok(quiz)
}

/// AI 出题客户端
#[derive(Clone)]
pub struct QuizGenerator {
    config: GeneratorConfig,
    http_client: reqwest::Client,
}

impl QuizGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// 健康检查
    pub async fn is_healthy(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);

        match self.http_client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// 推理补全
    async fn complete(&self, prompt: String) -> Result<String, Error> {
        let url = format!("{}/completion", self.config.base_url);

        let request = CompletionRequest {
            prompt,
            n_predict: self.config.max_tokens,
            temperature: self.config.temperature,
            stop: vec![],
            stream: false,
            cache_prompt: Some(true),
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("completion server unreachable at {}", url))?
            .error_for_status()?
            .json::<CompletionResponse>()
            .await?;

        Ok(response.content)
    }

    /// 生成测验草稿，返回前已校验
    pub async fn generate(&self, input: &GenerateQuizInput) -> Result<GeneratedQuiz> {
        input.validate()?;

        let start = Instant::now();
        let text = self.complete(QuizGenerationPrompt::build(input)).await?;
        let quiz = parse_generated_quiz(&text)?;

        if quiz.questions.len() as u32 != input.num_questions {
            log::warn!(
                "asked for {} questions, model produced {}",
                input.num_questions,
                quiz.questions.len()
            );
        }
        log::info!(
            "generated quiz '{}' in {} ms",
            quiz.title,
            start.elapsed().as_millis()
        );

        Ok(quiz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(num_questions: u32) -> GenerateQuizInput {
        GenerateQuizInput {
            source_type: SourceType::Note,
            source_text: "Rust ownership moves values between bindings.".to_string(),
            num_questions,
            category: "programming".to_string(),
        }
    }

    #[test]
    fn test_prompt_contains_request_details() {
        let prompt = QuizGenerationPrompt::build(&input(5));

        assert!(prompt.contains("exactly 5 questions"));
        assert!(prompt.contains("Category: programming"));
        assert!(prompt.contains("(from a note)"));
        assert!(prompt.contains("Rust ownership moves values"));
    }

    #[test]
    fn test_input_validation() {
        assert!(input(1).validate().is_ok());
        assert!(input(10).validate().is_ok());
        assert!(input(0).validate().is_err());
        assert!(input(11).validate().is_err());

        let mut blank = input(3);
        blank.source_text = "   ".to_string();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_parse_tolerates_code_fence() {
        let text = r#"Here is your quiz:
```json
{
  "title": "Borrowing Basics",
  "questions": [
    {"question": "Who owns a moved value?", "options": ["old", "new", "both", "none"], "answerIndex": 1}
  ]
}
```"#;

        let quiz = parse_generated_quiz(text).unwrap();
        assert_eq!(quiz.title, "Borrowing Basics");
        assert_eq!(quiz.questions[0].answer_index, 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_generated_quiz("no json here").is_err());
        assert!(parse_generated_quiz(r#"{"title": "x", "questions": []}"#).is_err());
    }

    #[test]
    fn test_into_quiz_validates_shape() {
        let good = GeneratedQuiz {
            title: "T".into(),
            questions: vec![GeneratedQuestion {
                question: "Q".into(),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                answer_index: 2,
            }],
        };
        let quiz = good.clone().into_quiz("science", 120).unwrap();
        assert_eq!(quiz.category, "science");
        assert_eq!(quiz.time_limit_seconds, 120);
        assert_eq!(quiz.questions[0].correct_index, 2);

        let mut bad = good;
        bad.questions[0].answer_index = 7;
        assert!(bad.into_quiz("science", 0).is_err());
    }
}
