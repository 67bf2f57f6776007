use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};

use eduquest::commands::{self, QuizController};
use eduquest::services::{DatabaseService, GenerateQuizInput, QuizGenerator, SourceType};
use eduquest::{logging, utils, AppConfig, Phase};

#[derive(Parser, Debug)]
#[command(name = "eduquest", version, about = "EduQuest 限时测验终端")]
struct CliArgs {
    /// 数据库文件路径（默认在用户数据目录下）
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// 日志级别：error / warn / info / debug / trace
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// 同时写入日志文件
    #[arg(long, global = true)]
    log_to_file: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 列出测验
    List {
        #[arg(long)]
        category: Option<String>,
    },
    /// 列出分类
    Categories,
    /// 从 JSON 文件导入测验
    Import { file: PathBuf },
    /// 删除测验
    Delete { quiz_id: String },
    /// 添加用户
    AddUser {
        name: String,
        email: String,
        #[arg(long, default_value = "student")]
        role: String,
    },
    /// 查看作答历史
    History { user_id: String },
    /// 开始作答
    Take {
        quiz_id: String,
        #[arg(long)]
        user: String,
    },
    /// 用 AI 生成测验
    Generate {
        /// 主题或笔记文件内容
        source: String,
        #[arg(long, value_enum, default_value = "topic")]
        from: SourceArg,
        #[arg(long, default_value_t = 5)]
        questions: u32,
        #[arg(long)]
        category: String,
        /// 时限（秒），0 表示不计时
        #[arg(long, default_value_t = 0)]
        time_limit: u32,
        #[arg(long)]
        save: bool,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SourceArg {
    Topic,
    /// source 参数视为笔记文件路径
    Note,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = CliArgs::parse();

    let mut config = AppConfig::from_env();
    if let Some(db) = args.db {
        config.db_path = db;
    }
    if let Some(level) = args.log_level {
        config.log_level = level
            .parse::<log::LevelFilter>()
            .map_err(|_| anyhow!("invalid log level: {}", level))?;
    }
    if args.log_to_file && config.log_file.is_none() {
        config.log_file = Some(utils::get_log_path());
    }

    logging::init(config.log_level, config.log_file.as_deref())?;

    let db = Arc::new(DatabaseService::open(&config.db_path)?);

    match args.command {
        Command::List { category } => {
            let quizzes = commands::get_quizzes(&db, category.as_deref()).map_err(|e| anyhow!(e))?;
            if quizzes.is_empty() {
                println!("No quizzes yet. Import some with `eduquest import <file>`.");
            }
            for q in quizzes {
                let timer = match q.time_limit_seconds {
                    0 => "untimed".to_string(),
                    s => format!("{}s", s),
                };
                println!("{}  [{}] {} ({} questions, {})", q.id, q.category, q.title, q.question_count, timer);
            }
        }
        Command::Categories => {
            for c in commands::get_categories(&db).map_err(|e| anyhow!(e))? {
                println!("{}", c);
            }
        }
        Command::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let result = commands::import_quizzes(&db, &json).map_err(|e| anyhow!(e))?;
            for id in &result.imported_ids {
                println!("imported {}", id);
            }
            for err in &result.errors {
                eprintln!("skipped: {}", err);
            }
        }
        Command::Delete { quiz_id } => {
            commands::delete_quiz(&db, &quiz_id).map_err(|e| anyhow!(e))?;
            println!("deleted {}", quiz_id);
        }
        Command::AddUser { name, email, role } => {
            let user = commands::create_user(&db, &name, &email, &role).map_err(|e| anyhow!(e))?;
            println!("{}", user.id);
        }
        Command::History { user_id } => {
            let history = commands::get_quiz_history(&db, &user_id).map_err(|e| anyhow!(e))?;
            let stats = commands::get_attempt_stats(&db, &user_id).map_err(|e| anyhow!(e))?;
            for a in history {
                println!(
                    "{}  {}  {}/{} ({}%) {}",
                    a.date,
                    a.quiz_title,
                    a.score,
                    a.total,
                    a.percent,
                    if a.passed { "PASS" } else { "FAIL" }
                );
            }
            println!(
                "quizzes taken: {}, average: {}%, passed: {}",
                stats.quizzes_taken, stats.average_score, stats.passed_count
            );
        }
        Command::Take { quiz_id, user } => {
            take_quiz(db, &config, &quiz_id, &user).await?;
        }
        Command::Generate { source, from, questions, category, time_limit, save } => {
            let (source_type, source_text) = match from {
                SourceArg::Topic => (SourceType::Topic, source),
                SourceArg::Note => (
                    SourceType::Note,
                    std::fs::read_to_string(&source)
                        .with_context(|| format!("failed to read note {}", source))?,
                ),
            };
            let input = GenerateQuizInput {
                source_type,
                source_text,
                num_questions: questions,
                category,
            };

            let generator = QuizGenerator::new(config.generator.clone());
            if !generator.is_healthy().await {
                log::warn!("completion server at {} did not pass health check", config.generator.base_url);
            }
            let dto = commands::generate_quiz(&generator, &db, input, time_limit, save)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("{} ({} questions)", dto.title, dto.question_count);
            if let Some(id) = dto.quiz_id {
                println!("saved as {}", id);
            }
        }
    }

    Ok(())
}

async fn take_quiz(db: Arc<DatabaseService>, config: &AppConfig, quiz_id: &str, user_id: &str) -> Result<()> {
    let mut controller = QuizController::start(db, user_id, quiz_id, config.tick_interval)
        .await
        .map_err(|e| anyhow!(e))?;

    println!("{}", controller.quiz().title);
    println!("Answer with 1-4, `n` for next, `f` to finish, `t` for time left, `q` to quit.");
    print_question(&controller).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = controller.wait_finished() => {
                println!("\nTime is up!");
                break;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            controller.abandon();
            println!("Quiz abandoned.");
            return Ok(());
        };

        match line.trim() {
            "q" => {
                controller.abandon();
                println!("Quiz abandoned.");
                return Ok(());
            }
            "t" => {
                let snap = controller.snapshot().await;
                if snap.has_timer {
                    println!("{}s left", snap.remaining_seconds);
                } else {
                    println!("No time limit.");
                }
            }
            "f" => break,
            "n" | "" => {
                // 和网页版一致：未作答不能进入下一题
                if controller.snapshot().await.current_answer.is_none() {
                    println!("Pick an answer first.");
                    continue;
                }
                match controller.next().await {
                    Ok(snap) if snap.phase == Phase::Finished => break,
                    Ok(_) => print_question(&controller).await,
                    // 最后一题交卷但保存失败，交给下面的 finish 重试
                    Err(e) => {
                        log::warn!("{}", e);
                        break;
                    }
                }
            }
            other => match other.parse::<usize>() {
                Ok(n) if (1..=4).contains(&n) => {
                    controller.select_answer(n - 1).await.map_err(|e| anyhow!(e))?;
                    println!("Selected {}.", n);
                }
                _ => println!("Unknown input: {}", other),
            },
        }
    }

    // 手动交卷或超时都走 finish：未交卷时交卷，记录未保存时重试
    let result = match controller.finish().await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("warning: {}", e);
            controller.result().ok_or_else(|| anyhow!(e))?
        }
    };
    println!(
        "\nQuiz complete! Score: {}/{} ({}%) - {}",
        result.score,
        result.total,
        result.score_percent,
        if result.passed { "passed" } else { "not passed" }
    );

    if let Some(review) = controller.review().await {
        for entry in review {
            let mark = if entry.is_correct { "✓" } else { "✗" };
            let selected = entry
                .selected
                .map(|s| (s + 1).to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{} {}. {} (yours: {}, correct: {})",
                mark,
                entry.index + 1,
                entry.text,
                selected,
                entry.correct_index + 1
            );
        }
    }

    if let Some(cert) = controller.certificate(chrono::Local::now().date_naive()) {
        println!("\n{}", cert);
    }

    Ok(())
}

async fn print_question(controller: &QuizController) {
    let snap = controller.snapshot().await;
    let question = &controller.quiz().questions[snap.current_index];

    println!("\nQuestion {} of {}", snap.current_index + 1, snap.total_questions);
    println!("{}", question.text);
    for (i, option) in question.options.iter().enumerate() {
        println!("  {}. {}", i + 1, option);
    }
}
