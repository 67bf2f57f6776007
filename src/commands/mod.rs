// 命令模块
// 提供供宿主（终端界面）调用的命令接口

pub mod database;
pub mod generator;
pub mod quiz;

pub use database::{
    create_user,
    delete_quiz,
    get_attempt_stats,
    get_categories,
    get_quiz_history,
    get_quizzes,
    import_quizzes,
    ImportResult,
    QuizAttemptDto,
    QuizSummaryDto,
};

pub use generator::{generate_quiz, GeneratedQuizDto};

pub use quiz::QuizController;
