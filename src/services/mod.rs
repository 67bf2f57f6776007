// 服务模块
// 提供核心业务逻辑服务

pub mod certificate;
pub mod database;
pub mod generator;
pub mod session;
pub mod timer;

pub use certificate::Certificate;

pub use database::{DatabaseService, QuizStore};

pub use generator::{
    parse_generated_quiz,
    GenerateQuizInput,
    GeneratedQuestion,
    GeneratedQuiz,
    GeneratorConfig,
    QuizGenerationPrompt,
    QuizGenerator,
    SourceType,
};

pub use session::{
    validate_quiz,
    Phase,
    QuizResult,
    QuizSession,
    ReviewEntry,
    SessionError,
    SessionEvent,
    SessionSnapshot,
};

pub use timer::{QuizTimer, TickControl};
