pub mod commands;
pub mod config;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use models::{Question, Quiz, QuizAttempt, UserProfile};
pub use services::session::{Phase, QuizResult, QuizSession, SessionError, SessionEvent};
