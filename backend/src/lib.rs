pub mod achievements;
pub mod analytics;
pub mod assignments;
pub mod auth;
pub mod config;
pub mod courses;
pub mod db;
pub mod enrollments;
pub mod error;
pub mod extractors;
pub mod lessons;
pub mod posts;
pub mod progress;
pub mod quizzes;
pub mod ratings;
pub mod stats;
pub mod study_sessions;
pub mod web_server;
