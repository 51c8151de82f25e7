pub mod checker;
pub mod compiler;
pub mod config;
pub mod error;
pub mod judge;
pub mod monitor;
pub mod report;
pub mod supervise;
pub mod verdict;

pub fn create_timestamp() -> String {
    use chrono::{SecondsFormat, Utc};
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
