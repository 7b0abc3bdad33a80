use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    IO(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("bad selector '{0}'")]
    Selector(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {0} from {1}")]
    HttpStatus(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self { AppError::IO(format!("{}", e)) }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self { AppError::Parse(format!("json: {}", e)) }
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self { AppError::IO(format!("csv: {}", e)) }
}
