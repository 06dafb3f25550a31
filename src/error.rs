use actix_web::{HttpResponse, ResponseError};
use reqwest::StatusCode;
use serde_json::json;

use crate::prim::error::PrimError;
use crate::sources::news::NewsError;

#[allow(dead_code)]
#[derive(thiserror::Error, Debug)]
pub enum BoardError {
    #[error("PRIM error: {0}")]
    Prim(#[from] PrimError),

    #[error("News error: {0}")]
    News(#[from] NewsError),

    #[error("Unknown widget: {0}")]
    UnknownWidget(String),

    #[error("Widget has no dedicated line: {0}")]
    NoLine(String),

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

impl ResponseError for BoardError {
    fn error_response(&self) -> actix_web::HttpResponse<actix_web::body::BoxBody> {
        match self {
            BoardError::UnknownWidget(_) | BoardError::NoLine(_) => {
                HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
            }
            other => {
                log::error!("{}", other);
                actix_web::HttpResponse::InternalServerError().finish()
            }
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            BoardError::UnknownWidget(_) | BoardError::NoLine(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type BoardResult<T> = Result<T, BoardError>;
