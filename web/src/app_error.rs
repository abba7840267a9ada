use std::fmt;

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use log::{error, warn};
use serde_json::json;

use crate::result::Error;
use crate::utils::result::StdResult;

#[derive(Debug)]
pub struct AppError {
    error: Error,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

fn status_of(error: &Error) -> StatusCode {
    match error {
        Error::Upload(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        status_of(&self.error)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "message": self.error.to_string() }))
    }
}

impl From<Error> for AppError {
    fn from(error: Error) -> Self {
        if status_of(&error).is_server_error() {
            error!(target: "fresh_connect", "ERROR: {}", error);
        } else {
            warn!(target: "fresh_connect", "{}", error);
        }
        Self { error }
    }
}

pub type Responce<T = HttpResponse> = StdResult<T, AppError>;
