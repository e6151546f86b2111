use axum::{
    Json,
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use snafu::Snafu;
use std::num::ParseIntError;

pub type StudentResult<T> = Result<T, StudentError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StudentError {
    #[snafu(display("Error opening database"))]
    OpenDatabase { source: sqlx::Error },
    #[snafu(display("Error getting db connection"))]
    GetDatabaseConnection { source: sqlx::Error },
    #[snafu(display("Error making SQL query"))]
    MakeQuery { source: sqlx::Error },
    #[snafu(display("Error migrating DB schema"))]
    MigrateError { source: sqlx::migrate::MigrateError },
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unable to parse env var `{}` as a number", name))]
    ParseNumber {
        source: ParseIntError,
        name: &'static str,
    },
    #[snafu(display("Unknown storage kind {:?}, expected `memory` or `postgres`", kind))]
    UnknownStorage { kind: String },
    #[snafu(display("Student not found with id: {}", id))]
    MissingStudent { id: i64 },
    #[snafu(display("Invalid student: {}", problems.join("; ")))]
    Validation { problems: Vec<String> },
    #[snafu(display("A student with email {:?} already exists", email))]
    DuplicateEmail { email: String },
    #[snafu(display("Invalid JSON body: {}", source.body_text()))]
    JsonBody { source: JsonRejection },
    #[snafu(display("Invalid path: {}", source.body_text()))]
    PathParam { source: PathRejection },
    #[snafu(display("Error with multipart form input"))]
    Multipart { source: MultipartError },
    #[snafu(display("Error with CSVs: {}", source))]
    Csv { source: csv::Error },
    #[snafu(display("Error writing CSV output"))]
    CsvIo { source: std::io::Error },
}

impl StudentError {
    #[allow(clippy::match_same_arms)]
    pub fn status_code(&self) -> StatusCode {
        const ISE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR; //internal server error
        const NF: StatusCode = StatusCode::NOT_FOUND; //not found
        const BI: StatusCode = StatusCode::BAD_REQUEST; //bad input

        match self {
            Self::OpenDatabase { .. } | Self::GetDatabaseConnection { .. } => ISE,
            Self::MigrateError { .. } => ISE,
            Self::MakeQuery { source } => match source {
                sqlx::Error::RowNotFound => NF,
                _ => ISE,
            },
            Self::BadEnvVar { .. } | Self::ParseNumber { .. } | Self::UnknownStorage { .. } => ISE,
            Self::MissingStudent { .. } => NF,
            Self::Validation { .. } => BI,
            Self::DuplicateEmail { .. } => StatusCode::CONFLICT,
            Self::JsonBody { source } => match source {
                JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                JsonRejection::BytesRejection(rejection) => rejection.status(),
                _ => BI,
            },
            Self::PathParam { .. } => BI,
            Self::Multipart { source } => source.status(),
            Self::Csv { .. } => BI,
            Self::CsvIo { .. } => ISE,
        }
    }

    /// Whether the caller, rather than the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for StudentError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        if status_code.is_server_error() {
            error!(?self, "Error!");
        } else {
            warn!(?self, %status_code, "Rejected request");
        }

        (
            status_code,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
