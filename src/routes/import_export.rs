use crate::{
    data::student::{Student, StudentForm},
    error::{CsvIoSnafu, CsvSnafu, MultipartSnafu, StudentResult},
    routes::sse::StudentChange,
    service::StudentService,
    state::StudentState,
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::header,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use time::Date;

#[derive(Deserialize)]
struct NewCsvStudent {
    first_name: String,
    last_name: String,
    email: Option<String>,
    date_of_birth: Option<Date>,
    department_id: Option<i64>,
}

#[derive(Serialize)]
struct ExportedCsvStudent {
    id: Option<i64>,
    first_name: String,
    last_name: String,
    email: Option<String>,
    date_of_birth: Option<Date>,
    department_id: Option<i64>,
}

impl From<Student> for ExportedCsvStudent {
    fn from(student: Student) -> Self {
        let Student {
            id,
            first_name,
            last_name,
            email,
            date_of_birth,
            department_id,
        } = student;
        Self {
            id,
            first_name,
            last_name,
            email,
            date_of_birth,
            department_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImportProblem {
    /// 1-based line in the uploaded file, counting the header.
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub imported: Vec<Student>,
    pub problems: Vec<ImportProblem>,
}

pub async fn get_students_export(State(state): State<StudentState>) -> StudentResult<impl IntoResponse> {
    let students = state.get_all_students().await?;

    let mut writer = csv::Writer::from_writer(vec![]);
    for student in students {
        writer
            .serialize(ExportedCsvStudent::from(student))
            .context(CsvSnafu)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context(CsvIoSnafu)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"students.csv\"",
            ),
        ],
        bytes,
    ))
}

/// Imports every CSV file in the form. Rows that fail to parse or validate are
/// reported back and skipped; the rest are saved.
pub async fn put_students_import(
    State(state): State<StudentState>,
    mut multipart: Multipart,
) -> StudentResult<Json<ImportReport>> {
    let mut report = ImportReport::default();

    while let Some(field) = multipart.next_field().await.context(MultipartSnafu)? {
        let bytes = field.bytes().await.context(MultipartSnafu)?;
        let mut rdr = csv::Reader::from_reader(bytes.as_ref());
        let headers = rdr.headers().context(CsvSnafu)?.clone();

        for record in rdr.records() {
            let record = match record {
                Ok(x) => x,
                Err(source) => {
                    report.problems.push(ImportProblem {
                        line: source.position().map_or(0, csv::Position::line),
                        message: source.to_string(),
                    });
                    continue;
                }
            };
            let line = record.position().map_or(0, csv::Position::line);

            let NewCsvStudent {
                first_name,
                last_name,
                email,
                date_of_birth,
                department_id,
            } = match record.deserialize(Some(&headers)) {
                Ok(x) => x,
                Err(source) => {
                    report.problems.push(ImportProblem {
                        line,
                        message: source.to_string(),
                    });
                    continue;
                }
            };

            let form = StudentForm {
                id: None,
                first_name: Some(first_name),
                last_name: Some(last_name),
                email,
                date_of_birth,
                department_id,
            };

            let saved = match form.into_new_student() {
                Ok(student) => state.save_student(student).await,
                Err(e) => Err(e),
            };
            match saved {
                Ok(student) => report.imported.push(student),
                Err(e) if e.is_client_error() => report.problems.push(ImportProblem {
                    line,
                    message: e.to_string(),
                }),
                Err(e) => {
                    error!(line, imported = report.imported.len(), "Import aborted by storage failure");
                    announce_import(&state, &report);
                    return Err(e);
                }
            }
        }
    }

    info!(
        imported = report.imported.len(),
        problems = report.problems.len(),
        "Imported students"
    );
    announce_import(&state, &report);

    Ok(Json(report))
}

/// Rows saved before a failure stay saved, so subscribers hear about them either way.
fn announce_import(state: &StudentState, report: &ImportReport) {
    if !report.imported.is_empty() {
        state.send_change(StudentChange::Imported {
            count: report.imported.len(),
        });
    }
}
