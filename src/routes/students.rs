use crate::{
    data::student::{Student, StudentForm},
    error::{JsonBodySnafu, MissingStudentSnafu, PathParamSnafu, StudentResult},
    routes::sse::StudentChange,
    service::StudentService,
    state::StudentState,
};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use snafu::{OptionExt, ResultExt};

type IdPath = Result<Path<i64>, PathRejection>;
type StudentBody = Result<Json<StudentForm>, JsonRejection>;

pub async fn get_all_students(State(state): State<StudentState>) -> StudentResult<Json<Vec<Student>>> {
    state.get_all_students().await.map(Json)
}

pub async fn get_student_by_id(
    State(state): State<StudentState>,
    id: IdPath,
) -> StudentResult<Json<Student>> {
    let Path(id) = id.context(PathParamSnafu)?;

    state
        .get_student_by_id(id)
        .await?
        .context(MissingStudentSnafu { id })
        .map(Json)
}

pub async fn create_student(
    State(state): State<StudentState>,
    body: StudentBody,
) -> StudentResult<(StatusCode, Json<Student>)> {
    let Json(form) = body.context(JsonBodySnafu)?;
    let student = form.into_new_student()?;

    let saved = state.save_student(student).await?;
    if let Some(id) = saved.id {
        info!(id, "Created student");
        state.send_change(StudentChange::Created { id });
    }

    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn update_student(
    State(state): State<StudentState>,
    body: StudentBody,
) -> StudentResult<Json<Student>> {
    let Json(form) = body.context(JsonBodySnafu)?;
    let student = form.into_updated_student()?;

    let saved = state.save_student(student).await?;
    if let Some(id) = saved.id {
        info!(id, "Updated student");
        state.send_change(StudentChange::Updated { id });
    }

    Ok(Json(saved))
}

pub async fn delete_student(State(state): State<StudentState>, id: IdPath) -> StudentResult<StatusCode> {
    let Path(id) = id.context(PathParamSnafu)?;

    state.delete_student(id).await?;
    info!(id, "Deleted student");
    state.send_change(StudentChange::Deleted { id });

    Ok(StatusCode::OK)
}

pub async fn get_students_by_department(
    State(state): State<StudentState>,
    department_id: IdPath,
) -> StudentResult<Json<Vec<Student>>> {
    let Path(department_id) = department_id.context(PathParamSnafu)?;

    state
        .get_students_by_department(department_id)
        .await
        .map(Json)
}

#[cfg(test)]
mod tests {
    use crate::{
        data::student::Student,
        error::StudentError,
        routes::sse::StudentChange,
        service::MockStudentService,
        state::StudentState,
        test_util::send,
    };
    use axum::{
        Router,
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use mockall::predicate::eq;
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn student(id: i64, first_name: &str, last_name: &str) -> Student {
        Student {
            id: Some(id),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: Some(format!(
                "{}.{}@email.com",
                first_name.to_lowercase(),
                last_name.to_lowercase()
            )),
            date_of_birth: None,
            department_id: None,
        }
    }

    fn students() -> Vec<Student> {
        vec![student(1, "John", "Doe"), student(2, "Jane", "Smith")]
    }

    fn app(service: MockStudentService) -> (Router, StudentState) {
        let state = StudentState::new(Arc::new(service));
        (crate::app(state.clone()), state)
    }

    #[tokio::test]
    async fn get_all_students_success() {
        let mut service = MockStudentService::new();
        service
            .expect_get_all_students()
            .times(1)
            .returning(|| Ok(students()));
        let (app, _) = app(service);

        let (status, body) = send(&app, Method::GET, "/students/getAllStudents", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["id"], 1);
        assert_eq!(body[0]["firstName"], "John");
        assert_eq!(body[0]["lastName"], "Doe");
        assert_eq!(body[1]["id"], 2);
        assert_eq!(body[1]["firstName"], "Jane");
        assert_eq!(body[1]["lastName"], "Smith");
    }

    #[tokio::test]
    async fn get_all_students_empty_list() {
        let mut service = MockStudentService::new();
        service
            .expect_get_all_students()
            .times(1)
            .returning(|| Ok(vec![]));
        let (app, _) = app(service);

        let (status, body) = send(&app, Method::GET, "/students/getAllStudents", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn get_student_by_id_success() {
        let mut service = MockStudentService::new();
        service
            .expect_get_student_by_id()
            .with(eq(1))
            .times(1)
            .returning(|_| Ok(Some(student(1, "John", "Doe"))));
        let (app, _) = app(service);

        let (status, body) = send(&app, Method::GET, "/students/getStudentById/1", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);
        assert_eq!(body["firstName"], "John");
        assert_eq!(body["lastName"], "Doe");
        assert_eq!(body["email"], "john.doe@email.com");
    }

    #[tokio::test]
    async fn get_student_by_id_not_found() {
        let mut service = MockStudentService::new();
        service
            .expect_get_student_by_id()
            .with(eq(999))
            .times(1)
            .returning(|_| Ok(None));
        let (app, _) = app(service);

        let (status, body) = send(&app, Method::GET, "/students/getStudentById/999", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Student not found with id: 999");
    }

    #[tokio::test]
    async fn get_student_by_id_rejects_non_numeric_ids() {
        let service = MockStudentService::new();
        let (app, _) = app(service);

        let (status, _) = send(&app, Method::GET, "/students/getStudentById/abc", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_student_success() {
        let mut service = MockStudentService::new();
        service
            .expect_save_student()
            .withf(|s| s.id.is_none() && s.first_name == "New" && s.last_name == "Student")
            .times(1)
            .returning(|s| Ok(Student { id: Some(3), ..s }));
        let (app, state) = app(service);
        let mut changes = state.subscribe_to_change_feed();

        let (status, body) = send(
            &app,
            Method::POST,
            "/students/createStudent",
            Some(json!({
                "id": null,
                "firstName": "New",
                "lastName": "Student",
                "email": "new.student@email.com"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], 3);
        assert_eq!(body["firstName"], "New");
        assert_eq!(body["lastName"], "Student");
        assert_eq!(changes.try_recv().unwrap(), StudentChange::Created { id: 3 });
    }

    #[tokio::test]
    async fn create_student_invalid_input() {
        let mut service = MockStudentService::new();
        service.expect_save_student().never();
        let (app, _) = app(service);

        let (status, body) = send(
            &app,
            Method::POST,
            "/students/createStudent",
            Some(json!({"id": null, "firstName": "", "lastName": "", "email": null})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("first name is required"));
    }

    #[tokio::test]
    async fn create_student_rejects_malformed_json() {
        let mut service = MockStudentService::new();
        service.expect_save_student().never();
        let (app, _) = app(service);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/students/createStudent")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"firstName\": "))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/students/createStudent")
            .body(Body::from("firstName=New"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn create_student_duplicate_email_conflicts() {
        let mut service = MockStudentService::new();
        service.expect_save_student().times(1).returning(|s| {
            Err(StudentError::DuplicateEmail {
                email: s.email.unwrap_or_default(),
            })
        });
        let (app, _) = app(service);

        let (status, _) = send(
            &app,
            Method::POST,
            "/students/createStudent",
            Some(json!({"firstName": "John", "lastName": "Doe", "email": "john.doe@email.com"})),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn update_student_success() {
        let mut service = MockStudentService::new();
        service
            .expect_save_student()
            .withf(|s| s.id == Some(1) && s.last_name == "Updated")
            .times(1)
            .returning(Ok);
        let (app, state) = app(service);
        let mut changes = state.subscribe_to_change_feed();

        let (status, body) = send(
            &app,
            Method::PUT,
            "/students/updateStudent",
            Some(json!({
                "id": 1,
                "firstName": "John",
                "lastName": "Updated",
                "email": "john.updated@email.com"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);
        assert_eq!(body["lastName"], "Updated");
        assert_eq!(changes.try_recv().unwrap(), StudentChange::Updated { id: 1 });
    }

    #[tokio::test]
    async fn update_student_not_found() {
        let mut service = MockStudentService::new();
        service
            .expect_save_student()
            .times(1)
            .returning(|_| Err(StudentError::MissingStudent { id: 999 }));
        let (app, _) = app(service);

        let (status, _) = send(
            &app,
            Method::PUT,
            "/students/updateStudent",
            Some(json!({"id": 999, "firstName": "John", "lastName": "Doe"})),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_student_without_id_is_rejected() {
        let mut service = MockStudentService::new();
        service.expect_save_student().never();
        let (app, _) = app(service);

        let (status, _) = send(
            &app,
            Method::PUT,
            "/students/updateStudent",
            Some(json!({"firstName": "John", "lastName": "Doe"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_student_success() {
        let mut service = MockStudentService::new();
        service
            .expect_delete_student()
            .with(eq(1))
            .times(1)
            .returning(|_| Ok(()));
        let (app, state) = app(service);
        let mut changes = state.subscribe_to_change_feed();

        let (status, _) = send(&app, Method::DELETE, "/students/deleteStudent/1", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(changes.try_recv().unwrap(), StudentChange::Deleted { id: 1 });
    }

    #[tokio::test]
    async fn delete_student_not_found() {
        let mut service = MockStudentService::new();
        service
            .expect_delete_student()
            .with(eq(999))
            .times(1)
            .returning(|id| Err(StudentError::MissingStudent { id }));
        let (app, state) = app(service);
        let mut changes = state.subscribe_to_change_feed();

        let (status, _) = send(&app, Method::DELETE, "/students/deleteStudent/999", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn get_students_by_department_success() {
        let mut service = MockStudentService::new();
        service
            .expect_get_students_by_department()
            .with(eq(1))
            .times(1)
            .returning(|_| Ok(students()));
        let (app, _) = app(service);

        let (status, body) = send(&app, Method::GET, "/students/department/1", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn get_students_by_department_empty() {
        let mut service = MockStudentService::new();
        service
            .expect_get_students_by_department()
            .with(eq(999))
            .times(1)
            .returning(|_| Ok(vec![]));
        let (app, _) = app(service);

        let (status, body) = send(&app, Method::GET, "/students/department/999", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn storage_failures_become_internal_errors() {
        let mut service = MockStudentService::new();
        service
            .expect_get_all_students()
            .times(1)
            .returning(|| Err(StudentError::MakeQuery { source: sqlx::Error::PoolClosed }));
        let (app, _) = app(service);

        let (status, body) = send(&app, Method::GET, "/students/getAllStudents", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Error making SQL query");
    }
}
