use crate::{
    config::DbConfig,
    data::student::Student,
    error::{
        GetDatabaseConnectionSnafu, MakeQuerySnafu, MigrateSnafu, MissingStudentSnafu,
        OpenDatabaseSnafu, StudentError, StudentResult,
    },
    service::StudentService,
};
use async_trait::async_trait;
use snafu::{OptionExt, ResultExt};
use sqlx::{PgConnection, Pool, Postgres, pool::PoolConnection, postgres::PgPoolOptions};

#[derive(Clone, Debug)]
pub struct PostgresStudentService {
    pool: Pool<Postgres>,
}

impl PostgresStudentService {
    pub async fn connect(options: PgPoolOptions, config: &DbConfig) -> StudentResult<Self> {
        let pool = options
            .connect(&config.get_db_path())
            .await
            .context(OpenDatabaseSnafu)?;

        sqlx::migrate!().run(&pool).await.context(MigrateSnafu)?;

        Ok(Self { pool })
    }

    async fn get_connection(&self) -> StudentResult<PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .context(GetDatabaseConnectionSnafu)
    }

    async fn insert(student: Student, conn: &mut PgConnection) -> StudentResult<Student> {
        let Student {
            id: _,
            first_name,
            last_name,
            email,
            date_of_birth,
            department_id,
        } = student;

        sqlx::query_as(
            "INSERT INTO public.students (first_name, last_name, email, date_of_birth, department_id) VALUES ($1, $2, $3, $4, $5) RETURNING id, first_name, last_name, email, date_of_birth, department_id",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email.as_deref())
        .bind(date_of_birth)
        .bind(department_id)
        .fetch_one(conn)
        .await
        .map_err(|source| save_error(source, email.as_deref()))
    }

    async fn update(id: i64, student: Student, conn: &mut PgConnection) -> StudentResult<Student> {
        let Student {
            id: _,
            first_name,
            last_name,
            email,
            date_of_birth,
            department_id,
        } = student;

        let updated: Option<Student> = sqlx::query_as(
            "UPDATE public.students SET first_name = $2, last_name = $3, email = $4, date_of_birth = $5, department_id = $6 WHERE id = $1 RETURNING id, first_name, last_name, email, date_of_birth, department_id",
        )
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .bind(email.as_deref())
        .bind(date_of_birth)
        .bind(department_id)
        .fetch_optional(conn)
        .await
        .map_err(|source| save_error(source, email.as_deref()))?;

        updated.context(MissingStudentSnafu { id })
    }
}

/// Turns the unique constraint on `email` into a conflict the caller can act on.
fn save_error(source: sqlx::Error, email: Option<&str>) -> StudentError {
    if let (Some(email), Some(db_error)) = (email, source.as_database_error()) {
        if db_error.is_unique_violation() {
            return StudentError::DuplicateEmail {
                email: email.to_string(),
            };
        }
    }
    StudentError::MakeQuery { source }
}

#[async_trait]
impl StudentService for PostgresStudentService {
    async fn get_all_students(&self) -> StudentResult<Vec<Student>> {
        let mut conn = self.get_connection().await?;
        sqlx::query_as(
            "SELECT id, first_name, last_name, email, date_of_birth, department_id FROM public.students ORDER BY id",
        )
        .fetch_all(&mut *conn)
        .await
        .context(MakeQuerySnafu)
    }

    async fn get_student_by_id(&self, id: i64) -> StudentResult<Option<Student>> {
        let mut conn = self.get_connection().await?;
        sqlx::query_as(
            "SELECT id, first_name, last_name, email, date_of_birth, department_id FROM public.students WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context(MakeQuerySnafu)
    }

    async fn save_student(&self, student: Student) -> StudentResult<Student> {
        let mut conn = self.get_connection().await?;
        match student.id {
            Some(id) => Self::update(id, student, &mut conn).await,
            None => Self::insert(student, &mut conn).await,
        }
    }

    async fn delete_student(&self, id: i64) -> StudentResult<()> {
        let mut conn = self.get_connection().await?;
        let deleted = sqlx::query("DELETE FROM public.students WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .context(MakeQuerySnafu)?
            .rows_affected();

        (deleted > 0).then_some(()).context(MissingStudentSnafu { id })
    }

    async fn get_students_by_department(
        &self,
        department_id: i64,
    ) -> StudentResult<Vec<Student>> {
        let mut conn = self.get_connection().await?;
        sqlx::query_as(
            "SELECT id, first_name, last_name, email, date_of_birth, department_id FROM public.students WHERE department_id = $1 ORDER BY id",
        )
        .bind(department_id)
        .fetch_all(&mut *conn)
        .await
        .context(MakeQuerySnafu)
    }

    async fn close(&self) {
        info!("closing database pool");
        self.pool.close().await;
    }
}
