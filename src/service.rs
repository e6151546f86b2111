use crate::{data::student::Student, error::StudentResult};
use async_trait::async_trait;
use std::sync::Arc;

pub mod memory;
pub mod postgres;

pub type DynStudentService = Arc<dyn StudentService + Send + Sync>;

/// Storage-facing operations behind every `/students` route.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StudentService {
    /// All students, oldest first.
    async fn get_all_students(&self) -> StudentResult<Vec<Student>>;

    /// `Ok(None)` when no student has that id.
    async fn get_student_by_id(&self, id: i64) -> StudentResult<Option<Student>>;

    /// Creates the student when `id` is `None`, otherwise replaces the stored
    /// student with that id. Returns the student as stored.
    async fn save_student(&self, student: Student) -> StudentResult<Student>;

    /// Fails with `MissingStudent` when no student has that id.
    async fn delete_student(&self, id: i64) -> StudentResult<()>;

    /// Students filed under `department_id`, oldest first.
    async fn get_students_by_department(&self, department_id: i64)
    -> StudentResult<Vec<Student>>;

    /// Releases storage resources before the process exits.
    async fn close(&self) {}
}
