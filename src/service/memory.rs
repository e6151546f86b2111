use crate::{
    data::student::Student,
    error::{DuplicateEmailSnafu, MissingStudentSnafu, StudentResult},
    service::StudentService,
};
use async_trait::async_trait;
use snafu::{OptionExt, ensure};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Keeps students in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryStudentService {
    students: RwLock<Students>,
}

#[derive(Debug, Default)]
struct Students {
    by_id: BTreeMap<i64, Student>,
    last_id: i64,
}

impl Students {
    fn ensure_unique_email(&self, candidate: &Student) -> StudentResult<()> {
        let Some(email) = candidate.email.as_deref() else {
            return Ok(());
        };

        let taken = self
            .by_id
            .values()
            .any(|existing| existing.id != candidate.id && existing.email.as_deref() == Some(email));
        ensure!(!taken, DuplicateEmailSnafu { email });

        Ok(())
    }
}

#[async_trait]
impl StudentService for InMemoryStudentService {
    async fn get_all_students(&self) -> StudentResult<Vec<Student>> {
        Ok(self.students.read().await.by_id.values().cloned().collect())
    }

    async fn get_student_by_id(&self, id: i64) -> StudentResult<Option<Student>> {
        Ok(self.students.read().await.by_id.get(&id).cloned())
    }

    async fn save_student(&self, mut student: Student) -> StudentResult<Student> {
        let mut students = self.students.write().await;
        if let Some(id) = student.id {
            ensure!(students.by_id.contains_key(&id), MissingStudentSnafu { id });
        }
        students.ensure_unique_email(&student)?;

        match student.id {
            Some(id) => {
                let stored = students.by_id.get_mut(&id).context(MissingStudentSnafu { id })?;
                stored.clone_from(&student);
            }
            None => {
                students.last_id += 1;
                let id = students.last_id;
                student.id = Some(id);
                students.by_id.insert(id, student.clone());
            }
        }

        Ok(student)
    }

    async fn delete_student(&self, id: i64) -> StudentResult<()> {
        self.students
            .write()
            .await
            .by_id
            .remove(&id)
            .context(MissingStudentSnafu { id })?;
        Ok(())
    }

    async fn get_students_by_department(
        &self,
        department_id: i64,
    ) -> StudentResult<Vec<Student>> {
        Ok(self
            .students
            .read()
            .await
            .by_id
            .values()
            .filter(|student| student.department_id == Some(department_id))
            .cloned()
            .collect())
    }
}
