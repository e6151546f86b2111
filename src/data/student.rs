use crate::{
    data::non_empty,
    error::{StudentError, StudentResult},
};
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;

/// A student as stored and as returned over the API.
///
/// `id` is `None` only for a student that has not been saved yet; once storage
/// assigns it, updates never change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub date_of_birth: Option<Date>,
    pub department_id: Option<i64>,
}

/// Request body for creating or updating a student.
///
/// Every field is optional at the parsing stage so that incomplete bodies turn
/// into validation problems instead of deserialisation failures.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentForm {
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<Date>,
    pub department_id: Option<i64>,
}

impl StudentForm {
    /// Validates a body for creation. Any client-supplied id is dropped.
    pub fn into_new_student(self) -> StudentResult<Student> {
        self.validate(None, vec![])
    }

    /// Validates a body for an update, which must name the student it targets.
    pub fn into_updated_student(self) -> StudentResult<Student> {
        let id = self.id;
        let problems = if id.is_none() {
            vec!["id is required to update a student".to_string()]
        } else {
            vec![]
        };
        self.validate(id, problems)
    }

    fn validate(self, id: Option<i64>, mut problems: Vec<String>) -> StudentResult<Student> {
        let Self {
            id: _,
            first_name,
            last_name,
            email,
            date_of_birth,
            department_id,
        } = self;

        let first_name = non_empty(first_name);
        if first_name.is_none() {
            problems.push("first name is required".to_string());
        }
        let last_name = non_empty(last_name);
        if last_name.is_none() {
            problems.push("last name is required".to_string());
        }

        let email = non_empty(email);
        if let Some(email) = email.as_deref() {
            if !EmailAddress::is_valid(email) {
                problems.push(format!("{email:?} is not a valid email address"));
            }
        }

        match (first_name, last_name) {
            (Some(first_name), Some(last_name)) if problems.is_empty() => Ok(Student {
                id,
                first_name,
                last_name,
                email,
                date_of_birth,
                department_id,
            }),
            _ => Err(StudentError::Validation { problems }),
        }
    }
}
