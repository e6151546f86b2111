pub mod health;
pub mod import_export;
pub mod sse;
pub mod students;
