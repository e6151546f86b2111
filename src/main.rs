#![warn(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::single_match_else, clippy::missing_errors_doc)]

use crate::{
    config::{RuntimeConfiguration, StorageConfig},
    routes::{
        health::get_health,
        import_export::{get_students_export, put_students_import},
        sse::sse_feed,
        students::{
            create_student, delete_student, get_all_students, get_student_by_id,
            get_students_by_department, update_student,
        },
    },
    service::{DynStudentService, memory::InMemoryStudentService, postgres::PostgresStudentService},
    state::StudentState,
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[macro_use]
extern crate tracing;

mod config;
mod data;
mod error;
mod routes;
mod service;
mod state;
#[cfg(test)]
mod test_util;

const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

async fn shutdown_signal(state: StudentState) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    warn!("signal received, starting graceful shutdown");
    state.sensible_shutdown().await;
}

fn app(state: StudentState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/students/getAllStudents", get(get_all_students))
        .route("/students/getStudentById/{id}", get(get_student_by_id))
        .route("/students/createStudent", post(create_student))
        .route("/students/updateStudent", put(update_student))
        .route("/students/deleteStudent/{id}", delete(delete_student))
        .route("/students/department/{id}", get(get_students_by_department))
        .route("/students/events", get(sse_feed))
        .route("/students/export", get(get_students_export))
        .route("/students/import", put(put_students_import))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn build_service(config: &RuntimeConfiguration) -> DynStudentService {
    match config.storage() {
        StorageConfig::Memory => {
            warn!("Using in-memory storage, students will not survive a restart");
            Arc::new(InMemoryStudentService::default())
        }
        StorageConfig::Postgres(db_config) => {
            let options = PgPoolOptions::new().max_connections(db_config.max_connections());
            let service = PostgresStudentService::connect(options, &db_config)
                .await
                .expect("unable to connect to database");
            info!("Connected to postgres");
            Arc::new(service)
        }
    }
}

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish(),
    )
    .expect("unable to set tracing subscriber");

    info!("`tracing` online");
    if let Err(e) = dotenv_result {
        debug!(?e, "No .env file loaded");
    }

    let config = RuntimeConfiguration::new().expect("unable to create config");
    let state = StudentState::new(build_service(&config).await);

    let server_ip = config.server_ip();
    let listener = TcpListener::bind(server_ip)
        .await
        .expect("unable to listen on server ip");

    info!(?server_ip, "Listening");
    axum::serve(listener, app(state.clone()))
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .expect("unable to serve app");
}
