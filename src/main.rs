#![warn(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::single_match_else)]

use crate::{
    auth::{SESSION_IDLE_SECS, backend::PortalAuthBackend, require_sign_in},
    config::RuntimeConfiguration,
    error::PortalResult,
    routes::{
        dashboard::get_dashboard,
        drives::{
            get_drives, internal_get_drives, internal_get_edit_drive_form,
            internal_get_new_drive_form, internal_patch_drive, internal_put_new_drive,
        },
        get_empty,
        index::get_index_route,
        login::{get_login, post_login, post_logout},
        reports::{get_reports, internal_get_reports},
        students::{
            get_students, internal_get_edit_student_form, internal_get_new_student_form,
            internal_get_report_dialog, internal_get_students, internal_get_vaccinate_form,
            internal_patch_student, internal_post_bulk_upload,
            internal_post_bulk_vaccine_records, internal_post_report, internal_post_vaccinate,
            internal_put_new_student,
        },
    },
    state::PortalState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use axum_login::{
    AuthManagerLayerBuilder,
    tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::time::Duration},
};
use tokio::{net::TcpListener, signal};
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[macro_use]
extern crate tracing;

mod api;
mod auth;
mod config;
mod data;
mod error;
mod maud_conveniences;
mod routes;
mod state;
mod toast;

async fn shutdown_signal() {
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
}

pub fn app(state: PortalState) -> PortalResult<Router> {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_expiry(Expiry::OnInactivity(Duration::seconds(SESSION_IDLE_SECS)));
    let auth_backend = PortalAuthBackend::new(&state.config().admin_credentials())?;
    let auth_layer = AuthManagerLayerBuilder::new(auth_backend, session_layer).build();

    let protected = Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/students", get(get_students))
        .route(
            "/internal/students",
            get(internal_get_students)
                .put(internal_put_new_student)
                .patch(internal_patch_student),
        )
        .route("/internal/students/new", get(internal_get_new_student_form))
        .route("/internal/students/edit", get(internal_get_edit_student_form))
        .route(
            "/internal/students/vaccinate",
            get(internal_get_vaccinate_form).post(internal_post_vaccinate),
        )
        .route(
            "/internal/students/bulk_upload",
            post(internal_post_bulk_upload),
        )
        .route(
            "/internal/students/bulk_vaccine_records",
            post(internal_post_bulk_vaccine_records),
        )
        .route(
            "/internal/students/report",
            get(internal_get_report_dialog).post(internal_post_report),
        )
        .route("/drives", get(get_drives))
        .route(
            "/internal/drives",
            get(internal_get_drives)
                .put(internal_put_new_drive)
                .patch(internal_patch_drive),
        )
        .route("/internal/drives/new", get(internal_get_new_drive_form))
        .route("/internal/drives/edit", get(internal_get_edit_drive_form))
        .route("/reports", get(get_reports))
        .route("/internal/reports", get(internal_get_reports))
        .route("/internal/empty", get(get_empty))
        .route_layer(middleware::from_fn(require_sign_in));

    let upload_limit = state.config().upload_limit_bytes();

    Ok(Router::new()
        .route("/", get(get_index_route))
        .route("/login", get(get_login).post(post_login))
        .route("/logout", post(post_logout))
        .merge(protected)
        .layer(auth_layer)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

#[tokio::main]
async fn main() {
    let dotenv_outcome = dotenvy::dotenv();

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish(),
    )
    .expect("unable to set tracing subscriber");

    info!("`tracing` online");
    if let Err(e) = dotenv_outcome {
        warn!(?e, "No .env file loaded, using the process environment only");
    }

    let config = RuntimeConfiguration::new().expect("unable to create config");
    let server_ip = config.server_ip().to_string();
    let state = PortalState::new(config).expect("unable to create state");
    let app = app(state).expect("unable to build app");

    let listener = TcpListener::bind(&server_ip)
        .await
        .expect("unable to listen on server ip");

    info!(?server_ip, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("unable to serve app");
}
