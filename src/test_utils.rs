use crate::{config::Config, db::MIGRATOR};
use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{Method, StatusCode};
use actix_web::test;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// Fresh in-memory database. A single long-lived connection keeps the data alive.
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();

    MIGRATOR.run(&pool).await.unwrap();
    pool
}

pub fn test_config() -> Config {
    let mut config = Config::from_lookup(|_| None).unwrap();
    config.database_url = "sqlite::memory:".to_string();
    config.rate_limit_per_min = 0;
    config
}

/// The full router over `$pool`, wired the way `main` wires it.
macro_rules! test_app {
    ($pool:expr) => {
        $crate::test_utils::test_app!($pool, $crate::test_utils::test_config())
    };
    ($pool:expr, $config:expr) => {{
        let config = $config;
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(actix_web::middleware::NormalizePath::trim())
                .app_data(actix_web::web::Data::new($pool.clone()))
                .configure(move |cfg| $crate::routes::configure(cfg, &config)),
        )
        .await
    }};
}
pub(crate) use test_app;

/// Sends a request and returns the status with the decoded JSON body (`Null` when empty).
pub async fn call<S, B>(app: &S, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let mut req = test::TestRequest::default().method(method).uri(uri);
    if let Some(body) = body {
        req = req.set_json(body);
    }

    let resp = test::call_service(app, req.to_request()).await;
    let status = resp.status();
    let bytes = test::read_body(resp).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

pub async fn create_employee<S, B>(app: &S, employee_id: &str, email: &str) -> i64
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, body) = call(
        app,
        Method::POST,
        "/api/employees/",
        Some(json!({
            "employee_id": employee_id,
            "full_name": "Test Employee",
            "email": email,
            "department": "Eng"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

pub async fn mark_attendance<S, B>(app: &S, employee: i64, date: &str, status: &str) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    call(
        app,
        Method::POST,
        "/api/attendance/",
        Some(json!({ "employee": employee, "date": date, "status": status })),
    )
    .await
}
