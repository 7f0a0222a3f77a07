use crate::{
    api::{attendance, employee, root},
    config::Config,
    error::{json_error_handler, path_error_handler},
};
use actix_cors::Cors;
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{http::header, middleware::Condition, web};

// Helper to build the per-peer limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("period and burst are non-zero");
    Governor::new(&cfg)
}

// Browser access for the configured frontends
fn build_cors(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600);

    if origins.iter().any(|origin| origin == "*") {
        return cors.allow_any_origin();
    }
    origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler));

    let limiter = build_limiter(config.rate_limit_per_min);

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(Condition::new(config.rate_limit_per_min > 0, limiter))
            .wrap(build_cors(&config.cors_allowed_origins))
            .service(web::resource("").route(web::get().to(root::api_root)))
            .service(
                web::scope("/employees")
                    // /employees
                    .service(
                        web::resource("")
                            .name(root::EMPLOYEES)
                            .route(web::get().to(employee::list_employees))
                            .route(web::post().to(employee::create_employee)),
                    )
                    // /employees/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::update_employee))
                            .route(web::patch().to(employee::partial_update_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .name(root::ATTENDANCE)
                            .route(web::get().to(attendance::list_attendance))
                            .route(web::post().to(attendance::create_attendance)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(attendance::get_attendance))
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::patch().to(attendance::partial_update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    ),
            ),
    );
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{call, test_app, test_config, test_pool};
    use actix_web::http::{Method, StatusCode, header};
    use actix_web::test::{self, TestRequest};

    #[actix_web::test]
    async fn trailing_slash_is_optional() {
        let pool = test_pool().await;
        let app = test_app!(pool);

        let (with_slash, _) = call(&app, Method::GET, "/api/employees/", None).await;
        let (without_slash, _) = call(&app, Method::GET, "/api/employees", None).await;

        assert_eq!(with_slash, StatusCode::OK);
        assert_eq!(without_slash, StatusCode::OK);
    }

    #[actix_web::test]
    async fn limiter_answers_429_once_budget_is_spent() {
        let pool = test_pool().await;
        let mut config = test_config();
        config.rate_limit_per_min = 1;
        let app = test_app!(pool, config);

        let peer = "127.0.0.1:40000".parse().unwrap();
        let first = TestRequest::get().uri("/api/attendance").peer_addr(peer).to_request();
        let second = TestRequest::get().uri("/api/attendance").peer_addr(peer).to_request();

        assert_eq!(test::call_service(&app, first).await.status(), StatusCode::OK);

        // the limiter rejects through the error channel
        let status = match test::try_call_service(&app, second).await {
            Ok(resp) => resp.status(),
            Err(err) => err.as_response_error().status_code(),
        };
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[actix_web::test]
    async fn preflight_from_allowed_origin_is_answered() {
        let pool = test_pool().await;
        let app = test_app!(pool);

        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/employees/")
            .insert_header((header::ORIGIN, "http://localhost:5173"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "POST"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5173"
        );
    }

    #[actix_web::test]
    async fn unknown_origin_gets_no_allow_header() {
        let pool = test_pool().await;
        let app = test_app!(pool);

        let req = TestRequest::get()
            .uri("/api/employees/")
            .insert_header((header::ORIGIN, "https://elsewhere.example"))
            .to_request();

        // the cors layer rejects through the error channel
        match test::try_call_service(&app, req).await {
            Ok(resp) => assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none()),
            Err(err) => assert!(err.as_response_error().status_code().is_client_error()),
        }
    }
}
