use actix_cors::Cors;
use actix_web::{HttpResponse, error::InternalError, get, web};
use chrono::{Local, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{date_codec, error::AppError, exchange_rate::DateRange, service::RatesService};

const VALUTES_FAILED: &str = "Failed to get currencies";
const DYNAMIC_FAILED: &str = "Failed to get currency dynamics";
const MISSING_PARAMS: &str = "Specify code, fromDate, toDate (dd.MM.yyyy)";
const INVALID_QUERY: &str = "Invalid query string";

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    details: String,
}

#[derive(Deserialize)]
pub struct ValutesQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicQuery {
    code: Option<String>,
    from_date: Option<String>,
    to_date: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    let query = web::QueryConfig::default().error_handler(|err, _req| {
        let response = failure(INVALID_QUERY, AppError::InvalidInput(err.to_string()));
        InternalError::from_response(err, response).into()
    });

    cfg.app_data(query).service(valutes).service(valute);
}

/// Any origin when `origins` is empty, otherwise only the listed ones.
pub fn cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        return Cors::permissive();
    }

    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}

#[get("/valutes")]
async fn valutes(
    service: web::Data<RatesService>,
    query: web::Query<ValutesQuery>,
) -> HttpResponse {
    let on = match query.date.as_deref().filter(|date| !date.is_empty()) {
        Some(date) => match date_codec::from_external_format(date) {
            Ok(date) => date.and_time(NaiveTime::MIN),
            Err(err) => return failure(VALUTES_FAILED, err),
        },
        None => Local::now().naive_local(),
    };

    match service.list_currencies(on).await {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(err) => failure(VALUTES_FAILED, err),
    }
}

#[get("/valute")]
async fn valute(service: web::Data<RatesService>, query: web::Query<DynamicQuery>) -> HttpResponse {
    let query = query.into_inner();
    let present = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
    let (Some(code), Some(from_date), Some(to_date)) = (
        present(query.code),
        present(query.from_date),
        present(query.to_date),
    ) else {
        return failure(
            MISSING_PARAMS,
            AppError::InvalidInput("code, fromDate and toDate are required".to_string()),
        );
    };

    let range = match DateRange::parse(&from_date, &to_date) {
        Ok(range) => range,
        Err(err) => return failure(DYNAMIC_FAILED, err),
    };

    match service.get_history(&code, range).await {
        Ok(points) => HttpResponse::Ok().json(points),
        Err(err) => failure(DYNAMIC_FAILED, err),
    }
}

fn failure(error: &'static str, err: AppError) -> HttpResponse {
    let body = ErrorBody {
        error,
        details: err.to_string(),
    };
    if err.is_client_error() {
        log::warn!("{error}: {err}");
        HttpResponse::BadRequest().json(body)
    } else {
        log::error!("{error}: {err}");
        HttpResponse::InternalServerError().json(body)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{
        App,
        http::{StatusCode, header},
        test,
    };
    use serde_json::Value;

    use super::*;
    use crate::upstream::{RateSource, testing::FakeSource};

    async fn call(source: Arc<FakeSource>, uri: &str) -> (StatusCode, Value) {
        let service = RatesService::new(source as Arc<dyn RateSource>);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let body = test::read_body(resp).await;

        (status, serde_json::from_slice(&body).unwrap())
    }

    #[actix_web::test]
    async fn test_valutes() {
        let (status, body) = call(Arc::new(FakeSource::new()), "/valutes").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["code"], "R01235");
        assert_eq!(body[0]["name"], "US Dollar");
        let value = body[0]["value"].as_f64().unwrap();
        assert!((value - 92.3405).abs() < 1e-9);
    }

    #[actix_web::test]
    async fn test_valutes_with_bad_date() {
        let source = Arc::new(FakeSource::new());

        let (status, body) = call(source.clone(), "/valutes?date=2023-03-01").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], VALUTES_FAILED);
        assert_eq!(source.calls(), 0);
    }

    #[actix_web::test]
    async fn test_valutes_upstream_down() {
        let (status, body) = call(Arc::new(FakeSource::unavailable()), "/valutes").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], VALUTES_FAILED);
        assert!(body["details"].as_str().unwrap().contains("connection refused"));
    }

    #[actix_web::test]
    async fn test_valute_history() {
        let (status, body) = call(
            Arc::new(FakeSource::new()),
            "/valute?code=R01235&fromDate=01.03.2023&toDate=15.03.2023",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let points = body.as_array().unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0]["date"], "01.03.2023");
        assert_eq!(points[2]["date"], "15.03.2023");
    }

    #[actix_web::test]
    async fn test_missing_code_never_calls_upstream() {
        let source = Arc::new(FakeSource::new());

        let (status, body) =
            call(source.clone(), "/valute?fromDate=01.03.2023&toDate=15.03.2023").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], MISSING_PARAMS);
        assert_eq!(source.calls(), 0);
    }

    #[actix_web::test]
    async fn test_invalid_range_is_bad_request() {
        let source = Arc::new(FakeSource::new());

        let (status, _) = call(
            source.clone(),
            "/valute?code=R01235&fromDate=15.03.2023&toDate=01.03.2023",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            source.clone(),
            "/valute?code=R01235&fromDate=2/3/2023&toDate=15.03.2023",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(source.calls(), 0);
    }

    #[actix_web::test]
    async fn test_malformed_value_is_server_error() {
        let source = FakeSource::new().with_history(
            r#"<ValCurs><Record Date="01.03.2023"><Value>n/a</Value></Record></ValCurs>"#,
        );

        let (status, body) = call(
            Arc::new(source),
            "/valute?code=R01235&fromDate=01.03.2023&toDate=15.03.2023",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], DYNAMIC_FAILED);
    }

    #[actix_web::test]
    async fn test_repeated_parameter_is_json_bad_request() {
        let source = Arc::new(FakeSource::new());

        let (status, body) = call(
            source.clone(),
            "/valute?code=R01235&code=R01239&fromDate=01.03.2023&toDate=15.03.2023",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], INVALID_QUERY);
        assert!(body["details"].as_str().unwrap().contains("code"));
        assert_eq!(source.calls(), 0);
    }

    async fn cors_origin(origins: &[String], origin: &str) -> Option<String> {
        let service = RatesService::new(Arc::new(FakeSource::new()));
        let app = test::init_service(
            App::new()
                .wrap(cors(origins))
                .app_data(web::Data::new(service))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/valutes")
            .insert_header((header::ORIGIN, origin))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        resp.headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    #[actix_web::test]
    async fn test_cors_allows_any_origin_by_default() {
        let allowed = cors_origin(&[], "http://localhost:3000").await;

        assert_eq!(allowed.as_deref(), Some("http://localhost:3000"));
    }

    #[actix_web::test]
    async fn test_cors_with_configured_origins() {
        let origins = vec!["https://rates.example".to_string()];

        let allowed = cors_origin(&origins, "https://rates.example").await;

        assert_eq!(allowed.as_deref(), Some("https://rates.example"));
    }
}
