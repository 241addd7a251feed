use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    Cascade, CategoryOption, DutyBreakdown, DutyPolicy, ModelOption, ReferenceTable, Selection,
    YearOption, resolve_path,
};
use crate::render::render_route;

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

/// Loaded once at startup; read-only thereafter, so handlers share it
/// without locking.
pub struct AppState {
    pub table: ReferenceTable,
    pub policy: DutyPolicy,
}

pub async fn run_http_server(state: AppState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(Arc::new(state));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    println!("Duty Check listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{}/", addr.port());

    axum::serve(listener, app).await
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route("/api/categories", get(categories_handler))
        .route("/api/makes", get(makes_handler))
        .route("/api/models", get(models_handler))
        .route("/api/years", get(years_handler))
        .route("/api/duty", get(duty_handler))
        .fallback(page_handler)
        .with_state(state)
}

async fn index_handler() -> impl IntoResponse {
    Html(INDEX_HTML)
}

async fn styles_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    )
}

async fn app_js_handler() -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    )
}

/// Server-rendered informational pages: any path the resolver recognizes
/// gets the same document the static emitter would write for it.
async fn page_handler(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    match resolve_path(&state.table, uri.path()) {
        Some(route) => Html(render_route(&state.table, &state.policy, &route)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

#[derive(Debug, Serialize)]
struct CategoriesResponse {
    categories: Vec<CategoryOption>,
}

async fn categories_handler(State(state): State<Arc<AppState>>) -> Response {
    let cascade = Cascade::new(&state.table, &state.policy);
    json_response(
        StatusCode::OK,
        CategoriesResponse {
            categories: cascade.category_options(),
        },
    )
}

#[derive(Debug, Deserialize)]
struct MakesQuery {
    category: String,
}

#[derive(Debug, Serialize)]
struct MakesResponse {
    makes: Vec<String>,
}

async fn makes_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MakesQuery>,
) -> Response {
    let cascade = Cascade::new(&state.table, &state.policy);
    match cascade
        .select_category(&query.category)
        .and_then(|sel| cascade.make_options(&sel))
    {
        Some(makes) => json_response(StatusCode::OK, MakesResponse { makes }),
        None => error_response(StatusCode::NOT_FOUND, "Unknown category"),
    }
}

#[derive(Debug, Deserialize)]
struct ModelsQuery {
    category: String,
    make: String,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    models: Vec<ModelOption>,
}

async fn models_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ModelsQuery>,
) -> Response {
    let cascade = Cascade::new(&state.table, &state.policy);
    match model_stage(&cascade, &query.category, &query.make)
        .and_then(|sel| cascade.model_options(&sel))
    {
        Some(models) => json_response(StatusCode::OK, ModelsResponse { models }),
        None => error_response(StatusCode::NOT_FOUND, "Unknown category or make"),
    }
}

#[derive(Debug, Deserialize)]
struct YearsQuery {
    category: String,
    make: String,
    model: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct YearsResponse {
    cutoff_year: i32,
    years: Vec<YearOption>,
}

async fn years_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<YearsQuery>,
) -> Response {
    let cascade = Cascade::new(&state.table, &state.policy);
    match model_stage(&cascade, &query.category, &query.make)
        .and_then(|sel| cascade.select_model(&sel, query.model))
        .and_then(|sel| cascade.year_options(&sel))
    {
        Some(years) => json_response(
            StatusCode::OK,
            YearsResponse {
                cutoff_year: state.policy.cutoff_year(),
                years,
            },
        ),
        None => error_response(StatusCode::NOT_FOUND, "Unknown vehicle"),
    }
}

#[derive(Debug, Deserialize)]
struct DutyQuery {
    category: String,
    make: String,
    model: usize,
    year: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DutyResponse {
    category: String,
    make: String,
    model: String,
    year: i32,
    reference_price: f64,
    eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    breakdown: Option<DutyBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

async fn duty_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DutyQuery>,
) -> Response {
    match build_duty_response(&state, &query) {
        Some(payload) => json_response(StatusCode::OK, payload),
        None => error_response(StatusCode::NOT_FOUND, "Unknown vehicle"),
    }
}

fn model_stage(cascade: &Cascade<'_>, category: &str, make: &str) -> Option<Selection> {
    let sel = cascade.select_category(category)?;
    cascade.select_make(&sel, make)
}

/// A resolvable vehicle always yields a payload; ineligible years come back
/// as `eligible: false` with a reason rather than a 404, since the vehicle
/// is real and only the import is blocked.
fn build_duty_response(state: &AppState, query: &DutyQuery) -> Option<DutyResponse> {
    let cascade = Cascade::new(&state.table, &state.policy);
    let sel = model_stage(&cascade, &query.category, &query.make)?;
    let sel = cascade.select_model(&sel, query.model)?;
    let sel = cascade.select_year(&sel, query.year)?;

    let variant = cascade.variant(&sel)?;
    let outcome = cascade.breakdown(&sel)?;
    let (breakdown, reason) = match outcome {
        Ok(duty) => (Some(duty), None),
        Err(blocked) => (None, Some(blocked.to_string())),
    };

    Some(DutyResponse {
        category: query.category.clone(),
        make: query.make.clone(),
        model: variant.model.clone(),
        year: query.year,
        reference_price: variant.crsp,
        eligible: breakdown.is_some(),
        breakdown,
        reason,
    })
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, axum::Json(body)).into_response()
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> AppState {
        AppState {
            table: ReferenceTable::from_json(
                r#"{
                  "categories": ["SUV"],
                  "data": {
                    "SUV": {
                      "Toyota": [
                        {"model": "RAV4", "cc": 1986, "fuel": "GASOLINE", "crsp": 4853000}
                      ]
                    }
                  }
                }"#,
            )
            .expect("valid table"),
            policy: DutyPolicy::default(),
        }
    }

    #[test]
    fn duty_response_for_eligible_year_carries_breakdown() {
        let state = sample_state();
        let query = DutyQuery {
            category: "SUV".to_string(),
            make: "Toyota".to_string(),
            model: 0,
            year: 2024,
        };
        let payload = build_duty_response(&state, &query).expect("known vehicle");

        assert!(payload.eligible);
        assert_eq!(payload.model, "RAV4");
        assert_eq!(payload.reference_price, 4_853_000.0);
        let duty = payload.breakdown.expect("breakdown present");
        assert_eq!(duty.age, 2);
        assert!(payload.reason.is_none());
    }

    #[test]
    fn duty_response_for_blocked_year_reports_reason_not_miss() {
        let state = sample_state();
        let query = DutyQuery {
            category: "SUV".to_string(),
            make: "Toyota".to_string(),
            model: 0,
            year: 2015,
        };
        let payload = build_duty_response(&state, &query).expect("known vehicle");

        assert!(!payload.eligible);
        assert!(payload.breakdown.is_none());
        assert!(payload.reason.expect("reason").contains("8-year"));
    }

    #[test]
    fn duty_response_for_unknown_vehicle_is_a_miss() {
        let state = sample_state();
        let query = DutyQuery {
            category: "SUV".to_string(),
            make: "Honda".to_string(),
            model: 0,
            year: 2024,
        };
        assert!(build_duty_response(&state, &query).is_none());

        let query = DutyQuery {
            category: "SUV".to_string(),
            make: "Toyota".to_string(),
            model: 7,
            year: 2024,
        };
        assert!(build_duty_response(&state, &query).is_none());
    }

    #[test]
    fn duty_response_serializes_camel_case() {
        let state = sample_state();
        let query = DutyQuery {
            category: "SUV".to_string(),
            make: "Toyota".to_string(),
            model: 0,
            year: 2024,
        };
        let payload = build_duty_response(&state, &query).expect("known vehicle");
        let json = serde_json::to_value(&payload).expect("serializes");

        assert_eq!(json["referencePrice"], 4_853_000.0);
        assert!(json["breakdown"]["totalDuty"].as_f64().expect("total") > 0.0);
        assert!(json["breakdown"]["idfLevy"].as_f64().expect("idf") > 0.0);
        assert!(json.get("reason").is_none());
    }
}
