use super::*;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::MedicationDraft;
use tokio::{net::TcpListener, sync::Mutex};

async fn spawn_server(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn sample_record() -> Value {
    json!({
        "_id": "m1",
        "nombre": "Paracetamol",
        "dosis": "500mg",
        "stockActual": 9,
        "stockMinimo": 3,
        "horarios": ["08:00", "20:00"],
        "fechaVencimiento": "2026-12-31",
        "diasRestantes": 12
    })
}

fn draft() -> MedicationDraft {
    MedicationDraft {
        name: "Paracetamol".to_string(),
        dose: "500mg".to_string(),
        current_stock: 9,
        min_stock: 3,
        scheduled_times: vec!["08:00".to_string()],
        expiration_date: None,
    }
}

#[tokio::test]
async fn login_submits_credentials_and_returns_token() {
    let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route(
            "/login",
            post(
                |State(seen): State<Arc<Mutex<Option<Value>>>>, Json(body): Json<Value>| async move {
                    *seen.lock().await = Some(body);
                    Json(json!({"token": "tok-1"}))
                },
            ),
        )
        .with_state(seen.clone());
    let api = HttpInventory::new(spawn_server(app).await);

    let token = api.login("hunter2", true).await.expect("login");
    assert_eq!(token, "tok-1");

    let body = seen.lock().await.clone().expect("body");
    assert_eq!(body["password"], "hunter2");
    assert_eq!(body["rememberMe"], true);
}

#[tokio::test]
async fn list_medications_attaches_bearer_token_and_parses_records() {
    let auth_header: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route(
            "/medicamentos",
            get(
                |State(seen): State<Arc<Mutex<Option<String>>>>, headers: HeaderMap| async move {
                    *seen.lock().await = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    Json(json!([sample_record()]))
                },
            ),
        )
        .with_state(auth_header.clone());
    let api = HttpInventory::new(spawn_server(app).await);

    let meds = api.list_medications("tok-1").await.expect("list");
    assert_eq!(meds.len(), 1);
    assert_eq!(meds[0].name, "Paracetamol");
    assert_eq!(meds[0].current_stock, 9);
    assert_eq!(meds[0].scheduled_times, vec!["08:00", "20:00"]);

    assert_eq!(
        auth_header.lock().await.clone(),
        Some("Bearer tok-1".to_string())
    );
}

#[tokio::test]
async fn unauthorized_and_forbidden_map_to_auth() {
    let app = Router::new()
        .route("/medicamentos", get(|| async { StatusCode::UNAUTHORIZED }))
        .route("/historial", get(|| async { StatusCode::FORBIDDEN }));
    let api = HttpInventory::new(spawn_server(app).await);

    assert!(matches!(
        api.list_medications("stale").await,
        Err(ClientError::Auth)
    ));
    assert!(matches!(
        api.list_history("stale").await,
        Err(ClientError::Auth)
    ));
}

#[tokio::test]
async fn server_errors_map_to_transient() {
    let app = Router::new().route(
        "/medicamentos",
        get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    let api = HttpInventory::new(spawn_server(app).await);

    let err = api.list_medications("tok").await.expect_err("must fail");
    assert!(matches!(err, ClientError::TransientServer));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn other_4xx_surfaces_the_body_message() {
    let app = Router::new().route(
        "/medicamentos/:id",
        delete(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(json!({"message": "medicamento no encontrado"})),
            )
        }),
    );
    let api = HttpInventory::new(spawn_server(app).await);

    let err = api
        .delete_medication("tok", &"missing".into())
        .await
        .expect_err("must fail");
    match err {
        ClientError::Operation(message) => assert_eq!(message, "medicamento no encontrado"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_record_fails_fast_as_parse_error() {
    let mut record = sample_record();
    record["stockActual"] = json!(-2);
    let app = Router::new().route(
        "/medicamentos",
        get(move || {
            let record = record.clone();
            async move { Json(json!([record])) }
        }),
    );
    let api = HttpInventory::new(spawn_server(app).await);

    let err = api.list_medications("tok").await.expect_err("must fail");
    assert!(matches!(err, ClientError::Parse(_)));
}

#[tokio::test]
async fn create_posts_wire_fields_and_returns_created_record() {
    let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route(
            "/medicamentos",
            post(
                |State(seen): State<Arc<Mutex<Option<Value>>>>, Json(body): Json<Value>| async move {
                    *seen.lock().await = Some(body);
                    Json(sample_record())
                },
            ),
        )
        .with_state(seen.clone());
    let api = HttpInventory::new(spawn_server(app).await);

    let created = api.create_medication("tok", &draft()).await.expect("create");
    assert_eq!(created.id, "m1".into());

    let body = seen.lock().await.clone().expect("body");
    assert_eq!(body["nombre"], "Paracetamol");
    assert_eq!(body["stockActual"], 9);
    assert_eq!(body["stockMinimo"], 3);
}

#[tokio::test]
async fn confirm_dose_posts_the_medication_id() {
    let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let app = Router::new()
        .route(
            "/tomas",
            post(
                |State(seen): State<Arc<Mutex<Option<Value>>>>, Json(body): Json<Value>| async move {
                    *seen.lock().await = Some(body);
                    let mut updated = sample_record();
                    updated["stockActual"] = json!(8);
                    Json(updated)
                },
            ),
        )
        .with_state(seen.clone());
    let api = HttpInventory::new(spawn_server(app).await);

    let updated = api.confirm_dose("tok", &"m1".into()).await.expect("confirm");
    assert_eq!(updated.current_stock, 8);

    let body = seen.lock().await.clone().expect("body");
    assert_eq!(body["medicamentoId"], "m1");
}
