//! End-to-end tests of the HTTP adapter against a local backend

use adminkit_client::HttpConsoleApi;
use adminkit_core::{ApiConfig, ApiError, ConsoleApi, Credentials, IdentityDraft};
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const GOOD_TOKEN: &str = "good-token";

fn envelope(data: Value) -> Json<Value> {
    Json(json!({ "data": data, "status": "success", "code": 200, "messages": "" }))
}

fn failure(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "data": null, "status": "error", "code": status.as_u16(), "messages": message })),
    )
        .into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Token {}", GOOD_TOKEN))
        .unwrap_or(false)
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["username"] == "admin" && body["password"] == "secret" {
        envelope(json!({
            "id": 1,
            "token": GOOD_TOKEN,
            "refresh_token": "refresh",
            "user": { "id": 42 },
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        }))
        .into_response()
    } else {
        failure(StatusCode::UNAUTHORIZED, "Invalid username or password")
    }
}

async fn logout(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if authorized(&headers) && body["token"] == GOOD_TOKEN {
        envelope(Value::Null).into_response()
    } else {
        failure(StatusCode::UNAUTHORIZED, "Session not found")
    }
}

async fn role(Path(id): Path<u64>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return failure(StatusCode::UNAUTHORIZED, "Authentication credentials were not provided");
    }
    envelope(json!({ "id": id, "rolename": "administrator" })).into_response()
}

async fn identity_roles(Path(id): Path<u64>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return failure(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    envelope(json!([
        { "id": 1, "user": id, "role": 1 },
        { "id": 2, "user": id, "role": 2 }
    ]))
    .into_response()
}

async fn active_modules(headers: HeaderMap) -> Response {
    // Reachable anonymously; the adapter must not send a credential here
    if headers.contains_key("authorization") {
        return failure(StatusCode::BAD_REQUEST, "unexpected credential");
    }
    envelope(Value::Null).into_response()
}

async fn all_modules(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return failure(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    envelope(json!([
        { "id": 1, "name": "inventory", "version": "1.0.0", "installed": true },
        { "id": 2, "name": "billing", "version": "0.3.1", "installed": false }
    ]))
    .into_response()
}

async fn install_module(Path(_id): Path<u64>) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

async fn upgrade_module(Path(_id): Path<u64>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return failure(StatusCode::FORBIDDEN, "Forbidden");
    }
    envelope(Value::Null).into_response()
}

fn identity_json(id: u64, body: &Value) -> Value {
    json!({
        "id": id,
        "username": body.get("username").cloned().unwrap_or(json!("stored")),
        "email": body.get("email").cloned().unwrap_or(Value::Null),
        "password": "pbkdf2_sha256$hash",
        "token": null,
        "refresh_token": null,
        "is_active": body.get("is_active").cloned().unwrap_or(json!(true)),
        "roles": body.get("roles").cloned().unwrap_or(json!([])),
        "created_at": "2024-01-15T10:00:00.123456",
        "updated_at": "2024-01-15T10:00:00.123456"
    })
}

// Creation is open; every other identity route wants a credential
async fn create_identity(Json(body): Json<Value>) -> Response {
    if body.get("password").is_none() {
        return failure(StatusCode::BAD_REQUEST, "Password is required");
    }
    envelope(identity_json(7, &body)).into_response()
}

async fn identity(Path(id): Path<u64>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return failure(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    envelope(identity_json(id, &json!({}))).into_response()
}

async fn all_identities(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return failure(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    envelope(json!([
        identity_json(1, &json!({ "username": "admin", "roles": [1] })),
        identity_json(2, &json!({ "username": "multi", "roles": [2, 3] }))
    ]))
    .into_response()
}

async fn update_identity(
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return failure(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    // Unset draft fields must not be sent at all
    if body.as_object().map(|o| o.contains_key("password")).unwrap_or(false) {
        return failure(StatusCode::BAD_REQUEST, "unexpected password");
    }
    envelope(identity_json(id, &body)).into_response()
}

async fn delete_identity(Path(_id): Path<u64>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return failure(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    envelope(Value::Null).into_response()
}

async fn delete_all_identities() -> Response {
    failure(StatusCode::FORBIDDEN, "Only administrators may delete every user")
}

async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/services/users/login", post(login))
        .route("/services/users/logout", post(logout))
        .route("/services/users/create", post(create_identity))
        .route("/services/users/get/all", get(all_identities))
        .route("/services/users/get/{id}", get(identity))
        .route("/services/users/update/{id}", put(update_identity))
        .route("/services/users/delete/all", delete(delete_all_identities))
        .route("/services/users/delete/{id}", delete(delete_identity))
        .route("/services/roles/get/{id}", get(role))
        .route("/services/user-roles/get/{id}", get(identity_roles))
        .route("/services/modules/active", get(active_modules))
        .route("/services/modules/all", get(all_modules))
        .route("/services/modules/install/{id}", get(install_module))
        .route("/services/modules/upgrade/{id}", get(upgrade_module));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let address = listener.local_addr().expect("Failed to read local address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Backend crashed");
    });

    format!("http://{}", address)
}

async fn client() -> HttpConsoleApi {
    let config = ApiConfig {
        base_url: spawn_backend().await,
        timeout_seconds: 5,
        ..Default::default()
    };
    HttpConsoleApi::new(&config).expect("Failed to create client")
}

#[tokio::test]
async fn test_login_success_and_failure() {
    let api = client().await;

    let grant = api
        .login(&Credentials {
            username: "admin".to_string(),
            password: "secret".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(grant.token, GOOD_TOKEN);
    assert_eq!(grant.user.id, 42);

    let error = api
        .login(&Credentials {
            username: "admin".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(error.backend_message(), Some("Invalid username or password"));
}

#[tokio::test]
async fn test_logout_sends_token() {
    let api = client().await;
    assert!(api.logout(GOOD_TOKEN).await.is_ok());

    let error = api.logout("stale").await.unwrap_err();
    assert_eq!(error.backend_message(), Some("Session not found"));
}

#[tokio::test]
async fn test_missing_credential_is_rejected_by_backend_not_client() {
    let api = client().await;

    let role = api.get_role(Some(GOOD_TOKEN), 1).await.unwrap();
    assert_eq!(role.name, "administrator");

    let error = api.get_role(None, 1).await.unwrap_err();
    assert_eq!(
        error,
        ApiError::Backend {
            status: 401,
            messages: Some("Authentication credentials were not provided".to_string()),
        }
    );
}

#[tokio::test]
async fn test_identity_roles_decoded() {
    let api = client().await;
    let assignments = api.get_identity_roles(Some(GOOD_TOKEN), 42).await.unwrap();
    assert_eq!(assignments.len(), 2);
    assert!(assignments.iter().all(|a| a.identity_id == 42));
    assert_eq!(assignments[1].role_id, 2);
}

#[tokio::test]
async fn test_module_listings() {
    let api = client().await;

    // `data: null` decodes as an empty list
    let active = api.get_active_modules().await.unwrap();
    assert!(active.is_empty());

    let all = api.get_all_modules(Some(GOOD_TOKEN)).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].installed);
    assert!(!all[1].installed);
}

#[tokio::test]
async fn test_module_commands() {
    let api = client().await;

    assert!(api.upgrade_module(Some(GOOD_TOKEN), 1).await.is_ok());

    let error = api.install_module(Some(GOOD_TOKEN), 1).await.unwrap_err();
    assert_eq!(
        error,
        ApiError::Backend {
            status: 500,
            messages: None,
        }
    );
    assert_eq!(error.message_or("Failed Install Module"), "Failed Install Module");
}

#[tokio::test]
async fn test_identity_directory_endpoints() {
    let api = client().await;

    let created = api
        .create_identity(
            None,
            &IdentityDraft {
                username: Some("carol".to_string()),
                email: Some("carol@example.com".to_string()),
                password: Some("hunter2".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(created.id, 7);
    assert_eq!(created.username, "carol");
    assert_eq!(created.email.as_deref(), Some("carol@example.com"));
    assert!(created.created_at.is_some());

    let all = api.get_all_identities(Some(GOOD_TOKEN)).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].roles, vec![2, 3]);

    let one = api.get_identity(Some(GOOD_TOKEN), 5).await.unwrap();
    assert_eq!(one.id, 5);
    assert!(api.get_identity(None, 5).await.is_err());

    let updated = api
        .update_identity(
            Some(GOOD_TOKEN),
            2,
            &IdentityDraft {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.id, 2);
    assert!(!updated.is_active);

    assert!(api.delete_identity(Some(GOOD_TOKEN), 2).await.is_ok());

    let error = api.delete_all_identities(Some(GOOD_TOKEN)).await.unwrap_err();
    assert_eq!(
        error.backend_message(),
        Some("Only administrators may delete every user")
    );
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let config = ApiConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_seconds: 2,
        ..Default::default()
    };
    let api = HttpConsoleApi::new(&config).unwrap();

    let error = api.get_active_modules().await.unwrap_err();
    assert!(matches!(error, ApiError::Network(_)));
}
