//! End-to-end tests driving the full router with `tower::ServiceExt::oneshot`.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use galleria_server::ai::EnvLayer;
use galleria_server::config::Config;
use galleria_server::entities::SqliteStore;
use galleria_server::routes;
use galleria_server::state::AppState;

const UNREACHABLE: &str = "http://127.0.0.1:9/placeholder.png";

struct TestApp {
    router: Router,
    content: tempfile::TempDir,
}

async fn app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let content = tempfile::tempdir().unwrap();
    let mut config = Config {
        content_dir: content.path().to_string_lossy().into_owned(),
        mock_delay: Duration::from_millis(200),
        mock_image_url: UNREACHABLE.to_owned(),
        ..Config::default()
    };
    configure(&mut config);

    let store = SqliteStore::in_memory().await.unwrap();
    let state = Arc::new(AppState::new(config, store, EnvLayer::empty()));
    TestApp {
        router: routes::build(state),
        content,
    }
}

async fn app() -> TestApp {
    app_with(|_| {}).await
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send("GET", uri, None, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(body), None).await
    }

    async fn wait_terminal(&self, task_id: i64) -> Value {
        for _ in 0..200 {
            let (status, task) = self.post("/ai/task-status", json!({ "id": task_id })).await;
            assert_eq!(status, StatusCode::OK);
            if task["status"] != "PROCESSING" {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("task {task_id} never finished");
    }
}

/// Serve a generated PNG at `http://<addr>/asset.png`.
async fn asset_server(width: u32, height: u32) -> String {
    let mut png = Vec::new();
    image::RgbImage::from_pixel(width, height, image::Rgb([40, 90, 160]))
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let router = Router::new().route(
        "/asset.png",
        get(move || {
            let png = png.clone();
            async move { ([(header::CONTENT_TYPE, "image/png")], png) }
        }),
    );
    format!("{}/asset.png", spawn_upstream(router).await)
}

async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Point the chat settings at `url` through the config table.
async fn configure_chat(app: &TestApp, url: &str) {
    for (key, value) in [("AI_API_KEY", "sk-test-chat-key"), ("AI_CHAT_API_URL", url)] {
        let (status, _) = app
            .post("/system-configs", json!({ "key": key, "value": value }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
}

fn local_file(content: &Path, public_url: &str) -> std::path::PathBuf {
    content.join(public_url.trim_start_matches("/uploads/"))
}

async fn create_image(app: &TestApp, title: &str) -> Value {
    let (status, image) = app
        .post(
            "/images",
            json!({ "title": title, "url": format!("https://cdn.test/{title}.jpg"), "tags": ["sky"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    image
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app().await;
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn mock_generation_materializes_locally() {
    let asset = asset_server(800, 400).await;
    let app = app_with(|c| c.mock_image_url = asset).await;

    let (status, body) = app
        .post("/ai/generate", json!({ "prompt": "a quiet harbor", "aspect_ratio": "16:9" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let task_id = body["taskId"].as_i64().unwrap();

    // Submission returns before the job finishes.
    let (_, task) = app.post("/ai/task-status", json!({ "id": task_id })).await;
    assert_eq!(task["status"], "PROCESSING");
    assert!(task["resultUrl"].is_null());

    let task = app.wait_terminal(task_id).await;
    assert_eq!(task["status"], "COMPLETED");
    assert!(task["errorMessage"].is_null());

    let result = task["resultUrl"].as_str().unwrap();
    let thumb = task["thumbUrl"].as_str().unwrap();
    assert!(result.starts_with("/uploads/ai/") && result.ends_with(".png"));
    assert!(thumb.starts_with("/uploads/ai/thumbs/") && thumb.ends_with(".jpg"));

    let thumb_img = image::open(local_file(app.content.path(), thumb)).unwrap();
    assert_eq!(thumb_img.width(), 400);
    assert_eq!(thumb_img.height(), 200);
    assert!(local_file(app.content.path(), result).exists());
}

#[tokio::test]
async fn unreachable_result_is_passed_through() {
    let app = app().await;
    let (_, body) = app.post("/ai/generate", json!({ "prompt": "fog" })).await;
    let task = app.wait_terminal(body["taskId"].as_i64().unwrap()).await;

    assert_eq!(task["status"], "COMPLETED");
    assert_eq!(task["resultUrl"], UNREACHABLE);
    assert_eq!(task["thumbUrl"], UNREACHABLE);
}

#[tokio::test]
async fn empty_prompt_is_rejected() {
    let app = app().await;
    let (status, body) = app.post("/ai/generate", json!({ "prompt": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (_, tasks) = app.post("/ai/tasks", json!({})).await;
    assert_eq!(tasks.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn favorite_toggle_round_trips_the_counter() {
    let app = app().await;
    let (_, user) = app.post("/users", json!({ "username": "mira" })).await;
    let image = create_image(&app, "dunes").await;
    let pair = json!({ "userId": user["id"], "imageId": image["id"] });

    let (status, first) = app.post("/interactions/favorite", pair.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["likes"], 1);
    assert_eq!(first["favorited"], true);

    let (_, state) = app.post("/interactions/favorite/status", pair.clone()).await;
    assert_eq!(state["favorited"], true);
    let (_, favs) = app
        .get(&format!("/interactions/favorites?userId={}", user["id"]))
        .await;
    assert_eq!(favs.as_array().unwrap().len(), 1);

    let (_, second) = app.post("/interactions/favorite", pair).await;
    assert_eq!(second["likes"], 0);
    assert_eq!(second["favorited"], false);
}

#[tokio::test]
async fn favorite_on_missing_image_is_404() {
    let app = app().await;
    let (_, user) = app.post("/users", json!({ "username": "ivo" })).await;
    let (status, _) = app
        .post(
            "/interactions/favorite",
            json!({ "userId": user["id"], "imageId": 4242 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn history_upserts_and_clears() {
    let app = app().await;
    let (_, user) = app.post("/users", json!({ "username": "lin" })).await;
    let a = create_image(&app, "aurora").await;
    let b = create_image(&app, "canyon").await;

    for image in [&a, &b, &a] {
        let (status, _) = app
            .post(
                "/interactions/history",
                json!({ "userId": user["id"], "imageId": image["id"] }),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let uri = format!("/interactions/history?userId={}", user["id"]);
    let (_, entries) = app.get(&uri).await;
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["image"]["id"], a["id"]);

    let (status, cleared) = app.send("DELETE", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["deleted"], 2);
}

#[tokio::test]
async fn image_listing_pages_and_counts() {
    let app = app().await;
    for title in ["one", "two", "three"] {
        create_image(&app, title).await;
    }

    let (status, page) = app.get("/images?pageSize=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["page"], 1);
    assert_eq!(page["pageSize"], 2);
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], "three");
    assert_eq!(items[0]["tags"], json!(["sky"]));

    let (_, page) = app.get("/images?pageSize=2&page=2").await;
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    let (status, _) = app.get("/images?sort=random").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn views_and_downloads_are_counted() {
    let app = app().await;
    let image = create_image(&app, "glacier").await;
    let id = image["id"].as_i64().unwrap();

    let (_, viewed) = app.get(&format!("/images/{id}")).await;
    assert_eq!(viewed["views"], 1);
    let (_, downloaded) = app
        .send("POST", &format!("/images/{id}/download"), None, None)
        .await;
    assert_eq!(downloaded["downloads"], 1);
}

#[tokio::test]
async fn missing_resources_are_404() {
    let app = app().await;
    let (status, body) = app.get("/images/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("999"));

    let (status, _) = app.post("/ai/task-status", json!({ "id": 999 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/system-configs/NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post("/ai/chat-records/get", json!({ "userId": 1, "model": "gpt-4o-mini" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_require_the_token() {
    let app = app_with(|c| c.admin_token = Some("letmein".into())).await;

    let body = json!({ "name": "Nature" });
    let (status, _) = app.send("POST", "/categories", Some(body.clone()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .send("POST", "/categories", Some(body.clone()), Some("wrong"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, created) = app
        .send("POST", "/categories", Some(body.clone()), Some("letmein"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Nature");

    let (status, _) = app
        .send("POST", "/categories", Some(body), Some("letmein"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Reads stay public.
    let (status, list) = app.get("/categories").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn secret_configs_are_masked() {
    let app = app().await;
    let (status, stored) = app
        .post(
            "/system-configs",
            json!({ "key": "AI_API_KEY", "value": "sk-1234567890abcd" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["value"], "sk-…abcd");

    app.post(
        "/system-configs",
        json!({ "key": "AI_IMAGE_MODEL", "value": "flux-pro" }),
    )
    .await;

    let (_, entry) = app.get("/system-configs/AI_API_KEY").await;
    assert_eq!(entry["value"], "sk-…abcd");
    let (_, models) = app.get("/ai/models").await;
    assert_eq!(models["imageModel"], "flux-pro");

    let (status, _) = app
        .send("PATCH", "/system-configs/MISSING", Some(json!({ "value": "x" })), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send("DELETE", "/system-configs/AI_IMAGE_MODEL", None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn topics_keep_curated_order() {
    let app = app().await;
    let a = create_image(&app, "reef").await;
    let b = create_image(&app, "mesa").await;
    let (status, topic) = app.post("/topics", json!({ "title": "Earth tones" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = topic["id"].as_i64().unwrap();

    let (status, detail) = app
        .send(
            "PUT",
            &format!("/topics/{id}/images"),
            Some(json!({ "imageIds": [b["id"], a["id"]] })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["title"], "Earth tones");
    assert_eq!(detail["images"][0]["id"], b["id"]);
    assert_eq!(detail["images"][1]["id"], a["id"]);

    let (status, _) = app
        .send(
            "PUT",
            &format!("/topics/{id}/images"),
            Some(json!({ "imageIds": [777] })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn banners_hide_inactive_by_default() {
    let app = app().await;
    app.post(
        "/banners",
        json!({ "title": "Spring", "imageUrl": "https://cdn.test/spring.jpg", "sortOrder": 2 }),
    )
    .await;
    app.post(
        "/banners",
        json!({ "title": "Winter", "imageUrl": "https://cdn.test/winter.jpg", "isActive": false }),
    )
    .await;

    let (_, active) = app.get("/banners").await;
    assert_eq!(active.as_array().unwrap().len(), 1);
    let (_, all) = app.get("/banners?all=true").await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(all[0]["title"], "Winter");
}

#[tokio::test]
async fn chat_records_are_replaced_per_model() {
    let app = app().await;
    let save = |text: &str| {
        json!({
            "userId": 7,
            "model": "gpt-4o-mini",
            "messages": [{ "role": "user", "content": text }],
        })
    };
    app.post("/ai/chat-records/save", save("hello")).await;
    let (status, _) = app.post("/ai/chat-records/save", save("again")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, record) = app
        .post("/ai/chat-records/get", json!({ "userId": 7, "model": "gpt-4o-mini" }))
        .await;
    assert_eq!(record["messages"][0]["content"], "again");
    let (_, list) = app.post("/ai/chat-records/list", json!({ "userId": 7 })).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = app().await;
    let (status, doc) = app.get(routes::OPENAPI_PATH).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/ai/generate"].is_object());

    let app = app_with(|c| c.enable_docs = false).await;
    let (status, _) = app.get(routes::OPENAPI_PATH).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn far_image_pages_are_empty() {
    let app = app().await;
    create_image(&app, "tundra").await;

    let (status, page) = app
        .get(&format!("/images?page={}", i64::MAX))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn blank_config_keys_are_rejected() {
    let app = app().await;
    let (status, body) = app
        .post("/system-configs", json!({ "key": "   ", "value": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (_, list) = app.get("/system-configs").await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn chat_without_api_key_is_unavailable() {
    let app = app().await;
    let (status, body) = app.post("/ai/chat", json!({ "prompt": "hi" })).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "no API key configured for AI generation");
}

#[tokio::test]
async fn chat_surfaces_upstream_error_message() {
    let upstream = spawn_upstream(Router::new().route(
        "/chat",
        post(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": { "message": "rate limit exceeded" } })),
            )
        }),
    ))
    .await;
    let app = app().await;
    configure_chat(&app, &format!("{upstream}/chat")).await;

    let (status, body) = app.post("/ai/chat", json!({ "prompt": "hi" })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "rate limit exceeded");
}

#[tokio::test]
async fn chat_returns_assistant_reply() {
    let upstream = spawn_upstream(Router::new().route(
        "/chat",
        post(|Json(req): Json<Value>| async move {
            let reply = format!("echo: {}", req["messages"][0]["content"].as_str().unwrap_or(""));
            Json(json!({ "choices": [{ "message": { "role": "assistant", "content": reply } }] }))
        }),
    ))
    .await;
    let app = app().await;
    configure_chat(&app, &format!("{upstream}/chat")).await;

    let (status, body) = app
        .post("/ai/chat", json!({ "prompt": "hello", "model": "gpt-test" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "echo: hello");
    assert_eq!(body["model"], "gpt-test");
}
