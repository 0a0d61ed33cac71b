use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use media_storefront::models::{Category, MediaKind, MediaRecord, NewMediaRecord};
use media_storefront::services::{Catalog, CatalogError, JsonCatalog, SqlCatalog};
use media_storefront::storage::{MediaStore, MemoryStore};
use media_storefront::web::{build_router, build_state};
use media_storefront::{Config, Database};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN_USER: &str = "admin";
const ADMIN_PASS: &str = "correct horse";

fn create_test_db() -> Database {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let id: u32 = rng.gen();
    let name = format!("test_db_{}", id);

    let db = Database::open_memory(&name).expect("Failed to create test database");
    db.migrate().expect("Failed to run migrations");
    db
}

fn temp_dir(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()))
}

fn test_config(covers_dir: &PathBuf, extra: &str) -> Config {
    let toml = format!(
        r#"
[storage]
backend = "memory"

[admin]
username = "{}"
password = "{}"

[media]
covers_dir = "{}"
{}
"#,
        ADMIN_USER,
        ADMIN_PASS,
        covers_dir.display(),
        extra
    );
    let config = Config::parse(&toml).expect("Failed to parse test config");
    config.validate().expect("Invalid test config");
    config
}

struct TestApp {
    router: Router,
    catalog: Arc<dyn Catalog>,
    store: Arc<MemoryStore>,
    covers_dir: PathBuf,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config("")
    }

    fn with_config(extra: &str) -> Self {
        Self::build(extra, Arc::new(SqlCatalog::new(create_test_db())))
    }

    fn with_catalog(catalog: Arc<dyn Catalog>) -> Self {
        Self::build("", catalog)
    }

    fn build(extra: &str, catalog: Arc<dyn Catalog>) -> Self {
        let covers_dir = temp_dir("covers");
        let config = test_config(&covers_dir, extra);
        let store = Arc::new(MemoryStore::new());
        let state = build_state(config, catalog.clone(), store.clone()).expect("Failed to build state");
        let router = build_router(state).expect("Failed to build router");
        Self {
            router,
            catalog,
            store,
            covers_dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::post(uri).header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Logs in and returns a `session=...` cookie pair.
    async fn login(&self) -> String {
        let body = format!("username={}&password=correct+horse", ADMIN_USER);
        let response = self.post_form("/admin/login", &body, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("login should set a session cookie")
    }

    async fn put(&self, key: &str, bytes: &[u8]) {
        self.store
            .put_object(key, Bytes::copy_from_slice(bytes), "application/octet-stream")
            .await
            .unwrap();
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.covers_dir).ok();
    }
}

/// First non-empty `name=value` pair set by the response for `name`.
fn cookie_pair(response: &Response, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| v.starts_with(&prefix))
        .map(|v| v.split(';').next().unwrap_or_default().to_string())
        .find(|v| *v != prefix)
}

fn session_cookie(response: &Response) -> Option<String> {
    cookie_pair(response, "session")
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn body_bytes(response: Response) -> Bytes {
    to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
}

fn multipart_body(boundary: &str, fields: &[(&str, &str)], files: &[(&str, &str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }
    for (name, filename, content_type, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                boundary, name, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

mod catalog_backend_tests {
    use super::*;

    fn exercise_catalog(catalog: &dyn Catalog) {
        let rock = catalog.add_category("  Rock ").expect("add category");
        assert_eq!(rock.name, "Rock");
        assert!(matches!(
            catalog.add_category("Rock"),
            Err(CatalogError::Conflict(_))
        ));
        assert!(matches!(
            catalog.add_category("   "),
            Err(CatalogError::Invalid(_))
        ));

        let record = catalog
            .insert_record(
                NewMediaRecord::audio("song.mp3", "Nina", "Jazz", 499).with_category(Some(rock.id)),
            )
            .expect("insert record");
        assert_eq!(record.url, "/stream/song.mp3");
        assert_eq!(record.category_id, Some(rock.id));

        assert!(matches!(
            catalog.insert_record(NewMediaRecord::audio("song.mp3", "X", "Y", 1)),
            Err(CatalogError::Conflict(_))
        ));
        // Same name under the other kind is a separate record.
        catalog
            .insert_record(NewMediaRecord::video("song.mp3", "Clip"))
            .expect("insert video with same filename");

        let found = catalog.find_by_filename("song.mp3").unwrap().unwrap();
        assert_eq!(found.kind, MediaKind::Audio);

        catalog.delete_category(rock.id).expect("delete category");
        let detached = catalog
            .find_record(MediaKind::Audio, "song.mp3")
            .unwrap()
            .unwrap();
        assert_eq!(detached.category_id, None);
        assert!(matches!(
            catalog.delete_category(rock.id),
            Err(CatalogError::NotFound(_))
        ));

        let removed = catalog.delete_record(MediaKind::Audio, "song.mp3").unwrap();
        assert_eq!(removed.artist.as_deref(), Some("Nina"));
        assert!(catalog
            .find_record(MediaKind::Audio, "song.mp3")
            .unwrap()
            .is_none());
        assert!(matches!(
            catalog.delete_record(MediaKind::Audio, "song.mp3"),
            Err(CatalogError::NotFound(_))
        ));
        assert_eq!(catalog.list_records(MediaKind::Video).unwrap().len(), 1);
    }

    #[test]
    fn test_sql_catalog_contract() {
        let catalog = SqlCatalog::new(create_test_db());
        exercise_catalog(&catalog);
    }

    #[test]
    fn test_json_catalog_contract() {
        let dir = temp_dir("json-catalog");
        let catalog = JsonCatalog::open(&dir).expect("open json catalog");
        exercise_catalog(&catalog);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_insert_with_unknown_category_is_rejected() {
        let catalog = SqlCatalog::new(create_test_db());
        let result = catalog
            .insert_record(NewMediaRecord::audio("a.mp3", "A", "B", 0).with_category(Some(42)));
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }
}

mod public_tests {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let response = app.get("/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn test_index_lists_catalog_and_storage() {
        let app = TestApp::new();
        app.catalog
            .insert_record(NewMediaRecord::audio("song.mp3", "Nina Simone", "Jazz", 150))
            .unwrap();
        app.put("song.mp3", b"abc").await;
        app.put("found.mp4", b"abc").await;

        let response = app.get("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Nina Simone"));
        assert!(html.contains("found.mp4"));
        assert!(html.contains("1.50"));
    }

    #[tokio::test]
    async fn test_only_catalog_items_can_be_bought() {
        let app = TestApp::new();
        app.catalog
            .insert_record(NewMediaRecord::audio("song.mp3", "Nina Simone", "Jazz", 150))
            .unwrap();
        app.put("song.mp3", b"abc").await;
        app.put("stray.mp3", b"abc").await;
        app.put("found.mp4", b"abc").await;

        let html = body_text(app.get("/").await).await;
        assert!(html.contains("stray.mp3"));
        assert!(html.contains("found.mp4"));
        assert!(html.contains(r#"class="buy" data-filename="song.mp3""#));
        assert!(!html.contains(r#"class="buy" data-filename="stray.mp3""#));
        assert!(!html.contains(r#"class="buy" data-filename="found.mp4""#));
    }

    #[tokio::test]
    async fn test_catalog_survives_listing_failure() {
        let app = TestApp::new();
        app.catalog
            .insert_record(NewMediaRecord::audio("song.mp3", "Nina Simone", "Jazz", 150))
            .unwrap();
        app.put("song.mp3", b"abc").await;
        app.put("stray.mp4", b"abc").await;
        app.store.fail_lists(true);

        let response = app.get("/api/catalog").await;
        assert_eq!(response.status(), StatusCode::OK);
        let listing = body_text(response).await;
        assert!(listing.contains("song.mp3"));
        assert!(listing.contains("Nina Simone"));
        assert!(!listing.contains("stray.mp4"));

        let response = app.get("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Nina Simone"));
    }

    #[tokio::test]
    async fn test_catalog_json_search() {
        let app = TestApp::new();
        app.catalog
            .insert_record(NewMediaRecord::audio("a.mp3", "Miles", "Jazz", 100))
            .unwrap();
        app.catalog
            .insert_record(NewMediaRecord::audio("b.mp3", "Burial", "Garage", 100))
            .unwrap();

        let json = body_json(app.get("/api/catalog?q=JAZZ").await).await;
        assert_eq!(json["query"], "jazz");
        let audios = json["sections"][0]["audios"].as_array().unwrap();
        assert_eq!(audios.len(), 1);
        assert_eq!(audios[0]["filename"], "a.mp3");
    }

    #[tokio::test]
    async fn test_stream_full_body() {
        let app = TestApp::new();
        app.put("song.mp3", b"0123456789").await;

        let response = app.get("/stream/song.mp3").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(body_bytes(response).await.as_ref(), b"0123456789");
    }

    #[tokio::test]
    async fn test_stream_range_returns_partial_content() {
        let app = TestApp::new();
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        app.put("movie.mp4", &data).await;

        let request = Request::get("/stream/movie.mp4")
            .header(header::RANGE, "bytes=0-99")
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-99/1000");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(body_bytes(response).await.as_ref(), &data[..100]);
    }

    #[tokio::test]
    async fn test_stream_open_and_suffix_ranges() {
        let app = TestApp::new();
        app.put("clip.webm", b"abcdefghij").await;

        let request = Request::get("/stream/clip.webm")
            .header(header::RANGE, "bytes=7-")
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 7-9/10");
        assert_eq!(body_bytes(response).await.as_ref(), b"hij");

        let request = Request::get("/stream/clip.webm")
            .header(header::RANGE, "bytes=-4")
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 6-9/10");
        assert_eq!(body_bytes(response).await.as_ref(), b"ghij");
    }

    #[tokio::test]
    async fn test_stream_unsatisfiable_range() {
        let app = TestApp::new();
        app.put("clip.webm", b"abcdefghij").await;

        let request = Request::get("/stream/clip.webm")
            .header(header::RANGE, "bytes=50-60")
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */10");
    }

    #[tokio::test]
    async fn test_stream_malformed_range_serves_everything() {
        let app = TestApp::new();
        app.put("clip.webm", b"abc").await;

        let request = Request::get("/stream/clip.webm")
            .header(header::RANGE, "bytes=oops")
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await.as_ref(), b"abc");
    }

    #[tokio::test]
    async fn test_stream_unknown_key() {
        let app = TestApp::new();
        let response = app.get("/stream/missing.mp3").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_fake_buy_unknown_file() {
        let app = TestApp::new();
        let response = app.post_form("/fake-buy/nope.mp3", "", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_download_token_is_single_use() {
        let app = TestApp::new();
        app.catalog
            .insert_record(NewMediaRecord::audio("song.mp3", "A", "B", 100))
            .unwrap();
        app.put("song.mp3", b"music").await;

        let json = body_json(app.post_form("/fake-buy/song.mp3", "", None).await).await;
        assert_eq!(json["success"], true);
        let url = json["download_url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/download/"));

        let first = app.get(&url).await;
        assert_eq!(first.status(), StatusCode::SEE_OTHER);
        assert!(location(&first).starts_with("/stream/song.mp3"));

        let second = app.get(&url).await;
        assert_eq!(second.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_download_unknown_token() {
        let app = TestApp::new();
        let response = app.get("/download/not-a-token").await;
        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_download_after_record_deleted() {
        let app = TestApp::new();
        app.catalog
            .insert_record(NewMediaRecord::video("clip.mp4", "Clip"))
            .unwrap();

        let json = body_json(app.post_form("/fake-buy/clip.mp4", "", None).await).await;
        let url = json["download_url"].as_str().unwrap().to_string();
        app.catalog.delete_record(MediaKind::Video, "clip.mp4").unwrap();

        let response = app.get(&url).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_proxy_mode() {
        let app = TestApp::with_config("[download]\nmode = \"proxy\"\n");
        app.catalog
            .insert_record(NewMediaRecord::audio("song.mp3", "A", "B", 100))
            .unwrap();
        app.put("song.mp3", b"music").await;

        let json = body_json(app.post_form("/fake-buy/song.mp3", "", None).await).await;
        let url = json["download_url"].as_str().unwrap().to_string();

        let response = app.get(&url).await;
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("attachment"));
        assert!(disposition.contains("song.mp3"));
        assert_eq!(body_bytes(response).await.as_ref(), b"music");
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let app = TestApp::new();
        let response = app.get("/health").await;
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }
}

mod admin_tests {
    use super::*;

    const BOUNDARY: &str = "storefront-test-boundary";

    async fn upload(
        app: &TestApp,
        cookie: &str,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &str, &[u8])],
    ) -> Response {
        let request = Request::post("/admin")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header(header::COOKIE, cookie)
            .body(Body::from(multipart_body(BOUNDARY, fields, files)))
            .unwrap();
        app.send(request).await
    }

    #[tokio::test]
    async fn test_dashboard_requires_login() {
        let app = TestApp::new();
        let response = app.get("/admin").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/login?next=/admin");
    }

    #[tokio::test]
    async fn test_login_rejects_bad_password() {
        let app = TestApp::new();
        let response = app
            .post_form("/admin/login", "username=admin&password=wrong", None)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/login");
        assert!(session_cookie(&response).is_none());
    }

    #[tokio::test]
    async fn test_login_is_rate_limited() {
        let app = TestApp::with_config("[auth]\nmax_login_attempts = 2\n");
        for _ in 0..2 {
            app.post_form("/admin/login", "username=admin&password=wrong", None)
                .await;
        }
        let response = app
            .post_form(
                "/admin/login",
                "username=admin&password=correct+horse",
                None,
            )
            .await;
        assert!(session_cookie(&response).is_none());
    }

    #[tokio::test]
    async fn test_login_honors_local_next_only() {
        let app = TestApp::new();
        let response = app
            .post_form(
                "/admin/login",
                "username=admin&password=correct+horse&next=%2F%2Fevil.example",
                None,
            )
            .await;
        assert_eq!(location(&response), "/admin");

        let response = app
            .post_form(
                "/admin/login",
                "username=admin&password=correct+horse&next=%2Fadmin%3Ftab%3Dmedia",
                None,
            )
            .await;
        assert_eq!(location(&response), "/admin?tab=media");
    }

    #[tokio::test]
    async fn test_login_then_dashboard_then_logout() {
        let app = TestApp::new();
        let cookie = app.login().await;

        let response = app
            .send(
                Request::get("/admin")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .send(
                Request::get("/admin/logout")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(location(&response), "/admin/login");

        let response = app
            .send(
                Request::get("/admin")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn test_admin_api_requires_session() {
        let app = TestApp::new();

        let response = app.post_form("/admin/delete/audio/a.mp3", "", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["success"], false);

        let response = app
            .post_form("/admin/category/add", "category_name=Rock", None)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .post_form("/admin/category/delete", "category_id=1", Some("session=forged"))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_category_add_and_delete() {
        let app = TestApp::new();
        let cookie = app.login().await;

        let response = app
            .post_form("/admin/category/add", "category_name=+Ambient+", Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["category"]["name"], "Ambient");
        let id = json["category"]["id"].as_i64().unwrap();

        let response = app
            .post_form("/admin/category/add", "category_name=Ambient", Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .post_form("/admin/category/add", "category_name=", Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .post_form(
                "/admin/category/delete",
                &format!("category_id={}", id),
                Some(&cookie),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["category_id"], id);

        let response = app
            .post_form(
                "/admin/category/delete",
                &format!("category_id={}", id),
                Some(&cookie),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .post_form("/admin/category/delete", "category_id=abc", Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_with_category_assigns_it() {
        let app = TestApp::new();
        let cookie = app.login().await;
        let category = app.catalog.add_category("Rock").unwrap();
        let category_id = category.id.to_string();

        let response = upload(
            &app,
            &cookie,
            &[
                ("media_type", "audio"),
                ("artist", "The Band"),
                ("genre", ""),
                ("price", "4.99"),
                ("category_id", &category_id),
            ],
            &[("file", "My Song.mp3", "audio/mpeg", b"ID3data")],
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin");

        let record = app
            .catalog
            .find_record(MediaKind::Audio, "My_Song.mp3")
            .unwrap()
            .expect("record should exist");
        assert_eq!(record.category_id, Some(category.id));
        assert_eq!(record.artist.as_deref(), Some("The Band"));
        assert_eq!(record.genre.as_deref(), Some("Unknown"));
        assert_eq!(record.price, 499);
        assert_eq!(record.url, "/stream/My_Song.mp3");
        assert!(app.store.contains("My_Song.mp3").await);
    }

    #[tokio::test]
    async fn test_upload_video_with_unknown_category_and_thumb() {
        let app = TestApp::new();
        let cookie = app.login().await;

        upload(
            &app,
            &cookie,
            &[("media_type", "video"), ("category_id", "77")],
            &[
                ("file", "clip.mp4", "video/mp4", b"frames"),
                ("thumb", "cover.png", "image/png", b"png"),
            ],
        )
        .await;

        let record = app
            .catalog
            .find_record(MediaKind::Video, "clip.mp4")
            .unwrap()
            .unwrap();
        assert_eq!(record.category_id, None);
        assert_eq!(record.title.as_deref(), Some("clip.mp4"));
        let thumb = record.thumb_url.expect("thumb saved");
        let name = thumb.strip_prefix("/static/covers/").unwrap();
        assert!(app.covers_dir.join(name).exists());

        let response = app.get(&thumb).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    fn covers_on_disk(app: &TestApp) -> usize {
        std::fs::read_dir(&app.covers_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Follows the post-upload redirect and returns the dashboard HTML.
    async fn dashboard_after(app: &TestApp, cookie: &str, response: &Response) -> String {
        let flash = cookie_pair(response, "flash").expect("upload should set a flash");
        let request = Request::get("/admin")
            .header(header::COOKIE, format!("{}; {}", cookie, flash))
            .body(Body::empty())
            .unwrap();
        body_text(app.send(request).await).await
    }

    #[tokio::test]
    async fn test_upload_storage_failure_saves_nothing() {
        let app = TestApp::new();
        let cookie = app.login().await;
        app.store.fail_puts(true);

        let response = upload(
            &app,
            &cookie,
            &[("media_type", "audio"), ("artist", "Nobody")],
            &[
                ("file", "lost.mp3", "audio/mpeg", b"data"),
                ("thumb", "cover.png", "image/png", b"png"),
            ],
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin");

        assert!(app.catalog.find_by_filename("lost.mp3").unwrap().is_none());
        assert!(!app.store.contains("lost.mp3").await);
        assert_eq!(covers_on_disk(&app), 0);

        let html = dashboard_after(&app, &cookie, &response).await;
        assert!(html.contains("flash-error"));
        assert!(html.contains("Upload failed"));
    }

    /// Catalog whose record inserts always fail.
    struct InsertFailingCatalog(SqlCatalog);

    impl Catalog for InsertFailingCatalog {
        fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
            self.0.list_categories()
        }

        fn get_category(&self, id: i64) -> Result<Option<Category>, CatalogError> {
            self.0.get_category(id)
        }

        fn add_category(&self, name: &str) -> Result<Category, CatalogError> {
            self.0.add_category(name)
        }

        fn delete_category(&self, id: i64) -> Result<(), CatalogError> {
            self.0.delete_category(id)
        }

        fn insert_record(&self, record: NewMediaRecord) -> Result<MediaRecord, CatalogError> {
            Err(CatalogError::Conflict(format!(
                "{} was committed by another upload",
                record.filename
            )))
        }

        fn find_record(
            &self,
            kind: MediaKind,
            filename: &str,
        ) -> Result<Option<MediaRecord>, CatalogError> {
            self.0.find_record(kind, filename)
        }

        fn list_records(&self, kind: MediaKind) -> Result<Vec<MediaRecord>, CatalogError> {
            self.0.list_records(kind)
        }

        fn delete_record(&self, kind: MediaKind, filename: &str) -> Result<MediaRecord, CatalogError> {
            self.0.delete_record(kind, filename)
        }
    }

    #[tokio::test]
    async fn test_upload_rolls_back_when_record_is_rejected() {
        let app = TestApp::with_catalog(Arc::new(InsertFailingCatalog(SqlCatalog::new(
            create_test_db(),
        ))));
        let cookie = app.login().await;

        let response = upload(
            &app,
            &cookie,
            &[("media_type", "video"), ("title", "Race")],
            &[
                ("file", "race.mp4", "video/mp4", b"frames"),
                ("thumb", "poster.png", "image/png", b"png"),
            ],
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        assert!(!app.store.contains("race.mp4").await);
        assert_eq!(covers_on_disk(&app), 0);

        let html = dashboard_after(&app, &cookie, &response).await;
        assert!(html.contains("flash-error"));
        assert!(html.contains("Could not save"));
    }

    #[tokio::test]
    async fn test_upload_rejects_duplicates_and_bad_input() {
        let app = TestApp::new();
        let cookie = app.login().await;

        upload(
            &app,
            &cookie,
            &[("media_type", "audio")],
            &[("file", "a.mp3", "audio/mpeg", b"one")],
        )
        .await;
        upload(
            &app,
            &cookie,
            &[("media_type", "audio"), ("artist", "Other")],
            &[("file", "a.mp3", "audio/mpeg", b"two")],
        )
        .await;
        let record = app
            .catalog
            .find_record(MediaKind::Audio, "a.mp3")
            .unwrap()
            .unwrap();
        assert_eq!(record.artist.as_deref(), Some("Unknown"));

        upload(
            &app,
            &cookie,
            &[("media_type", "podcast")],
            &[("file", "b.mp3", "audio/mpeg", b"x")],
        )
        .await;
        assert!(app.catalog.find_by_filename("b.mp3").unwrap().is_none());
        assert!(!app.store.contains("b.mp3").await);

        let response = upload(&app, &cookie, &[("media_type", "audio")], &[]).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_listing_entry() {
        let app = TestApp::new();
        let cookie = app.login().await;

        upload(
            &app,
            &cookie,
            &[("media_type", "audio"), ("artist", "Gone Soon")],
            &[("file", "bye.mp3", "audio/mpeg", b"data")],
        )
        .await;
        let listing = body_text(app.get("/api/catalog").await).await;
        assert!(listing.contains("bye.mp3"));

        let response = app
            .post_form("/admin/delete/audio/bye.mp3", "", Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert!(json.get("warning").is_none());

        assert!(app
            .catalog
            .find_record(MediaKind::Audio, "bye.mp3")
            .unwrap()
            .is_none());
        assert!(!app.store.contains("bye.mp3").await);
        let listing = body_text(app.get("/api/catalog").await).await;
        assert!(!listing.contains("bye.mp3"));
        let page = body_text(app.get("/").await).await;
        assert!(!page.contains("Gone Soon"));
    }

    #[tokio::test]
    async fn test_delete_removes_video_poster() {
        let app = TestApp::new();
        let cookie = app.login().await;

        upload(
            &app,
            &cookie,
            &[("media_type", "video")],
            &[
                ("file", "clip.mp4", "video/mp4", b"frames"),
                ("thumb", "poster.jpg", "image/jpeg", b"jpg"),
            ],
        )
        .await;
        let thumb = app
            .catalog
            .find_record(MediaKind::Video, "clip.mp4")
            .unwrap()
            .unwrap()
            .thumb_url
            .expect("poster saved");
        let poster = app
            .covers_dir
            .join(thumb.strip_prefix("/static/covers/").unwrap());
        assert!(poster.exists());

        let response = app
            .post_form("/admin/delete/video/clip.mp4", "", Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!poster.exists());
    }

    #[tokio::test]
    async fn test_delete_continues_when_storage_fails() {
        let app = TestApp::new();
        let cookie = app.login().await;
        app.catalog
            .insert_record(NewMediaRecord::video("v.mp4", "V"))
            .unwrap();
        app.store.fail_deletes(true);

        let response = app
            .post_form("/admin/delete/video/v.mp4", "", Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert!(json["warning"].is_string());
        assert!(app
            .catalog
            .find_record(MediaKind::Video, "v.mp4")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_bad_kind_and_unknown_record() {
        let app = TestApp::new();
        let cookie = app.login().await;

        let response = app
            .post_form("/admin/delete/podcast/a.mp3", "", Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .post_form("/admin/delete/audio/missing.mp3", "", Some(&cookie))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
