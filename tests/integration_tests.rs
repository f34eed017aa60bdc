use showcase::models::{ContactMethod, CreateProduct, ProductStatus, UploadedImage, UserPlan};
use showcase::services::products::{
    create_product, BatchWriter, CreateLimits, ErrorKind, StoreError, WriteStatement,
};
use showcase::services::slug::SlugRegistry;
use showcase::services::{auth, catalog};
use showcase::Database;

fn create_test_db() -> Database {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let id: u32 = rng.gen();
    let name = format!("test_db_{}", id);

    let db = Database::open_memory(&name).expect("Failed to create test database");
    db.migrate().expect("Failed to run migrations");
    db
}

// Valid test passwords that meet requirements: 8+ chars, uppercase, lowercase, number
const TEST_PASSWORD: &str = "Password123";
const WRONG_PASSWORD: &str = "WrongPass456";

fn create_seller(db: &Database, username: &str) -> String {
    auth::create_user(
        db,
        username,
        &format!("{}@example.com", username),
        Some("Cửa hàng Lan"),
        TEST_PASSWORD,
        UserPlan::Free,
    )
    .expect("Failed to create user")
}

fn product_input(owner: &str, title: &str) -> CreateProduct {
    CreateProduct {
        title: title.to_string(),
        price: "250000".to_string(),
        highlights: vec![
            "Da thật".to_string(),
            "   ".to_string(),
            "Bảo hành 12 tháng".to_string(),
        ],
        contact_method: Some(ContactMethod::Zalo),
        contact_value: "0901234567".to_string(),
        images: vec![
            UploadedImage {
                storage_key: format!("{}/temp-1/a.jpg", owner),
                cdn_url: format!("https://cdn.example.com/{}/temp-1/a.jpg", owner),
            },
            UploadedImage {
                storage_key: format!("{}/temp-1/b.jpg", owner),
                cdn_url: format!("https://cdn.example.com/{}/temp-1/b.jpg", owner),
            },
        ],
        ..Default::default()
    }
}

fn count(db: &Database, table: &str) -> i64 {
    let conn = db.get().unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .unwrap()
}

mod auth_integration_tests {
    use super::*;

    #[test]
    fn test_create_and_authenticate_user() {
        let db = create_test_db();
        let user_id = create_seller(&db, "lan");

        let user = auth::authenticate(&db, "lan", TEST_PASSWORD)
            .expect("Authentication error")
            .expect("User should be found");

        assert_eq!(user.id, user_id);
        assert_eq!(user.email, "lan@example.com");
        assert_eq!(user.name.as_deref(), Some("Cửa hàng Lan"));
        assert_eq!(user.plan, UserPlan::Free);
    }

    #[test]
    fn test_authenticate_wrong_password() {
        let db = create_test_db();
        create_seller(&db, "lan");

        let result = auth::authenticate(&db, "lan", WRONG_PASSWORD).unwrap();
        assert!(result.is_none());

        let result = auth::authenticate(&db, "nobody", TEST_PASSWORD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let db = create_test_db();
        create_seller(&db, "lan");
        assert!(auth::create_user(
            &db,
            "lan",
            "other@example.com",
            None,
            TEST_PASSWORD,
            UserPlan::Free
        )
        .is_err());
    }

    #[test]
    fn test_reserved_and_invalid_usernames() {
        let db = create_test_db();
        for username in ["api", "media", "Lan", "lan shop", ""] {
            assert!(
                auth::create_user(&db, username, "x@example.com", None, TEST_PASSWORD, UserPlan::Free)
                    .is_err(),
                "{:?} should be rejected",
                username
            );
        }
    }

    #[test]
    fn test_session_lifecycle() {
        let db = create_test_db();
        let user_id = create_seller(&db, "lan");

        let token = auth::create_session(&db, &user_id, 7).unwrap();
        let user = auth::validate_session(&db, &token).unwrap().unwrap();
        assert_eq!(user.username, "lan");

        assert!(auth::validate_session(&db, "bogus").unwrap().is_none());

        auth::delete_session(&db, &token).unwrap();
        assert!(auth::validate_session(&db, &token).unwrap().is_none());
    }

    #[test]
    fn test_expired_sessions_are_invalid_and_cleaned() {
        let db = create_test_db();
        let user_id = create_seller(&db, "lan");

        let token = auth::create_session(&db, &user_id, -1).unwrap();
        assert!(auth::validate_session(&db, &token).unwrap().is_none());
        assert_eq!(auth::cleanup_expired_sessions(&db).unwrap(), 1);
    }

    #[test]
    fn test_update_password() {
        let db = create_test_db();
        create_seller(&db, "lan");

        auth::update_password(&db, "lan", "NewPass456").unwrap();
        assert!(auth::authenticate(&db, "lan", TEST_PASSWORD).unwrap().is_none());
        assert!(auth::authenticate(&db, "lan", "NewPass456").unwrap().is_some());
        assert!(auth::update_password(&db, "ghost", "NewPass456").is_err());
    }
}

mod product_integration_tests {
    use super::*;

    /// Never reports a slug as taken, so only the table constraint can
    /// catch a duplicate.
    struct StaleRegistry<'a>(&'a Database);

    impl SlugRegistry for StaleRegistry<'_> {
        fn exists(&self, _slug: &str, _owner: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    impl BatchWriter for StaleRegistry<'_> {
        fn write_batch(&self, statements: &[WriteStatement]) -> Result<(), StoreError> {
            self.0.write_batch(statements)
        }

        fn purge_product(&self, product_id: &str) -> Result<(), StoreError> {
            self.0.purge_product(product_id)
        }
    }

    #[test]
    fn test_create_product_persists_rows() {
        let db = create_test_db();
        let owner = create_seller(&db, "lan");

        let product = create_product(
            &db,
            &owner,
            product_input(&owner, "Ví Da Nam Cao Cấp"),
            &CreateLimits::default(),
        )
        .unwrap();

        assert_eq!(product.slug, "vi-da-nam-cao-cap");
        assert_eq!(product.status, ProductStatus::Draft);

        let stored = catalog::get_product(&db, &owner, "vi-da-nam-cao-cap")
            .unwrap()
            .unwrap();
        assert_eq!(stored, product);

        let highlights = catalog::list_highlights(&db, &product.id).unwrap();
        let texts: Vec<(&str, i64)> = highlights
            .iter()
            .map(|h| (h.text.as_str(), h.display_order))
            .collect();
        assert_eq!(texts, vec![("Da thật", 0), ("Bảo hành 12 tháng", 1)]);

        let images = catalog::list_images(&db, &product.id).unwrap();
        assert_eq!(images.len(), 2);
        assert!(images.iter().all(|i| i.created_at == product.created_at));
        assert_eq!(images[1].storage_key, format!("{}/temp-1/b.jpg", owner));
    }

    #[test]
    fn test_slug_collision_uses_counter() {
        let db = create_test_db();
        let owner = create_seller(&db, "lan");
        let other = create_seller(&db, "minh");
        let limits = CreateLimits::default();

        let a = create_product(&db, &owner, product_input(&owner, "Shoes"), &limits).unwrap();
        let b = create_product(&db, &owner, product_input(&owner, "Shoes"), &limits).unwrap();
        let c = create_product(&db, &other, product_input(&other, "Shoes"), &limits).unwrap();

        assert_eq!(a.slug, "shoes");
        assert_eq!(b.slug, "shoes-2");
        assert_eq!(c.slug, "shoes");
    }

    #[test]
    fn test_unique_violation_is_retried() {
        let db = create_test_db();
        let owner = create_seller(&db, "lan");
        let store = StaleRegistry(&db);
        let limits = CreateLimits::default();

        let first = create_product(&store, &owner, product_input(&owner, "Shoes"), &limits).unwrap();
        let second = create_product(&store, &owner, product_input(&owner, "Shoes"), &limits).unwrap();

        assert_eq!(first.slug, "shoes");
        assert_eq!(second.slug, "shoes-2");
        assert_eq!(count(&db, "products"), 2);
        assert_eq!(count(&db, "product_highlights"), 4);
    }

    #[test]
    fn test_failed_write_leaves_no_rows() {
        let db = create_test_db();
        let owner = create_seller(&db, "lan");
        db.get()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_images BEFORE INSERT ON product_images
                 BEGIN SELECT RAISE(ABORT, 'image insert rejected'); END;",
            )
            .unwrap();

        let err = create_product(&db, &owner, product_input(&owner, "Shoes"), &CreateLimits::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dependency);

        assert!(!db.exists("shoes", &owner).unwrap());
        assert_eq!(count(&db, "products"), 0);
        assert_eq!(count(&db, "product_highlights"), 0);
        assert_eq!(count(&db, "product_images"), 0);
    }

    #[test]
    fn test_validation_errors_touch_nothing() {
        let db = create_test_db();
        let owner = create_seller(&db, "lan");

        let mut input = product_input(&owner, "Shoes");
        input.images.clear();
        let err = create_product(&db, &owner, input, &CreateLimits::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(count(&db, "products"), 0);
    }

    #[test]
    fn test_public_lookup_and_views() {
        let db = create_test_db();
        let owner = create_seller(&db, "lan");
        let limits = CreateLimits::default();

        let draft = create_product(&db, &owner, product_input(&owner, "Draft Bag"), &limits).unwrap();
        let mut input = product_input(&owner, "Túi Xách");
        input.status = Some(ProductStatus::Active);
        let active = create_product(&db, &owner, input, &limits).unwrap();

        assert!(catalog::get_public_product(&db, "lan", &draft.slug)
            .unwrap()
            .is_none());
        assert!(catalog::get_public_product(&db, "minh", &active.slug)
            .unwrap()
            .is_none());

        let page = catalog::get_public_product(&db, "lan", "tui-xach")
            .unwrap()
            .unwrap();
        assert_eq!(page.product.id, active.id);
        assert_eq!(page.user.username, "lan");
        assert_eq!(page.highlights.len(), 2);
        assert_eq!(page.images.len(), 2);

        catalog::record_view(&db, &active.id).unwrap();
        catalog::record_view(&db, &active.id).unwrap();

        let stats = catalog::owner_stats(&db, &owner).unwrap();
        assert_eq!(stats.total_products, 2);
        assert_eq!(stats.total_views, 2);

        let listed = catalog::list_products(&db, &owner).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, active.id);
    }

    #[test]
    fn test_lookup_errors_are_not_reported_as_missing() {
        let db = create_test_db();
        let owner = create_seller(&db, "lan");
        let mut input = product_input(&owner, "Shoes");
        input.status = Some(ProductStatus::Active);
        create_product(&db, &owner, input, &CreateLimits::default()).unwrap();

        db.get()
            .unwrap()
            .execute_batch("ALTER TABLE products RENAME COLUMN title TO name")
            .unwrap();

        assert!(catalog::get_product(&db, &owner, "shoes").is_err());
        assert!(catalog::get_public_product(&db, "lan", "shoes").is_err());
    }

    #[test]
    fn test_missing_rows_are_none() {
        let db = create_test_db();
        let owner = create_seller(&db, "lan");

        assert!(catalog::get_product(&db, &owner, "shoes").unwrap().is_none());
        assert!(catalog::get_public_product(&db, "lan", "shoes").unwrap().is_none());
        assert!(auth::get_user(&db, "no-such-id").unwrap().is_none());
    }

    #[test]
    fn test_deleting_user_removes_products() {
        let db = create_test_db();
        let owner = create_seller(&db, "lan");
        create_product(&db, &owner, product_input(&owner, "Shoes"), &CreateLimits::default()).unwrap();

        assert!(auth::delete_user(&db, "lan").unwrap());
        assert_eq!(count(&db, "products"), 0);
        assert_eq!(count(&db, "product_images"), 0);
    }
}

mod media_integration_tests {
    use showcase::services::media::{
        upload_images, LocalObjectStore, ObjectStore, UploadFile, UploadPolicy,
    };
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_local_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "https://cdn.example.com/media/");

        let uploaded = upload_images(
            &store,
            "user-1",
            Some("prod-1"),
            &[UploadFile {
                name: "wide.png".to_string(),
                content_type: "image/png".to_string(),
                data: png(1800, 900),
            }],
            &UploadPolicy::default(),
        )
        .unwrap();

        let image = &uploaded[0];
        assert_eq!(
            image.cdn_url,
            format!("https://cdn.example.com/media/{}", image.storage_key)
        );
        assert!(dir.path().join(&image.storage_key).is_file());

        let bytes = store.read(&image.storage_key).unwrap().unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 1600);

        store.delete(&image.storage_key).unwrap();
        assert!(store.read(&image.storage_key).unwrap().is_none());
    }

    #[test]
    fn test_local_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "https://cdn.example.com");
        assert!(store.put("../outside.jpg", b"x", "image/jpeg").is_err());
        assert!(store.read("/etc/passwd").is_err());
    }
}

mod http_integration_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use showcase::services::media::LocalObjectStore;
    use showcase::web::{build_router, AppState};
    use showcase::Config;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        db: Database,
        _media: tempfile::TempDir,
    }

    fn test_app() -> TestApp {
        let media = tempfile::tempdir().unwrap();
        let config: Config = toml::from_str(
            r#"
            [site]
            name = "Showcase"
            url = "http://localhost:3000"

            [database]
            path = "unused.db"

            [media]
            upload_dir = "unused"
            cdn_url = "http://localhost:3000/media"
            "#,
        )
        .unwrap();

        let db = create_test_db();
        let objects = Arc::new(LocalObjectStore::new(media.path(), &config.media.cdn_url));
        let state = AppState::new(config, db.clone(), objects, None).unwrap();

        TestApp {
            router: build_router(Arc::new(state)),
            db,
            _media: media,
        }
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec(), cookie)
    }

    fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    /// Signs up a seller and returns the session cookie and the user id.
    async fn register(app: &TestApp, username: &str) -> (String, String) {
        let (status, body, cookie) = send(
            app,
            json_request(
                "POST",
                "/api/auth/register",
                None,
                serde_json::json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": TEST_PASSWORD,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let id = json["data"]["id"].as_str().expect("user id").to_string();
        (cookie.expect("session cookie"), id)
    }

    fn product_body(owner: &str, title: &str, status: &str) -> serde_json::Value {
        serde_json::json!({
            "title": title,
            "price": "150000",
            "highlights": ["Cotton 100%", "  "],
            "contactMethod": "zalo",
            "contactValue": "0901 234 567",
            "images": [{
                "storageKey": format!("{}/temp-1/1.jpg", owner),
                "cdnUrl": format!("https://cdn.example.com/{}/temp-1/1.jpg", owner)
            }],
            "status": status
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body, _) = send(
            &app,
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_products_require_session() {
        let app = test_app();
        let (status, body, _) = send(
            &app,
            json_request("POST", "/api/products", None, product_body("nobody", "Áo", "active")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_register_twice_conflicts() {
        let app = test_app();
        register(&app, "lan").await;

        let (status, _, _) = send(
            &app,
            json_request(
                "POST",
                "/api/auth/register",
                None,
                serde_json::json!({
                    "username": "lan",
                    "email": "another@example.com",
                    "password": TEST_PASSWORD,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_create_and_view_product() {
        let app = test_app();
        let (cookie, user_id) = register(&app, "lan").await;

        let (status, body, _) = send(
            &app,
            json_request(
                "POST",
                "/api/products",
                Some(&cookie),
                product_body(&user_id, "Áo Thun Cao Cấp 2024", "active"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["slug"], "ao-thun-cao-cap-2024");
        assert_eq!(json["data"]["currency"], "VNĐ");
        assert_eq!(json["data"]["viewCount"], 0);

        let (status, body, _) = send(
            &app,
            Request::builder()
                .uri("/lan/ao-thun-cao-cap-2024")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("Áo Thun Cao Cấp 2024"));
        assert!(html.contains("150.000"));
        assert!(html.contains("zalo.me"));
        assert!(html.contains("0901234567"));
        assert!(html.contains("Nhắn Zalo"));

        let stats = catalog::owner_stats(
            &app.db,
            &auth::authenticate(&app.db, "lan", TEST_PASSWORD)
                .unwrap()
                .unwrap()
                .id,
        )
        .unwrap();
        assert_eq!(stats.total_views, 1);
    }

    #[tokio::test]
    async fn test_invalid_product_is_bad_request() {
        let app = test_app();
        let (cookie, user_id) = register(&app, "lan").await;

        let mut body = product_body(&user_id, "Shoes", "draft");
        body["images"] = serde_json::json!([]);
        let (status, _, _) = send(&app, json_request("POST", "/api/products", Some(&cookie), body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/api/products")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_images_of_another_seller_are_rejected() {
        let app = test_app();
        let (_, lan_id) = register(&app, "lan").await;
        let (cookie, _) = register(&app, "minh").await;

        let (status, body, _) = send(
            &app,
            json_request(
                "POST",
                "/api/products",
                Some(&cookie),
                product_body(&lan_id, "Shoes", "active"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(count(&app.db, "products"), 0);
    }

    #[tokio::test]
    async fn test_draft_products_are_not_public() {
        let app = test_app();
        let (cookie, user_id) = register(&app, "lan").await;
        send(
            &app,
            json_request("POST", "/api/products", Some(&cookie), product_body(&user_id, "Shoes", "draft")),
        )
        .await;

        let (status, _, _) = send(
            &app,
            Request::builder().uri("/lan/shoes").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_description_disabled_without_provider() {
        let app = test_app();
        let (cookie, _) = register(&app, "lan").await;

        let (status, _, _) = send(
            &app,
            json_request(
                "POST",
                "/api/generate-description",
                Some(&cookie),
                serde_json::json!({
                    "title": "Áo",
                    "price": "100000",
                    "currency": "VNĐ",
                    "highlights": ["Mát"]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_dashboard_lists_products() {
        let app = test_app();
        let (cookie, user_id) = register(&app, "lan").await;
        for title in ["Shoes", "Shoes"] {
            send(
                &app,
                json_request("POST", "/api/products", Some(&cookie), product_body(&user_id, title, "draft")),
            )
            .await;
        }

        let (status, body, _) = send(
            &app,
            Request::builder()
                .uri("/api/dashboard")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["stats"]["totalProducts"], 2);
        assert_eq!(json["data"]["publicBaseUrl"], "http://localhost:3000/lan");
        let slugs: Vec<&str> = json["data"]["products"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["slug"].as_str().unwrap())
            .collect();
        assert!(slugs.contains(&"shoes"));
        assert!(slugs.contains(&"shoes-2"));
        assert!(json["data"]["user"].get("passwordHash").is_none());
    }
}
