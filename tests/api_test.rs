use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use campuspool::config::Config;
use campuspool::db;
use campuspool::routes;
use campuspool::state::{AppState, DbPool};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@rvce.edu.in";
const ADMIN_PASSWORD: &str = "admin-pass";

struct TestApp {
    _tmp: TempDir,
    router: Router,
    pool: DbPool,
}

impl TestApp {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.auth.bcrypt_cost = 4;
        config.admin.password = ADMIN_PASSWORD.to_string();

        let pool = db::create_pool(&tmp.path().join("test.db")).expect("create pool");
        db::run_migrations(&pool).expect("run migrations");
        db::seed_admin(&pool, &config).expect("seed admin");

        let router = routes::app(AppState::new(pool.clone(), config));
        Self {
            _tmp: tmp,
            router,
            pool,
        }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(token), Some(body)).await
    }

    async fn signup(&self, email: &str, role: &str) -> (String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({
                    "email": email,
                    "password": "secret123",
                    "name": email.split('@').next().unwrap(),
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "signup failed: {}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn admin_token(&self) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Signs up a driver and walks them through ID verification.
    async fn verified_driver(&self, email: &str, admin: &str) -> (String, String) {
        let (token, id) = self.signup(email, "driver").await;
        let (status, _) = self
            .post(
                "/api/verification/upload",
                &token,
                json!({ "student_id_image": "data:image/png;base64,AAAA" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = self
            .put(
                &format!("/api/verification/{}/action", id),
                admin,
                json!({ "action": "approve" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "approve failed: {}", body);
        (token, id)
    }

    async fn create_ride(&self, driver: &str, seats: i64) -> String {
        let (status, body) = self
            .post(
                "/api/rides",
                driver,
                json!({
                    "source": "RVCE Campus",
                    "destination": "Majestic",
                    "source_lat": 12.9237,
                    "source_lng": 77.4987,
                    "destination_lat": 12.9767,
                    "destination_lng": 77.5713,
                    "date": future_date(3),
                    "time": "17:30",
                    "available_seats": seats,
                    "estimated_cost": 300.0,
                    "pickup_point": "main_gate",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create ride failed: {}", body);
        body["ride"]["id"].as_str().unwrap().to_string()
    }

    async fn request_ride(&self, rider: &str, ride_id: &str) -> (StatusCode, Value) {
        self.post("/api/ride-requests", rider, json!({ "ride_id": ride_id }))
            .await
    }

    async fn audit_actions(&self, admin: &str) -> Vec<String> {
        let (status, logs) = self.get("/api/admin/audit-logs", admin).await;
        assert_eq!(status, StatusCode::OK);
        logs["logs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|log| log["action_type"].as_str().unwrap().to_string())
            .collect()
    }
}

fn future_date(days: i64) -> String {
    (Utc::now() + Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

/// Reads the start PIN of a request from the rider's own request list.
async fn rider_pin(app: &TestApp, rider: &str, request_id: &str) -> String {
    let (_, mine) = app.get("/api/ride-requests", rider).await;
    let request = mine["requests"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == request_id)
        .unwrap();
    let pin = request["ride_pin"].as_str().unwrap().to_string();
    assert_eq!(pin.len(), 4);
    pin
}

/// Drives a request from pending to ongoing and returns its id.
async fn accept_and_start(app: &TestApp, driver: &str, rider: &str, ride_id: &str) -> String {
    let (status, body) = app.request_ride(rider, ride_id).await;
    assert_eq!(status, StatusCode::OK, "request failed: {}", body);
    let request_id = body["request"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .put(
            &format!("/api/ride-requests/{}/action", request_id),
            driver,
            json!({ "action": "accept" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "accept failed: {}", body);

    let pin = rider_pin(app, rider, &request_id).await;

    let (status, body) = app
        .post(
            &format!("/api/ride-requests/{}/start", request_id),
            driver,
            json!({ "pin": pin }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "start failed: {}", body);
    assert_eq!(body["request"]["status"], "ongoing");

    request_id
}

#[tokio::test]
async fn health_reports_service() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "CampusPool API");
}

#[tokio::test]
async fn signup_enforces_campus_domain_and_unique_email() {
    let app = TestApp::new();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({
                "email": "someone@gmail.com",
                "password": "secret123",
                "name": "Someone",
                "role": "rider",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Only @rvce.edu.in emails are allowed");

    app.signup("asha@rvce.edu.in", "rider").await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({
                "email": "Asha@rvce.edu.in",
                "password": "secret123",
                "name": "Asha Again",
                "role": "rider",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email already registered");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({
                "email": "root@rvce.edu.in",
                "password": "secret123",
                "name": "Root",
                "role": "admin",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_and_me_round_trip() {
    let app = TestApp::new();
    app.signup("ravi@rvce.edu.in", "driver").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ravi@rvce.edu.in", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid email or password");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ravi@rvce.edu.in", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ravi@rvce.edu.in");
    assert_eq!(body["user"]["role"], "driver");
    assert_eq!(body["user"]["verification_status"], "unverified");
    assert_eq!(body["user"]["trust_level"]["level"], "new_user");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Not authenticated");

    let (status, _) = app.get("/api/auth/me", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_switches_role_and_vehicle() {
    let app = TestApp::new();
    let (token, _) = app.signup("meera@rvce.edu.in", "rider").await;

    let (status, body) = app
        .put(
            "/api/profile",
            &token,
            json!({
                "role": "driver",
                "vehicle_model": "Activa",
                "vehicle_number": "KA01AB1234",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Profile updated");
    assert_eq!(body["user"]["role"], "driver");
    assert_eq!(body["user"]["vehicle_model"], "Activa");

    let (_, body) = app.put("/api/profile", &token, json!({})).await;
    assert_eq!(body["message"], "No changes made");

    let (status, _) = app.put("/api/profile", &token, json!({ "role": "admin" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unverified_drivers_and_riders_cannot_post_rides() {
    let app = TestApp::new();
    let (driver, _) = app.signup("dev@rvce.edu.in", "driver").await;
    let (rider, _) = app.signup("riya@rvce.edu.in", "rider").await;

    let ride = json!({
        "source": "RVCE",
        "destination": "Kengeri",
        "date": future_date(1),
        "time": "08:00",
        "available_seats": 2,
        "estimated_cost": 100.0,
    });

    let (status, body) = app.post("/api/rides", &driver, ride.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["detail"].as_str().unwrap().contains("verified"));

    let (status, body) = app.post("/api/rides", &rider, ride).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Only drivers can post rides");
}

#[tokio::test]
async fn ride_creation_validates_input() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, _) = app.verified_driver("dan@rvce.edu.in", &admin).await;

    let base = json!({
        "source": "RVCE",
        "destination": "Kengeri",
        "date": future_date(1),
        "time": "08:00",
        "available_seats": 2,
        "estimated_cost": 100.0,
    });

    let mut bad_pickup = base.clone();
    bad_pickup["pickup_point"] = json!("rooftop");
    let (status, body) = app.post("/api/rides", &driver, bad_pickup).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid pickup point");

    let mut bad_seats = base.clone();
    bad_seats["available_seats"] = json!(0);
    let (status, _) = app.post("/api/rides", &driver, bad_seats).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut bad_date = base.clone();
    bad_date["date"] = json!("tomorrow");
    let (status, _) = app.post("/api/rides", &driver, bad_date).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut missing_pattern = base;
    missing_pattern["is_recurring"] = json!(true);
    missing_pattern["recurrence_days_ahead"] = json!(7);
    let (status, _) = app.post("/api/rides", &driver, missing_pattern).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recurring_ride_creates_daily_instances() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, _) = app.verified_driver("rec@rvce.edu.in", &admin).await;

    let (status, body) = app
        .post(
            "/api/rides",
            &driver,
            json!({
                "source": "RVCE",
                "destination": "Banashankari",
                "date": future_date(1),
                "time": "09:00",
                "available_seats": 3,
                "estimated_cost": 90.0,
                "is_recurring": true,
                "recurrence_pattern": "daily",
                "recurrence_days_ahead": 5,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["recurring_rides_created"], 5);
    assert_eq!(body["ride"]["is_recurring"], true);

    let (_, mine) = app.get("/api/rides/my-rides", &driver).await;
    assert_eq!(mine["rides"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn list_rides_filters_by_destination_and_pickup_point() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, _) = app.verified_driver("list@rvce.edu.in", &admin).await;
    let (rider, _) = app.signup("lena@rvce.edu.in", "rider").await;

    app.create_ride(&driver, 3).await;
    let (status, _) = app
        .post(
            "/api/rides",
            &driver,
            json!({
                "source": "RVCE",
                "destination": "Jayanagar",
                "date": future_date(2),
                "time": "10:00",
                "available_seats": 1,
                "estimated_cost": 150.0,
                "pickup_point": "library",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, all) = app.get("/api/rides", &rider).await;
    assert_eq!(all["rides"].as_array().unwrap().len(), 2);

    let (_, filtered) = app.get("/api/rides?destination=majes", &rider).await;
    let rides = filtered["rides"].as_array().unwrap();
    assert_eq!(rides.len(), 1);
    assert_eq!(rides[0]["destination"], "Majestic");
    assert_eq!(rides[0]["pickup_point_name"], "Main Gate");

    let (_, filtered) = app.get("/api/rides?pickup_point=library", &rider).await;
    assert_eq!(filtered["rides"][0]["destination"], "Jayanagar");

    let (_, filtered) = app.get("/api/rides?destination=%25", &rider).await;
    assert!(filtered["rides"].as_array().unwrap().is_empty());
    let (_, filtered) = app.get("/api/rides?destination=_", &rider).await;
    assert!(filtered["rides"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn full_ride_lifecycle_with_pin_and_rating() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, driver_id) = app.verified_driver("drive@rvce.edu.in", &admin).await;
    let (rider, rider_id) = app.signup("ride@rvce.edu.in", "rider").await;

    let ride_id = app.create_ride(&driver, 2).await;

    let (status, body) = app.request_ride(&rider, &ride_id).await;
    assert_eq!(status, StatusCode::OK);
    let request_id = body["request"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["request"]["status"], "pending");
    assert!(body["request"]["ride_pin"].is_null());

    let (status, body) = app.request_ride(&rider, &ride_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "You have already requested this ride");

    let (_, incoming) = app.get("/api/ride-requests/driver", &driver).await;
    assert_eq!(incoming["requests"][0]["rider_id"], rider_id.as_str());

    let (status, body) = app
        .put(
            &format!("/api/ride-requests/{}/action", request_id),
            &driver,
            json!({ "action": "accept" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["status"], "accepted");
    assert!(body["request"]["ride_pin"].is_null());

    let (_, incoming) = app.get("/api/ride-requests/driver", &driver).await;
    assert_eq!(incoming["requests"][0]["status"], "accepted");
    assert!(incoming["requests"][0]["ride_pin"].is_null());

    let (status, live) = app
        .get(&format!("/api/ride-requests/{}/live", request_id), &driver)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(live["ride"]["ride_pin"].is_null());

    let pin = rider_pin(&app, &rider, &request_id).await;

    let (_, ride) = app.get(&format!("/api/rides/{}", ride_id), &rider).await;
    assert_eq!(ride["ride"]["seats_taken"], 1);
    assert_eq!(ride["ride"]["seats_available"], 1);
    assert_eq!(ride["ride"]["cost_per_rider"], 150.0);

    let wrong_pin = if pin == "0000" { "1111" } else { "0000" };
    let (status, body) = app
        .post(
            &format!("/api/ride-requests/{}/start", request_id),
            &driver,
            json!({ "pin": wrong_pin }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid PIN");

    let (status, body) = app
        .post(
            &format!("/api/ride-requests/{}/start", request_id),
            &driver,
            json!({ "pin": pin }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["status"], "ongoing");
    assert!(body["request"]["estimated_arrival"].is_string());

    let (_, ride) = app.get(&format!("/api/rides/{}", ride_id), &rider).await;
    assert_eq!(ride["ride"]["status"], "in_progress");

    let (status, live) = app
        .get(&format!("/api/ride-requests/{}/live", request_id), &rider)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(live["ride"]["has_active_sos"], false);

    let (status, _) = app
        .post("/api/ratings", &rider, json!({ "ride_request_id": request_id, "rating": 5 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            &format!("/api/ride-requests/{}/reached-safely", request_id),
            &driver,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            &format!("/api/ride-requests/{}/reached-safely", request_id),
            &rider,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["status"], "completed");

    let (_, ride) = app.get(&format!("/api/rides/{}", ride_id), &rider).await;
    assert_eq!(ride["ride"]["status"], "completed");

    let (_, can) = app
        .get(&format!("/api/ratings/can-rate/{}", request_id), &rider)
        .await;
    assert_eq!(can["can_rate"], true);
    assert_eq!(can["rated_role"], "driver");

    let (status, _) = app
        .post(
            "/api/ratings",
            &rider,
            json!({ "ride_request_id": request_id, "rating": 4, "feedback": "Smooth ride" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post("/api/ratings", &rider, json!({ "ride_request_id": request_id, "rating": 5 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "You have already rated this ride");

    let (_, can) = app
        .get(&format!("/api/ratings/can-rate/{}", request_id), &rider)
        .await;
    assert_eq!(can["can_rate"], false);
    assert_eq!(can["reason"], "Already rated");

    let (_, profile) = app
        .get(&format!("/api/users/{}/profile", driver_id), &rider)
        .await;
    assert_eq!(profile["profile"]["average_rating"], 4.0);
    assert_eq!(profile["profile"]["total_ratings"], 1);
    assert_eq!(profile["profile"]["ride_count"], 1);

    let (_, stats) = app.get("/api/users/stats", &rider).await;
    assert_eq!(stats["stats"]["rides_taken"], 1);
    assert!(stats["stats"]["total_distance_km"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn ride_stays_open_until_every_accepted_rider_arrives() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, _) = app.verified_driver("pool@rvce.edu.in", &admin).await;
    let (first, _) = app.signup("first@rvce.edu.in", "rider").await;
    let (second, _) = app.signup("second@rvce.edu.in", "rider").await;

    let ride_id = app.create_ride(&driver, 2).await;
    let (_, body) = app.request_ride(&second, &ride_id).await;
    let second_request = body["request"]["id"].as_str().unwrap().to_string();
    let (status, _) = app
        .put(
            &format!("/api/ride-requests/{}/action", second_request),
            &driver,
            json!({ "action": "accept" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let first_request = accept_and_start(&app, &driver, &first, &ride_id).await;
    let (status, _) = app
        .post(
            &format!("/api/ride-requests/{}/reached-safely", first_request),
            &first,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, ride) = app.get(&format!("/api/rides/{}", ride_id), &driver).await;
    assert_eq!(ride["ride"]["status"], "in_progress");
    let (_, mine) = app.get("/api/ride-requests", &second).await;
    assert_eq!(mine["requests"][0]["status"], "accepted");

    let pin = rider_pin(&app, &second, &second_request).await;
    let (status, body) = app
        .post(
            &format!("/api/ride-requests/{}/start", second_request),
            &driver,
            json!({ "pin": pin }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["request"]["status"], "ongoing");

    let (status, _) = app
        .post(
            &format!("/api/ride-requests/{}/reached-safely", second_request),
            &second,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, ride) = app.get(&format!("/api/rides/{}", ride_id), &driver).await;
    assert_eq!(ride["ride"]["status"], "completed");
}

#[tokio::test]
async fn start_is_rejected_once_the_ride_is_closed() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, _) = app.verified_driver("late@rvce.edu.in", &admin).await;
    let (rider, _) = app.signup("waiting@rvce.edu.in", "rider").await;

    let ride_id = app.create_ride(&driver, 2).await;
    let (_, body) = app.request_ride(&rider, &ride_id).await;
    let request_id = body["request"]["id"].as_str().unwrap().to_string();
    app.put(
        &format!("/api/ride-requests/{}/action", request_id),
        &driver,
        json!({ "action": "accept" }),
    )
    .await;
    let pin = rider_pin(&app, &rider, &request_id).await;

    let ride_key: i64 = ride_id.parse().unwrap();
    app.pool
        .get()
        .unwrap()
        .execute(
            "UPDATE rides SET status = 'completed' WHERE id = ?1",
            [ride_key],
        )
        .unwrap();

    let (status, body) = app
        .post(
            &format!("/api/ride-requests/{}/start", request_id),
            &driver,
            json!({ "pin": pin }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "This ride is no longer active");

    let (_, mine) = app.get("/api/ride-requests", &rider).await;
    assert_eq!(mine["requests"][0]["status"], "accepted");
}

#[tokio::test]
async fn accepting_beyond_capacity_is_rejected() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, _) = app.verified_driver("cap@rvce.edu.in", &admin).await;
    let (first, _) = app.signup("first@rvce.edu.in", "rider").await;
    let (second, _) = app.signup("second@rvce.edu.in", "rider").await;

    let ride_id = app.create_ride(&driver, 1).await;

    let (_, a) = app.request_ride(&first, &ride_id).await;
    let (_, b) = app.request_ride(&second, &ride_id).await;
    let a = a["request"]["id"].as_str().unwrap().to_string();
    let b = b["request"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .put(
            &format!("/api/ride-requests/{}/action", a),
            &driver,
            json!({ "action": "accept" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .put(
            &format!("/api/ride-requests/{}/action", b),
            &driver,
            json!({ "action": "accept" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "No seats available");

    let (third, _) = app.signup("third@rvce.edu.in", "rider").await;
    let (status, body) = app.request_ride(&third, &ride_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "No seats available");

    let (status, body) = app
        .put(
            &format!("/api/ride-requests/{}/action", b),
            &driver,
            json!({ "action": "reject" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["status"], "rejected");

    let (status, _) = app
        .put(
            &format!("/api/ride-requests/{}/action", b),
            &driver,
            json!({ "action": "accept" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn urgent_requests_need_an_imminent_departure() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, _) = app.verified_driver("urg@rvce.edu.in", &admin).await;
    let (rider, _) = app.signup("hurry@rvce.edu.in", "rider").await;

    let ride_id = app.create_ride(&driver, 2).await;
    let (status, body) = app
        .post(
            "/api/ride-requests",
            &rider,
            json!({ "ride_id": ride_id, "is_urgent": true }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("60 minutes"));
}

#[tokio::test]
async fn cancelling_a_ride_cascades_to_requests() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, _) = app.verified_driver("canc@rvce.edu.in", &admin).await;
    let (other_driver, _) = app.verified_driver("other@rvce.edu.in", &admin).await;
    let (rider, _) = app.signup("pax@rvce.edu.in", "rider").await;

    let ride_id = app.create_ride(&driver, 2).await;
    let (_, body) = app.request_ride(&rider, &ride_id).await;
    assert_eq!(body["request"]["status"], "pending");

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/rides/{}", ride_id),
            Some(other_driver.as_str()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/rides/{}", ride_id), Some(driver.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, mine) = app.get("/api/ride-requests", &rider).await;
    assert_eq!(mine["requests"][0]["status"], "cancelled");

    let (_, ride) = app.get(&format!("/api/rides/{}", ride_id), &rider).await;
    assert_eq!(ride["ride"]["status"], "cancelled");

    let (status, _) = app
        .put(
            &format!("/api/rides/{}", ride_id),
            &driver,
            json!({ "available_seats": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ride_update_keeps_seats_above_occupied() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, _) = app.verified_driver("upd@rvce.edu.in", &admin).await;
    let (a, _) = app.signup("ua@rvce.edu.in", "rider").await;
    let (b, _) = app.signup("ub@rvce.edu.in", "rider").await;

    let ride_id = app.create_ride(&driver, 3).await;
    for rider in [&a, &b] {
        let (_, body) = app.request_ride(rider, &ride_id).await;
        let id = body["request"]["id"].as_str().unwrap().to_string();
        app.put(
            &format!("/api/ride-requests/{}/action", id),
            &driver,
            json!({ "action": "accept" }),
        )
        .await;
    }

    let (status, _) = app
        .put(
            &format!("/api/rides/{}", ride_id),
            &driver,
            json!({ "available_seats": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .put(
            &format!("/api/rides/{}", ride_id),
            &driver,
            json!({ "available_seats": 2, "time": "18:15" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ride"]["available_seats"], 2);
    assert_eq!(body["ride"]["time"], "18:15");
    assert_eq!(body["ride"]["seats_available"], 0);
}

#[tokio::test]
async fn chat_is_only_open_while_the_ride_is_live() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, _) = app.verified_driver("chatd@rvce.edu.in", &admin).await;
    let (rider, _) = app.signup("chatr@rvce.edu.in", "rider").await;
    let (stranger, _) = app.signup("nosy@rvce.edu.in", "rider").await;

    let ride_id = app.create_ride(&driver, 2).await;
    let (_, body) = app.request_ride(&rider, &ride_id).await;
    let request_id = body["request"]["id"].as_str().unwrap().to_string();
    let messages = format!("/api/chat/{}/messages", request_id);

    let (status, body) = app.post(&messages, &rider, json!({ "message": "Hi!" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    app.put(
        &format!("/api/ride-requests/{}/action", request_id),
        &driver,
        json!({ "action": "accept" }),
    )
    .await;

    let (status, body) = app
        .post(&messages, &rider, json!({ "message": "Waiting at the main gate" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chat_message"]["sender_role"], "rider");

    let (status, _) = app.post(&messages, &driver, json!({ "message": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get(&messages, &driver).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chat_enabled"], true);
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["messages"][0]["message"], "Waiting at the main gate");

    let (status, _) = app.get(&messages, &stranger).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn sos_alerts_flow_to_admin_review() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, _) = app.verified_driver("sosd@rvce.edu.in", &admin).await;
    let (rider, _) = app.signup("sosr@rvce.edu.in", "rider").await;

    let ride_id = app.create_ride(&driver, 2).await;
    let request_id = accept_and_start(&app, &driver, &rider, &ride_id).await;

    let (status, body) = app
        .post(
            "/api/sos",
            &rider,
            json!({
                "ride_request_id": request_id,
                "latitude": 12.95,
                "longitude": 77.52,
                "message": "Driver took a detour",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["sos"]["status"], "active");
    assert_eq!(body["sos"]["triggered_by_role"], "rider");
    let sos_id = body["sos"]["id"].as_str().unwrap().to_string();

    let (_, live) = app
        .get(&format!("/api/ride-requests/{}/live", request_id), &driver)
        .await;
    assert_eq!(live["ride"]["has_active_sos"], true);

    let (status, _) = app.get("/api/sos", &rider).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, events) = app.get("/api/sos", &admin).await;
    assert_eq!(events["sos_events"].as_array().unwrap().len(), 1);

    let (_, stats) = app.get("/api/admin/stats", &admin).await;
    assert_eq!(stats["active_sos"], 1);

    let (status, body) = app
        .put(
            &format!("/api/sos/{}/action", sos_id),
            &admin,
            json!({ "action": "review", "notes": "Calling the rider" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sos"]["status"], "reviewing");

    let (status, body) = app
        .put(
            &format!("/api/sos/{}/action", sos_id),
            &admin,
            json!({ "action": "resolve", "notes": "Called the rider" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sos"]["status"], "resolved");
    assert!(body["sos"]["resolved_at"].is_string());

    let (status, _) = app
        .put(
            &format!("/api/sos/{}/action", sos_id),
            &admin,
            json!({ "action": "review" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let actions = app.audit_actions(&admin).await;
    assert_eq!(actions.iter().filter(|a| *a == "sos_review").count(), 1);
    assert_eq!(actions.iter().filter(|a| *a == "sos_resolve").count(), 1);
}

#[tokio::test]
async fn verification_reject_records_reason() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, id) = app.signup("blurry@rvce.edu.in", "driver").await;

    app.post(
        "/api/verification/upload",
        &driver,
        json!({ "student_id_image": "data:image/png;base64,AAAA" }),
    )
    .await;

    let (status, _) = app.get("/api/verification/pending", &driver).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, pending) = app.get("/api/verification/pending", &admin).await;
    assert_eq!(pending["users"][0]["id"], id.as_str());
    assert_eq!(pending["users"][0]["verification_status"], "pending");

    let (status, body) = app
        .put(
            &format!("/api/verification/{}/action", id),
            &admin,
            json!({ "action": "reject", "reason": "Image unreadable" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["verification_status"], "rejected");
    assert_eq!(body["user"]["rejection_reason"], "Image unreadable");

    let (status, _) = app
        .put(
            "/api/verification/999999/action",
            &admin,
            json!({ "action": "approve" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let actions = app.audit_actions(&admin).await;
    assert!(actions.contains(&"verification_reject".to_string()));
    assert!(!actions.contains(&"verification_approve".to_string()));
}

#[tokio::test]
async fn reports_lead_to_admin_penalties() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (driver, driver_id) = app.verified_driver("bad@rvce.edu.in", &admin).await;
    let (rider, rider_id) = app.signup("reporter@rvce.edu.in", "rider").await;

    let (status, _) = app
        .post(
            "/api/reports",
            &rider,
            json!({
                "reported_user_id": rider_id,
                "category": "behavior",
                "description": "Reporting myself for testing",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/reports",
            &rider,
            json!({
                "reported_user_id": driver_id,
                "category": "safety",
                "description": "Driving far too fast near campus",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let report_id = body["report_id"].as_str().unwrap().to_string();

    let (status, _) = app.get("/api/reports", &rider).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, stats) = app.get("/api/admin/stats", &admin).await;
    assert_eq!(stats["pending_reports"], 1);

    let (status, body) = app
        .put(
            &format!("/api/reports/{}/action", report_id),
            &admin,
            json!({ "action": "suspend", "admin_notes": "Second complaint" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, _) = app
        .put(
            &format!("/api/reports/{}/action", report_id),
            &admin,
            json!({ "action": "warn" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, me) = app.get("/api/auth/me", &driver).await;
    assert_eq!(me["user"]["is_suspended"], true);

    let (status, body) = app
        .post(
            "/api/rides",
            &driver,
            json!({
                "source": "RVCE",
                "destination": "Kengeri",
                "date": future_date(1),
                "time": "08:00",
                "available_seats": 2,
                "estimated_cost": 100.0,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["detail"].as_str().unwrap().contains("suspended"));
}

#[tokio::test]
async fn disabled_accounts_are_locked_out() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (rider, rider_id) = app.signup("gone@rvce.edu.in", "rider").await;

    let (status, _) = app
        .put(
            &format!("/api/admin/users/{}/status", rider_id),
            &rider,
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(
            &format!("/api/admin/users/{}/status", rider_id),
            &admin,
            json!({ "is_active": false, "reason": "Repeated no-shows" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["is_active"], false);
    assert!(app
        .audit_actions(&admin)
        .await
        .contains(&"user_disabled".to_string()));

    let (status, _) = app.get("/api/auth/me", &rider).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "gone@rvce.edu.in", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let conn = app.pool.get().unwrap();
    let admin_id: i64 = conn
        .query_row("SELECT id FROM users WHERE is_admin = 1", [], |row| row.get(0))
        .unwrap();
    let (status, body) = app
        .put(
            &format!("/api/admin/users/{}/status", admin_id),
            &admin,
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "You cannot disable your own account");
}

#[tokio::test]
async fn catalog_and_event_tags() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let (rider, _) = app.signup("cat@rvce.edu.in", "rider").await;

    let (_, points) = app.get("/api/pickup-points", &rider).await;
    assert!(points["pickup_points"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["id"] == "main_gate"));

    let (_, patterns) = app.get("/api/recurrence-patterns", &rider).await;
    assert_eq!(patterns["patterns"].as_array().unwrap().len(), 5);

    let (_, branches) = app.get("/api/branches", &rider).await;
    assert!(!branches["branches"].as_array().unwrap().is_empty());

    let (_, years) = app.get("/api/academic-years", &rider).await;
    assert!(!years["years"].as_array().unwrap().is_empty());

    let (status, _) = app
        .post("/api/event-tags", &rider, json!({ "name": "Fest Night" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            "/api/event-tags",
            &admin,
            json!({ "name": "Fest Night", "description": "Annual cultural fest" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, tags) = app.get("/api/event-tags", &rider).await;
    assert_eq!(tags["tags"][0]["name"], "Fest Night");
}

#[tokio::test]
async fn community_profile_reports_mutual_info() {
    let app = TestApp::new();
    let (a, _) = app.signup("alpha@rvce.edu.in", "rider").await;
    let (_, b_id) = app.signup("beta@rvce.edu.in", "driver").await;

    let (status, _) = app
        .put("/api/users/profile/community", &a, json!({ "branch": "underwater" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, branches) = app.get("/api/branches", &a).await;
    let branch = branches["branches"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .put("/api/users/profile/community", &a, json!({ "branch": branch }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["branch"], branch.as_str());

    {
        let conn = app.pool.get().unwrap();
        conn.execute(
            "UPDATE users SET branch = ?1 WHERE id = ?2",
            rusqlite::params![branch, b_id.parse::<i64>().unwrap()],
        )
        .unwrap();
    }

    let (status, body) = app.get(&format!("/api/users/{}/profile", b_id), &a).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["mutual_info"]["same_branch"], true);
    assert_eq!(body["profile"]["mutual_info"]["same_year"], false);

    let (status, _) = app.get("/api/users/999999/profile", &a).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
