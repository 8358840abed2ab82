use axum_test::TestServer;
use serde_json::json;
use uuid::Uuid;

/// A registered and logged-in user.
pub struct TestUser {
    pub email: String,
    pub password: String,
    pub user_id: Uuid,
    pub token: String,
}

impl TestUser {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

pub const TEST_PASSWORD: &str = "TestPassword123!";

/// Register through the API, then log in to obtain a token.
pub async fn register_test_user(client: &TestServer, email: Option<&str>) -> TestUser {
    let email = email.unwrap_or("test@example.com").to_string();

    let response = client
        .post("/auth/register")
        .json(&json!({
            "email": email,
            "password": TEST_PASSWORD,
            "firstName": "Test",
            "lastName": "User",
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    login(client, &email, TEST_PASSWORD).await
}

pub async fn login(client: &TestServer, email: &str, password: &str) -> TestUser {
    let response = client
        .post("/auth/login")
        .json(&json!({ "email": email, "password": password }))
        .await;
    response.assert_status_ok();

    let body = response.json::<serde_json::Value>();
    TestUser {
        email: email.to_string(),
        password: password.to_string(),
        user_id: body["userId"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("login response carries userId"),
        token: body["token"]
            .as_str()
            .expect("login response carries token")
            .to_string(),
    }
}
