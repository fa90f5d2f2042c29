#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;

use pairauth::auth::{PasswordHasher, TokenCodec, TokenPair};
use pairauth::configuration::JwtSettings;
use pairauth::startup::{build_services, run};
use pairauth::store::InMemoryUserStore;
use serde_json::{json, Value};

pub const TEST_SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    /// Same signing key as the server, for minting tokens the API never would
    pub codec: TokenCodec,
}

pub async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let jwt_config = JwtSettings::new(TEST_SECRET);
    // Minimum bcrypt cost keeps the suite fast.
    let hasher = PasswordHasher::with_cost(4).expect("Failed to build hasher");
    let services = build_services(Arc::new(InMemoryUserStore::new()), &jwt_config, hasher)
        .expect("Failed to build services");
    let codec = services.codec.clone();

    let server = run(listener, services).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        client: reqwest::Client::new(),
        codec,
    }
}

impl TestApp {
    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn sign_up(&self, username: &str, password: &str) -> reqwest::Response {
        self.post_json("/signUp", &json!({ "username": username, "password": password }))
            .await
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.post_json("/login", &json!({ "username": username, "password": password }))
            .await
    }

    pub async fn refresh(&self, pair: &TokenPair) -> reqwest::Response {
        self.post_json(
            "/refresh",
            &json!({ "accessToken": pair.access_token, "refreshToken": pair.refresh_token }),
        )
        .await
    }

    pub async fn get_me(&self, authorization: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(&format!("{}/api/me", &self.address));
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        request.send().await.expect("Failed to execute request.")
    }

    /// Sign up and log in, returning the user id and the first token pair
    pub async fn register_and_login(&self, username: &str, password: &str) -> (String, TokenPair) {
        let response = self.sign_up(username, password).await;
        assert_eq!(201, response.status().as_u16());
        let body: Value = response.json().await.expect("Failed to parse response");
        let id = body["id"].as_str().expect("id missing").to_string();

        let response = self.login(username, password).await;
        assert_eq!(200, response.status().as_u16());
        let pair: TokenPair = response.json().await.expect("Failed to parse token pair");

        (id, pair)
    }
}

pub async fn error_code(response: reqwest::Response) -> String {
    let body: Value = response.json().await.expect("Failed to parse error body");
    body["code"].as_str().unwrap_or_default().to_string()
}
