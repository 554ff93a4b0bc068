use std::sync::Arc;

use api_client_http::{ApiClient, RequestSpec, RetryConfig, TracingSink};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let base_url = std::env::var("API_CLIENT_BASE_URL")?;
    let token = std::env::var("API_CLIENT_TOKEN")?;

    let api = ApiClient::new(base_url)
        .with_header("Authorization", &format!("Bearer {token}"))?
        .with_logger(Arc::new(TracingSink::new("demo")));

    let created = api
        .call_json("post", "/users", &json!({"name": "Kit"}), [("X-Request-Source", "demo")])
        .await;
    println!("{}", serde_json::to_string_pretty(&created)?);

    let listed = api
        .execute(
            RequestSpec::get("/users").query("limit", "10"),
            RetryConfig {
                max_retries: 2,
                base_delay_ms: 500,
            },
        )
        .await;

    match (listed.is_success(), listed.http_code) {
        (true, Some(code)) if code < 400 => println!("users: {:?}", listed.json()),
        (true, code) => eprintln!("request answered with status {code:?}"),
        (false, _) => eprintln!("request failed: {:?}", listed.error),
    }

    Ok(())
}
