use bytes::Bytes;
use metersign_core::{Context, Result};
use metersign_http_send_reqwest::ReqwestHttpSend;
use reqwest::Client;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Create a custom reqwest client with specific configuration
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("metersign-example/1.0")
        .build()
        .expect("client must build");

    let ctx = Context::new().with_http_send(ReqwestHttpSend::new(client));

    let req = http::Request::builder()
        .method("GET")
        .uri("https://httpbin.org/get")
        .body(Bytes::new())
        .expect("request must build");

    match ctx.http_send(req).await {
        Ok(resp) => println!("Response status: {}", resp.status()),
        Err(e) => eprintln!("Request failed: {e}"),
    }

    // For providers whose certificate chain does not validate.
    let lenient_ctx = Context::new().with_http_send(ReqwestHttpSend::accepting_invalid_certs()?);

    let req = http::Request::builder()
        .method("GET")
        .uri("https://self-signed.badssl.com/")
        .body(Bytes::new())
        .expect("request must build");

    match lenient_ctx.http_send(req).await {
        Ok(resp) => println!("Lenient response status: {}", resp.status()),
        Err(e) => eprintln!("Lenient request failed: {e}"),
    }

    Ok(())
}
