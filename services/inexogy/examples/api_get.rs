//! Fetch one endpoint and print the JSON response.
//!
//! ```bash
//! cargo run --example api_get -- user@example.com password meters
//! cargo run --example api_get -- user@example.com password readings \
//!     meterId=c0ffee1234 resolution=raw from=1634700000000
//! ```

use metersign_core::{Context, OsEnv, Result};
use metersign_http_send_reqwest::ReqwestHttpSend;
use metersign_inexogy::{Client, Config};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [email, password, endpoint, rest @ ..] = args.as_slice() else {
        eprintln!("usage: api_get <email> <password> <endpoint> [key=value ...]");
        std::process::exit(2);
    };

    let params: Vec<(String, String)> = rest
        .iter()
        .filter_map(|arg| arg.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let params: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let ctx = Context::new().with_env(OsEnv);

    let config = Config {
        client: Some("metersign-api-get".to_string()),
        email: Some(email.clone()),
        password: Some(password.clone()),
        ttl: 86_400,
        ..Default::default()
    }
    .from_env(&ctx);

    let http = if config.accept_invalid_certs {
        ReqwestHttpSend::accepting_invalid_certs()?
    } else {
        ReqwestHttpSend::default()
    };
    let ctx = ctx.with_http_send(http);

    let client = Client::new(config, ctx)?;
    let value = client.get_path(endpoint, &params).await?;
    println!("{value}");

    Ok(())
}
