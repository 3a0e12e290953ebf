use std::env;
use std::time::Duration;

use http::Request;
use micro_http_client::connection::{ConnectionConfig, HttpConnection, TcpConnector};
use micro_http_client::protocol::body::RequestBody;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Fetches a path twice over one connection: `cargo run --example get -- 127.0.0.1 8080 /`
#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut args = env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args.next().and_then(|port| port.parse().ok()).unwrap_or(8080);
    let path = args.next().unwrap_or_else(|| "/".to_string());

    let config = ConnectionConfig::default().with_read_timeout(Duration::from_secs(10));
    let mut connection = HttpConnection::new(TcpConnector::new(host, port), config);

    for _ in 0..2 {
        let request = Request::get(path.as_str()).body(RequestBody::empty()).expect("valid request");
        if let Err(e) = connection.request(request).await {
            error!(cause = %e, "failed to send request");
            return;
        }

        let mut response = match connection.get_response().await {
            Ok(response) => response,
            Err(e) => {
                error!(cause = %e, "failed to receive response");
                return;
            }
        };

        let status = response.status();
        match response.read_to_end().await {
            Ok(body) => info!(%status, len = body.len(), body = %String::from_utf8_lossy(&body), "received response"),
            Err(e) => error!(%status, cause = %e, "failed to read response body"),
        }
    }

    connection.close().await;
}
