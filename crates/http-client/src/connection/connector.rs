use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

/// Opens channels to one origin server.
///
/// The connection calls [`connect`](Connector::connect) whenever it needs a fresh channel:
/// lazily on the first request, after the previous channel was closed, and when a stale
/// keep-alive channel is replaced. [`host`](Connector::host) is the value of the `Host`
/// header sent with every request that does not carry its own.
#[trait_variant::make(Connector: Send)]
pub trait LocalConnector {
    type Io: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self) -> io::Result<Self::Io>;

    fn host(&self) -> &str;
}

/// Plain TCP connector.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    authority: String,
}

impl TcpConnector {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        let host = host.into();
        let authority = if port == 80 { host.clone() } else { format!("{host}:{port}") };
        Self { host, port, authority }
    }
}

impl Connector for TcpConnector {
    type Io = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;
        debug!(host = %self.host, port = self.port, "tcp stream connected");
        Ok(stream)
    }

    fn host(&self) -> &str {
        &self.authority
    }
}

#[cfg(test)]
mod tests {
    use super::{Connector, TcpConnector};

    #[test]
    fn host_omits_default_port() {
        assert_eq!(TcpConnector::new("example.com", 80).host(), "example.com");
        assert_eq!(TcpConnector::new("127.0.0.1", 8080).host(), "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = TcpConnector::new("127.0.0.1", port).connect().await;
        assert!(result.is_err());
    }
}
