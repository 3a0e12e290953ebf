use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Tunables of an [`HttpConnection`](super::HttpConnection).
///
/// ```
/// use std::time::Duration;
/// use micro_http_client::connection::ConnectionConfig;
///
/// let config = ConnectionConfig::default().with_read_timeout(Duration::from_secs(5)).with_retry_stale_connection(false);
/// assert_eq!(config.read_timeout(), Duration::from_secs(5));
/// assert!(!config.retry_stale_connection());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    connect_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    read_buffer_size: usize,
    retry_stale_connection: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            retry_stale_connection: true,
        }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bounds each read from the channel, not the whole response.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Bounds each flush of request bytes to the channel.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Whether a request that failed on a reused, silently closed channel is sent again once
    /// over a fresh channel.
    #[must_use]
    pub fn with_retry_stale_connection(mut self, retry: bool) -> Self {
        self.retry_stale_connection = retry;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    pub fn retry_stale_connection(&self) -> bool {
        self.retry_stale_connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.read_timeout(), Duration::from_secs(60));
        assert_eq!(config.write_timeout(), Duration::from_secs(60));
        assert_eq!(config.read_buffer_size(), 8192);
        assert!(config.retry_stale_connection());
    }

    #[test]
    fn zero_buffer_size_is_clamped() {
        let config = ConnectionConfig::default().with_read_buffer_size(0);
        assert_eq!(config.read_buffer_size(), 1);
    }
}
