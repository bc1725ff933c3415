use std::path::PathBuf;
use std::time::Duration;

/// Control-plane configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Unix socket the listener binds (default: `/tmp/oneadif-uploads.sock`).
    pub socket_path: PathBuf,
    /// Directory of status artifacts (default: `./uploads`).
    pub status_dir: PathBuf,
    /// PostgreSQL URL. Unset means an in-memory record store.
    pub database_url: Option<String>,
    /// Worker executable (default: `oneadif-worker` next to this binary).
    pub worker_bin: PathBuf,
    /// Longest wait in `accept` before shutdown is re-checked (default: `250`).
    pub accept_poll_ms: u64,
    /// Time a caller has to send its request (default: `10`).
    pub request_timeout_secs: u64,
    /// Time shutdown waits for active jobs (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Largest accepted request line (default: 64 MiB).
    pub max_request_bytes: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/oneadif-uploads.sock"),
            status_dir: PathBuf::from("./uploads"),
            database_url: None,
            worker_bin: default_worker_bin(),
            accept_poll_ms: 250,
            request_timeout_secs: 10,
            shutdown_timeout_secs: 30,
            max_request_bytes: 64 * 1024 * 1024,
        }
    }
}

impl ControlConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                      |
    /// |-------------------------|------------------------------|
    /// | `CONTROL_SOCKET`        | `/tmp/oneadif-uploads.sock`  |
    /// | `STATUS_DIR`            | `./uploads`                  |
    /// | `DATABASE_URL`          | unset (in-memory store)      |
    /// | `WORKER_BIN`            | sibling `oneadif-worker`     |
    /// | `ACCEPT_POLL_MS`        | `250`                        |
    /// | `REQUEST_TIMEOUT_SECS`  | `10`                         |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                         |
    /// | `MAX_REQUEST_BYTES`     | `67108864`                   |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let socket_path = std::env::var("CONTROL_SOCKET")
            .map(PathBuf::from)
            .unwrap_or(defaults.socket_path);

        let status_dir = std::env::var("STATUS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.status_dir);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let worker_bin = std::env::var("WORKER_BIN")
            .map(PathBuf::from)
            .unwrap_or(defaults.worker_bin);

        let accept_poll_ms: u64 = std::env::var("ACCEPT_POLL_MS")
            .unwrap_or_else(|_| defaults.accept_poll_ms.to_string())
            .parse()
            .expect("ACCEPT_POLL_MS must be a valid u64");

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults.request_timeout_secs.to_string())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults.shutdown_timeout_secs.to_string())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_request_bytes: usize = std::env::var("MAX_REQUEST_BYTES")
            .unwrap_or_else(|_| defaults.max_request_bytes.to_string())
            .parse()
            .expect("MAX_REQUEST_BYTES must be a valid usize");

        Self {
            socket_path,
            status_dir,
            database_url,
            worker_bin,
            accept_poll_ms,
            request_timeout_secs,
            shutdown_timeout_secs,
            max_request_bytes,
        }
    }

    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// `oneadif-worker` in the directory of the running executable.
fn default_worker_bin() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("oneadif-worker")))
        .unwrap_or_else(|| PathBuf::from("oneadif-worker"))
}
