use std::sync::OnceLock;

use placelens_common::observability::{LogConfig, LogFormat};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let dir = std::env::temp_dir().join("placelens-test-logs");
        let config = LogConfig {
            app_name: "placelens-tests",
            log_dir: Some(dir),
            emit_stderr: true,
            format: if std::env::var("PLACELENS_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug".into(),
        };

        placelens_common::observability::init_logging(config).unwrap_or_default()
    });
}

/// Write a tiny fake PNG into `dir` and return its path.
#[allow(dead_code)]
pub fn fake_screenshot(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']).unwrap();
    path
}
