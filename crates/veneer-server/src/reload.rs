//! Hot-reload controller.
//!
//! Watches the configuration file for modifications, debounces bursts of
//! writes, then rebuilds the router and publishes the new generation through
//! the shared holder. A failed load keeps the previous generation; the state
//! store is never touched.

use crate::config::Config;
use crate::server::{RouterSnapshot, SnapshotHolder};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{error, info};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Watch `config_path` forever, swapping the snapshot on successful reloads.
pub async fn watch_config(config_path: PathBuf, holder: SnapshotHolder) {
    let mut last_seen = mtime(&config_path);

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        let current = mtime(&config_path);
        if current == last_seen {
            continue;
        }

        // Debounce: wait until the file has been stable for the full delay.
        last_seen = current;
        loop {
            tokio::time::sleep(DEBOUNCE_DELAY).await;
            let settled = mtime(&config_path);
            if settled == last_seen {
                break;
            }
            last_seen = settled;
        }

        reload(&config_path, &holder);
    }
}

fn reload(config_path: &Path, holder: &SnapshotHolder) {
    info!("config change detected, reloading {}", config_path.display());

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("reload failed: {e:#}; keeping previous configuration");
            return;
        }
    };

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    match RouterSnapshot::build(&config, base_dir) {
        Ok(snapshot) => {
            let routes = snapshot.route_count();
            *holder.write() = std::sync::Arc::new(snapshot);
            info!("configuration reloaded, {routes} routes active");
        }
        Err(e) => {
            error!("reload failed: {e:#}; keeping previous configuration");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::RwLock;
    use std::io::Write;
    use std::sync::Arc;

    fn write_file(path: &Path, contents: &str) {
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    const VALID: &str = r#"
server: {port: 5001}
routes:
  - {name: a, method: GET, path: /a, mock: {body: 1}}
  - {name: b, method: GET, path: /b, mock: {body: 2}}
"#;

    const BROKEN: &str = r#"
server: {port: 5001}
routes:
  - {name: a, method: NOPE, path: /a, mock: {body: 1}}
"#;

    fn holder_for(path: &Path) -> SnapshotHolder {
        let cfg = Config::load(path).unwrap();
        let snapshot = RouterSnapshot::build(&cfg, path.parent().unwrap()).unwrap();
        Arc::new(RwLock::new(Arc::new(snapshot)))
    }

    #[test]
    fn test_reload_swaps_snapshot_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        write_file(&path, "server: {}\nroutes: [{name: a, method: GET, path: /a, mock: {body: 1}}]\n");
        let holder = holder_for(&path);
        assert_eq!(holder.read().route_count(), 1);

        write_file(&path, VALID);
        reload(&path, &holder);
        assert_eq!(holder.read().route_count(), 2);
    }

    #[test]
    fn test_failed_reload_keeps_old_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        write_file(&path, VALID);
        let holder = holder_for(&path);
        let before = holder.read().clone();

        write_file(&path, BROKEN);
        reload(&path, &holder);

        assert!(Arc::ptr_eq(&before, &*holder.read()));
        assert_eq!(holder.read().route_count(), 2);
    }
}
