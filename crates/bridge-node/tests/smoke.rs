//! End-to-end smoke test for bridge-node.
//!
//! Starts a real node process (echo executor, no escrow/auth configured),
//! submits a task over REST with the synchronous wait flag, and asserts the
//! response carries the echoed output.
//!
//! Run with:
//!   cargo test -p bridge-node --test smoke

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

struct NodeGuard {
    child: Child,
    data_dir: PathBuf,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

async fn wait_for_ready(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client.get(url).send().await {
            if resp.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    false
}

#[tokio::test]
async fn smoke_submit_and_sync_wait() {
    let data_dir = std::env::temp_dir().join(format!("bridge_e2e_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    std::fs::create_dir_all(&data_dir).unwrap();
    let sandbox_root = data_dir.join("sandbox");
    std::fs::create_dir_all(&sandbox_root).unwrap();

    let port = free_port();
    let base_url = format!("http://127.0.0.1:{port}");

    let node_bin = env!("CARGO_BIN_EXE_bridge-node");
    let child = Command::new(node_bin)
        .args([
            "--private-key", &format!("0x{}", "a".repeat(64)),
            "--host", "127.0.0.1",
            "--port", &port.to_string(),
            "--sandbox-root", sandbox_root.to_str().unwrap(),
            "--trust-store-path", data_dir.join("trust-store.json").to_str().unwrap(),
            "--rate-limit-store-path", data_dir.join("rate-limits.json").to_str().unwrap(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn bridge-node");

    let _guard = NodeGuard { child, data_dir };

    let http = reqwest::Client::new();
    assert!(
        wait_for_ready(&http, &format!("{base_url}/health"), Duration::from_secs(15)).await,
        "bridge-node did not become ready within 15 seconds"
    );

    let resp = http
        .post(format!("{base_url}/task?wait=true"))
        .json(&serde_json::json!({
            "task_id": "",
            "kind": "prompt",
            "prompt": "echo this back",
            "client_identity": "",
            "timeout_seconds": 10,
        }))
        .send()
        .await
        .expect("submit task");

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.expect("parse task response");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["output"], "echo this back");

    let card = http
        .get(format!("{base_url}/.well-known/agent.json"))
        .send()
        .await
        .expect("fetch agent card")
        .json::<serde_json::Value>()
        .await
        .expect("parse agent card");
    assert_eq!(card["protocolVersion"], "0.2");
}
