use std::io;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

struct ServerHandle {
    child: Child,
    base_url: String,
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[tokio::test]
async fn blocked_callback_is_released_by_wake() {
    let server = spawn_server(60_000).expect("spawn server");
    wait_for_health(&server.base_url)
        .await
        .expect("wait for health");

    let client = Client::new();
    let created = client
        .post(format!("{}/v1/sessions/e2e", server.base_url))
        .send()
        .await
        .expect("create session");
    assert_eq!(created.status(), StatusCode::CREATED);

    let activated = client
        .put(format!("{}/v1/sessions/e2e/activations/tree", server.base_url))
        .send()
        .await
        .expect("activate");
    assert_eq!(activated.status(), StatusCode::OK);

    let poll = tokio::spawn({
        let client = client.clone();
        let url = format!("{}/v1/sessions/e2e/callback", server.base_url);
        async move { client.get(url).send().await }
    });

    wait_for_blocked_poll(&client, &server.base_url, "e2e")
        .await
        .expect("poll blocked");

    let woken = client
        .post(format!("{}/v1/sessions/e2e/wake", server.base_url))
        .send()
        .await
        .expect("wake");
    assert_eq!(woken.status(), StatusCode::ACCEPTED);

    let response = tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .expect("callback answered")
        .expect("poll task")
        .expect("callback request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("callback json");
    assert_eq!(body, json!({ "released": true, "outcome": "released" }));
}

fn spawn_server(check_interval_ms: u64) -> io::Result<ServerHandle> {
    let port = pick_port()?;
    let base_url = format!("http://127.0.0.1:{port}");

    let child = Command::new(env!("CARGO_BIN_EXE_ui-callback-http"))
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--check-interval-ms")
        .arg(check_interval_ms.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    Ok(ServerHandle { child, base_url })
}

fn pick_port() -> io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

async fn wait_for_health(base_url: &str) -> io::Result<()> {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(10);

    loop {
        if Instant::now() > deadline {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "server did not become healthy",
            ));
        }

        if let Ok(response) = client.get(format!("{base_url}/v1/health")).send().await {
            if response.status() == StatusCode::OK {
                return Ok(());
            }
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn wait_for_blocked_poll(client: &Client, base_url: &str, session_id: &str) -> io::Result<()> {
    let deadline = Instant::now() + Duration::from_secs(5);

    loop {
        if Instant::now() > deadline {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "callback poll never blocked",
            ));
        }

        if let Ok(response) = client
            .get(format!("{base_url}/v1/sessions/{session_id}"))
            .send()
            .await
        {
            if let Ok(session) = response.json::<Value>().await {
                if session["blockedRequests"] == 1 {
                    return Ok(());
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
