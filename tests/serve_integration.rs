//! Purpose: End-to-end tests for the HTTP parsing service.
//! Exports: None (integration test module).
//! Role: Validate upload handling, response shapes, and error statuses over TCP.
//! Invariants: Uses loopback-only servers on picked ports.
//! Invariants: Bounded waits avoid test flakiness.
//! Invariants: Server processes are cleaned up on drop.

mod common;

use serde_json::Value;
use std::io::Read;
use std::net::{SocketAddr, TcpListener};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::thread::sleep;
use std::time::{Duration, Instant};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

static SERVER_LOCK: Mutex<()> = Mutex::new(());

const BOUNDARY: &str = "semanas-test-boundary";

struct TestServer {
    child: Child,
    base_url: String,
    _server_guard: MutexGuard<'static, ()>,
}

impl TestServer {
    fn start() -> TestResult<Self> {
        let guard = SERVER_LOCK
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let mut last_err: Option<Box<dyn std::error::Error>> = None;
        for _attempt in 0..3 {
            let port = pick_port()?;
            let bind = format!("127.0.0.1:{port}");
            let base_url = format!("http://{bind}");

            let mut child = Command::new(env!("CARGO_BIN_EXE_semanas"))
                .arg("serve")
                .arg("--bind")
                .arg(&bind)
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .spawn()?;

            match wait_for_server(&mut child, bind.parse()?) {
                Ok(()) => {
                    return Ok(Self {
                        child,
                        base_url,
                        _server_guard: guard,
                    });
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    last_err = Some(err);
                    sleep(Duration::from_millis(30));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| "server failed to start".into()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn pick_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

fn wait_for_server(child: &mut Child, addr: SocketAddr) -> TestResult<()> {
    let url = format!("http://{addr}/health");
    let start = Instant::now();
    loop {
        if let Ok(resp) = ureq::get(&url).call() {
            if resp.status() == 200 {
                return Ok(());
            }
        }
        if let Some(status) = child.try_wait()? {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            let detail = stderr.trim();
            return Err(format!(
                "server exited before ready (status: {status}, stderr: {})",
                if detail.is_empty() { "<empty>" } else { detail }
            )
            .into());
        }
        if start.elapsed() > Duration::from_secs(8) {
            return Err("server did not start in time".into());
        }
        sleep(Duration::from_millis(20));
    }
}

fn multipart_body(field: &str, filename: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post_multipart(url: &str, body: &[u8]) -> Result<ureq::Response, ureq::Error> {
    ureq::post(url)
        .set(
            "Content-Type",
            &format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .send_bytes(body)
}

fn sample_pdf() -> Vec<u8> {
    common::build_pdf(&[
        &[
            "RELACION DE SEMANAS COTIZADAS",
            "[1] Identificacion aportante [2] Nombre o razon Social [3] Desde \
             [4] Hasta [5] Ultimo salario [6] Semanas [7] Licencias (Lic.) \
             [8] Simultaneos (Sim.) [9] Total",
            "890326878 Fabrica De Calzado S A 01/02/1980 30/09/1985 $ 45.000 295,71 0,00 0,00 295,71",
        ],
        &["RESUMEN DE SEMANAS COTIZADAS", "[26] TOTAL SEMANAS", "295,71"],
    ])
}

#[test]
fn health_reports_healthy() -> TestResult<()> {
    let server = TestServer::start()?;
    let resp = ureq::get(&server.url("/health")).call()?;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.into_json()?;
    assert_eq!(body, serde_json::json!({ "status": "healthy" }));
    Ok(())
}

#[test]
fn upload_returns_the_three_table_collections() -> TestResult<()> {
    let server = TestServer::start()?;
    let body = multipart_body("file", "historia.pdf", &sample_pdf());
    let resp = post_multipart(&server.url("/parse-pension-pdf"), &body)?;
    assert_eq!(resp.status(), 200);

    let json: Value = resp.into_json()?;
    let object = json.as_object().ok_or("expected object")?;
    assert_eq!(object.len(), 3);
    let weeks = json["weeks_data"].as_array().ok_or("weeks_data")?;
    assert_eq!(weeks.len(), 1);
    assert_eq!(weeks[0]["cont_id"], "890326878");
    assert_eq!(weeks[0]["cont_from"], "1980-02-01");
    assert_eq!(json["summary_values"]["weeks_total_report"], 295.71);
    assert!(json["payments_data"].as_array().ok_or("payments_data")?.is_empty());
    Ok(())
}

#[test]
fn non_pdf_filename_is_rejected() -> TestResult<()> {
    let server = TestServer::start()?;
    let body = multipart_body("file", "historia.txt", &sample_pdf());
    match post_multipart(&server.url("/parse-pension-pdf"), &body) {
        Err(ureq::Error::Status(status, resp)) => {
            assert_eq!(status, 400);
            let json: Value = resp.into_json()?;
            assert_eq!(json["error"]["kind"], "Usage");
            Ok(())
        }
        other => Err(format!("expected 400 status, got {other:?}").into()),
    }
}

#[test]
fn corrupt_upload_maps_to_unprocessable() -> TestResult<()> {
    let server = TestServer::start()?;
    let body = multipart_body("file", "broken.pdf", b"not a pdf at all");
    match post_multipart(&server.url("/parse-pension-pdf"), &body) {
        Err(ureq::Error::Status(status, resp)) => {
            assert_eq!(status, 422);
            let json: Value = resp.into_json()?;
            assert_eq!(json["error"]["kind"], "Corrupt");
            Ok(())
        }
        other => Err(format!("expected 422 status, got {other:?}").into()),
    }
}

#[test]
fn missing_file_field_is_rejected() -> TestResult<()> {
    let server = TestServer::start()?;
    let body = multipart_body("attachment", "historia.pdf", &sample_pdf());
    match post_multipart(&server.url("/parse-pension-pdf"), &body) {
        Err(ureq::Error::Status(status, resp)) => {
            assert_eq!(status, 400);
            let json: Value = resp.into_json()?;
            assert_eq!(json["error"]["kind"], "Usage");
            Ok(())
        }
        other => Err(format!("expected 400 status, got {other:?}").into()),
    }
}
