//! Purpose: End-to-end tests for the HTTP gateway.
//! Exports: None (integration test module).
//! Role: Validate routing, validation order, local parsing, and peer forwarding over TCP.
//! Invariants: Uses loopback-only servers with temp data directories.
//! Invariants: Bounded waits avoid test flakiness.
//! Invariants: Server processes are cleaned up on drop.

use serde_json::Value;
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

struct TestServer {
    child: Child,
    base_url: String,
}

impl TestServer {
    fn start(data_dir: &Path) -> TestResult<Self> {
        Self::start_with_peer(data_dir, None)
    }

    fn start_with_peer(data_dir: &Path, peer_url: Option<&str>) -> TestResult<Self> {
        let mut last_err: Option<Box<dyn std::error::Error>> = None;
        for _attempt in 0..3 {
            let port = pick_port()?;
            let bind = format!("127.0.0.1:{port}");
            let base_url = format!("http://{bind}");

            let mut command = Command::new(env!("CARGO_BIN_EXE_parsegate"));
            command
                .arg("--data-dir")
                .arg(data_dir)
                .arg("serve")
                .arg("--bind")
                .arg(&bind)
                .arg("--peer-timeout-ms")
                .arg("2000")
                .stdout(Stdio::null())
                .stderr(Stdio::null());
            if let Some(peer_url) = peer_url {
                command.arg("--peer-url").arg(peer_url);
            }
            let mut child = command.spawn()?;

            match wait_for_server(&mut child, &bind) {
                Ok(()) => return Ok(Self { child, base_url }),
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

    fn url(&self, path_and_query: &str) -> String {
        format!("{}{path_and_query}", self.base_url)
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
    Ok(listener.local_addr()?.port())
}

fn wait_for_server(child: &mut Child, bind: &str) -> TestResult<()> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(status) = child.try_wait()? {
            return Err(format!("server exited early: {status}").into());
        }
        if TcpStream::connect(bind).is_ok() {
            return Ok(());
        }
        if Instant::now() > deadline {
            return Err("server did not start listening in time".into());
        }
        sleep(Duration::from_millis(20));
    }
}

fn get(url: &str) -> TestResult<(u16, Value)> {
    let agent = ureq::builder().timeout(Duration::from_secs(10)).build();
    match agent.get(url).call() {
        Ok(resp) => {
            let status = resp.status();
            Ok((status, serde_json::from_str(&resp.into_string()?)?))
        }
        Err(ureq::Error::Status(status, resp)) => {
            Ok((status, serde_json::from_str(&resp.into_string()?)?))
        }
        Err(err) => Err(err.into()),
    }
}

fn detail(body: &Value) -> &str {
    body["detail"].as_str().unwrap_or_default()
}

fn write_fixture(data_dir: &Path, set: &str, ext: &str, content: &str) -> TestResult<()> {
    let dir = data_dir.join(set);
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join(format!("{set}.{ext}")), content)?;
    Ok(())
}

fn write_books_fixtures(data_dir: &Path) -> TestResult<()> {
    write_fixture(data_dir, "books", "txt", "Title: Dune\nAuthor: Frank Herbert\n")?;
    write_fixture(
        data_dir,
        "books",
        "xml",
        "<book><title>Dune</title><author>Frank Herbert</author></book>",
    )?;
    write_fixture(data_dir, "books", "yaml", "title: Dune\nyear: 1965\n")?;
    write_fixture(data_dir, "books", "json", r#"{"title": "Dune", "year": 1965}"#)?;
    write_fixture(data_dir, "books", "csv", "title,year\nDune,1965\n")?;
    Ok(())
}

#[test]
fn welcome_lists_sets_and_formats() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let server = TestServer::start(temp.path())?;

    let (status, body) = get(&server.url("/"))?;
    assert_eq!(status, 200);
    assert!(body["message"].as_str().unwrap().contains("parsegate"));
    assert_eq!(body["available_sets"], serde_json::json!(["books", "movies"]));
    assert_eq!(
        body["available_formats"],
        serde_json::json!(["txt", "xml", "yaml", "json", "csv"])
    );
    Ok(())
}

#[test]
fn unknown_path_is_not_found() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let server = TestServer::start(temp.path())?;

    let (status, body) = get(&server.url("/nope"))?;
    assert_eq!(status, 404);
    assert_eq!(detail(&body), "not found");
    Ok(())
}

#[test]
fn post_to_known_route_is_method_not_allowed() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let server = TestServer::start(temp.path())?;

    let agent = ureq::builder().timeout(Duration::from_secs(10)).build();
    let (status, body) = match agent.post(&server.url("/parse/books")).send_string("{}") {
        Ok(resp) => (resp.status(), resp.into_json()?),
        Err(ureq::Error::Status(status, resp)) => (status, resp.into_json()?),
        Err(err) => return Err(err.into()),
    };
    assert_eq!(status, 405);
    assert_eq!(detail(&body), "method not allowed");
    Ok(())
}

#[test]
fn deep_parse_path_is_invalid() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let server = TestServer::start(temp.path())?;

    let (status, body) = get(&server.url("/parse/books/json/extra"))?;
    assert_eq!(status, 400);
    assert_eq!(detail(&body), "invalid path");
    Ok(())
}

#[test]
fn unknown_dataset_lists_valid_sets() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let server = TestServer::start(temp.path())?;

    let (status, body) = get(&server.url("/parse/music?direct=true"))?;
    assert_eq!(status, 400);
    assert!(detail(&body).contains("[\"books\", \"movies\"]"));
    Ok(())
}

#[test]
fn unknown_file_type_lists_valid_types() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let server = TestServer::start(temp.path())?;

    let (status, body) = get(&server.url("/parse/books/toml?direct=true"))?;
    assert_eq!(status, 400);
    assert!(detail(&body).contains("\"csv\""));
    Ok(())
}

#[test]
fn direct_single_type_returns_envelope() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    write_books_fixtures(temp.path())?;
    let server = TestServer::start(temp.path())?;

    let (status, body) = get(&server.url("/parse/books/json?direct=true"))?;
    assert_eq!(status, 200);
    assert_eq!(body["set"], "books");
    assert_eq!(body["format"], "json");
    assert_eq!(body["data"]["title"], "Dune");
    assert_eq!(body["data"]["year"], 1965);
    Ok(())
}

#[test]
fn direct_missing_file_is_not_found() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    let server = TestServer::start(temp.path())?;

    let (status, body) = get(&server.url("/parse/books/json?direct=true"))?;
    assert_eq!(status, 404);
    assert!(detail(&body).contains("file not found"));
    Ok(())
}

#[test]
fn direct_parse_all_reports_per_type_results() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    // only two of five formats exist; the rest must fail inline
    write_fixture(temp.path(), "books", "txt", "Title: Dune\n")?;
    write_fixture(temp.path(), "books", "json", r#"{"title": "Dune"}"#)?;
    let server = TestServer::start(temp.path())?;

    let (status, body) = get(&server.url("/parse/books?direct=true"))?;
    assert_eq!(status, 200);
    assert_eq!(body["set"], "books");

    let data = body["data"].as_object().expect("data object");
    let mut keys: Vec<&String> = data.keys().collect();
    keys.sort();
    assert_eq!(keys, ["csv", "json", "txt", "xml", "yaml"]);

    assert_eq!(data["txt"]["Title"], "Dune");
    assert_eq!(data["json"]["title"], "Dune");
    for missing in ["xml", "yaml", "csv"] {
        assert!(data[missing]["error"].as_str().unwrap().contains("not found"));
    }
    Ok(())
}

#[test]
fn forward_relays_peer_success_verbatim() -> TestResult<()> {
    let peer_data = tempfile::tempdir()?;
    write_books_fixtures(peer_data.path())?;
    let peer = TestServer::start(peer_data.path())?;

    let local_data = tempfile::tempdir()?;
    let gateway = TestServer::start_with_peer(local_data.path(), Some(&peer.base_url))?;

    // the gateway has no local data; the record must come from the peer
    let (status, body) = get(&gateway.url("/parse/books/csv"))?;
    assert_eq!(status, 200);
    assert_eq!(body["set"], "books");
    assert_eq!(body["format"], "csv");
    assert_eq!(body["data"]["title"], "Dune");
    Ok(())
}

#[test]
fn forward_preserves_peer_error_status_and_detail() -> TestResult<()> {
    let peer_data = tempfile::tempdir()?;
    let peer = TestServer::start(peer_data.path())?;

    let local_data = tempfile::tempdir()?;
    let gateway = TestServer::start_with_peer(local_data.path(), Some(&peer.base_url))?;

    let (status, body) = get(&gateway.url("/parse/books/json"))?;
    assert_eq!(status, 404);
    assert!(detail(&body).contains("file not found"));
    Ok(())
}

#[test]
fn forward_to_unreachable_peer_is_internal_error() -> TestResult<()> {
    let temp = tempfile::tempdir()?;
    write_books_fixtures(temp.path())?;
    let dead_port = pick_port()?;
    let server =
        TestServer::start_with_peer(temp.path(), Some(&format!("http://127.0.0.1:{dead_port}")))?;

    let (status, body) = get(&server.url("/parse/books"))?;
    assert_eq!(status, 500);
    assert!(detail(&body).contains("communicating with peer"));
    Ok(())
}
