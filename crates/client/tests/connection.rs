use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use llm_dust_client::{
    AgentConfiguration, DustClient, DustConfigBuilder, Error,
};
use llm_dust_model::{ConversationalModel, ErrorKind, ModelError, Prompt};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

const WORKSPACE: &str = "/api/v1/w/ws";
const CONVERSATION_EVENTS: &str = "/assistant/conversations/c1/events";

type Scripts = Arc<Mutex<HashMap<String, VecDeque<Vec<Value>>>>>;

/// An HTTP server whose event streams stay open after their scripted
/// events. It reports every stream the client hangs up on.
struct StallingServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    closed: mpsc::UnboundedReceiver<String>,
}

impl StallingServer {
    /// Starts the server. Each stream path may appear several times, one
    /// script is used per request, in order.
    async fn start(streams: Vec<(String, Vec<Value>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut scripts = HashMap::<_, VecDeque<_>>::new();
        for (path, events) in streams {
            scripts
                .entry(format!("{WORKSPACE}{path}"))
                .or_default()
                .push_back(events);
        }
        let scripts = Arc::new(Mutex::new(scripts));
        let requests = Arc::new(Mutex::new(vec![]));
        let (closed_tx, closed) = mpsc::unbounded_channel();

        tokio::spawn({
            let requests = Arc::clone(&requests);
            async move {
                while let Ok((conn, _)) = listener.accept().await {
                    tokio::spawn(serve(
                        conn,
                        Arc::clone(&scripts),
                        Arc::clone(&requests),
                        closed_tx.clone(),
                    ));
                }
            }
        });

        Self {
            addr,
            requests,
            closed,
        }
    }

    fn client(&self, stream_timeout: Duration) -> DustClient {
        let base_url = format!("http://{}", self.addr);
        let config = DustConfigBuilder::new("sk-test", base_url, "ws")
            .with_stream_timeout(stream_timeout)
            .build()
            .unwrap();
        DustClient::new(config)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Waits until the client has hung up on every stream in `paths`.
    async fn wait_closed(&mut self, paths: &[&str]) {
        let mut pending: Vec<_> =
            paths.iter().map(|p| format!("{WORKSPACE}{p}")).collect();
        let wait = async {
            while !pending.is_empty() {
                let closed = self.closed.recv().await.unwrap();
                pending.retain(|path| *path != closed);
            }
        };
        timeout(Duration::from_secs(5), wait)
            .await
            .expect("stream connections should be released");
    }
}

async fn serve(
    mut conn: TcpStream,
    scripts: Scripts,
    requests: Arc<Mutex<Vec<String>>>,
    closed: mpsc::UnboundedSender<String>,
) {
    let Some(request_line) = read_request(&mut conn).await else {
        return;
    };
    let mut parts = request_line.split(' ');
    let method = parts.next().unwrap_or_default().to_owned();
    let path = parts.next().unwrap_or_default().to_owned();
    requests.lock().unwrap().push(format!("{method} {path}"));

    if method == "POST" {
        let body = if path.ends_with("/assistant/conversations") {
            json!({ "conversation": { "sId": "c1" } })
        } else {
            json!({})
        }
        .to_string();
        let resp = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
             content-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        conn.write_all(resp.as_bytes()).await.ok();
        return;
    }

    let events = scripts
        .lock()
        .unwrap()
        .get_mut(&path)
        .and_then(VecDeque::pop_front)
        .unwrap_or_default();
    let mut out = String::from(
        "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\
         transfer-encoding: chunked\r\n\r\n",
    );
    for event in events {
        let line = format!("data: {}\n\n", json!({ "data": event }));
        out.push_str(&format!("{:x}\r\n{line}\r\n", line.len()));
    }
    if conn.write_all(out.as_bytes()).await.is_err() {
        return;
    }

    // Stall until the client hangs up.
    let mut buf = [0; 64];
    while matches!(conn.read(&mut buf).await, Ok(n) if n > 0) {}
    closed.send(path).ok();
}

/// Reads a whole request and returns its request line.
async fn read_request(conn: &mut TcpStream) -> Option<String> {
    let mut data = vec![];
    let mut buf = [0; 1024];
    let head_len = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = conn.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..head_len]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while data.len() < head_len + content_length {
        let n = conn.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    }
    head.lines().next().map(str::to_owned)
}

fn agent() -> AgentConfiguration {
    AgentConfiguration {
        id: "agent-1".to_owned(),
        name: "helper".to_owned(),
        description: "Helps".to_owned(),
    }
}

fn message_events(id: &str) -> String {
    format!("/assistant/conversations/c1/messages/{id}/events")
}

fn agent_message(id: &str) -> Value {
    json!({ "type": "agent_message_new", "messageId": id })
}

fn user_message() -> Value {
    json!({ "type": "user_message_new" })
}

fn tokens(text: &str) -> Value {
    json!({ "type": "generation_tokens", "text": text })
}

#[tokio::test]
async fn test_stalled_stream_times_out_and_hangs_up() {
    let mut server = StallingServer::start(vec![(
        CONVERSATION_EVENTS.to_owned(),
        vec![user_message()],
    )])
    .await;
    let mut model = server
        .client(Duration::from_millis(300))
        .model(agent());

    let prompt = Prompt::new("Hi");
    let mut response = model.respond(&prompt).await.unwrap();
    let err = match response.next().await {
        Some(Err(err)) => err,
        other => panic!("expected a timeout, got {other:?}"),
    };
    assert_eq!(err.kind(), ErrorKind::StreamTimeout);
    assert!(matches!(
        err,
        Error::StreamTimeout(limit) if limit == Duration::from_millis(300)
    ));

    // The connection goes away with the error, not with the response.
    server.wait_closed(&[CONVERSATION_EVENTS]).await;
    assert!(response.next().await.is_none());
}

#[tokio::test]
async fn test_dropped_response_hangs_up() {
    let mut server = StallingServer::start(vec![
        (CONVERSATION_EVENTS.to_owned(), vec![agent_message("m1")]),
        (message_events("m1"), vec![tokens("Hel")]),
        (
            CONVERSATION_EVENTS.to_owned(),
            vec![
                user_message(),
                agent_message("m1"),
                user_message(),
                agent_message("m2"),
            ],
        ),
        (
            message_events("m2"),
            vec![
                tokens("Again"),
                json!({ "type": "agent_message_success" }),
            ],
        ),
    ])
    .await;
    let mut model = server.client(Duration::from_secs(10)).model(agent());

    let prompt = Prompt::new("Hi");
    let mut response = model.respond(&prompt).await.unwrap();
    assert_eq!(response.next().await.unwrap().unwrap(), "Hel");
    drop(response);
    server
        .wait_closed(&[CONVERSATION_EVENTS, message_events("m1").as_str()])
        .await;
    assert!(model.session().is_processed("m1"));

    // The next prompt continues the conversation and skips the
    // half-read message.
    let prompt = Prompt::new("And again?");
    let pieces: Vec<_> = model
        .respond(&prompt)
        .await
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;
    assert_eq!(pieces, ["Again"]);

    let requests = server.requests();
    let count = |request: String| {
        requests.iter().filter(|seen| **seen == request).count()
    };
    assert_eq!(count(format!("POST {WORKSPACE}/assistant/conversations")), 1);
    assert_eq!(
        count(format!("POST {WORKSPACE}/assistant/conversations/c1/messages")),
        1
    );
    assert_eq!(count(format!("GET {WORKSPACE}{}", message_events("m1"))), 1);
    assert_eq!(count(format!("GET {WORKSPACE}{}", message_events("m2"))), 1);
}
