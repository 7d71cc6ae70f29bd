//! In-process HTTP server answering with canned replies, for exercising
//! [`super::SpeckleConnector`] against real sockets.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tiny_http::{Response, Server, StatusCode};

/// How long the server waits for the next request before giving up.
const IDLE_WAIT: Duration = Duration::from_secs(2);

/// One request as the server received it.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub authorization: Option<String>,
    pub body: String,
}

pub(crate) struct TestServer {
    pub url: String,
    handle: JoinHandle<Vec<Recorded>>,
}

impl TestServer {
    /// Answer one request per `(status, body)` reply, in order, then stop.
    pub fn start(replies: Vec<(u16, String)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("bind test server");
        let port = server
            .server_addr()
            .to_ip()
            .expect("test server listens on tcp")
            .port();

        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, reply) in replies {
                let Ok(Some(mut request)) = server.recv_timeout(IDLE_WAIT) else {
                    break;
                };
                let authorization = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.as_str().to_string());
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                seen.push(Recorded { authorization, body });

                let response = Response::from_string(reply).with_status_code(StatusCode(status));
                let _ = request.respond(response);
            }
            seen
        });

        Self {
            url: format!("http://127.0.0.1:{port}"),
            handle,
        }
    }

    /// Stop serving and return every request received.
    pub fn finish(self) -> Vec<Recorded> {
        self.handle.join().expect("test server thread panicked")
    }
}

/// `activeUser` reply for account "Ada".
pub(crate) fn active_user_reply() -> (u16, String) {
    (
        200,
        r#"{"data": {"activeUser": {"id": "u1", "name": "Ada", "email": null}}}"#.to_string(),
    )
}
