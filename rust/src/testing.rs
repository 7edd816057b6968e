//! Local HTTP server serving canned responses for tests.

use std::sync::{Arc, Mutex};
use std::thread;

use tiny_http::{Header, Response, Server};

pub(crate) struct MockServer {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    /// Serve `responses` in order, one per incoming request.
    pub(crate) fn start(responses: Vec<(u16, String)>) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        thread::spawn(move || {
            for (status, body) in responses {
                let Ok(request) = server.recv() else {
                    return;
                };
                seen.lock().unwrap().push(request.url().to_string());
                let content_type = if body.trim_start().starts_with('<') {
                    "application/xml"
                } else {
                    "application/json"
                };
                let header = Header::from_bytes("Content-Type", content_type).unwrap();
                let response = Response::from_string(body)
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base: format!("http://{addr}"),
            requests,
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Request targets (path and query) seen so far.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}
