//! Embedded web dashboard for speckle-activity.
//!
//! Provides a lightweight HTTP server (sync, via `tiny_http`) that serves:
//! - A single-page dashboard: credentials, stream picker, viewer, report, charts
//! - JSON API endpoints for render passes, config, health and render history
//!
//! Launched via `speckle-activity web` (default: `http://127.0.0.1:8501`).

mod api;
mod frontend;

use std::io::Cursor;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::config::ActivityConfig;
use crate::error::DashboardError;

pub use api::{BadRequest, Forbidden};

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Start the web dashboard server on the given address.
///
/// Blocks the current thread. Handles requests sequentially; every render
/// request opens its own connection with the credentials it carries. Errors
/// are answered per request without stopping the server.
pub fn serve(config: &ActivityConfig, addr: &str, open: bool) -> Result<()> {
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    println!("speckle-activity dashboard running at http://{addr}");
    println!("Press Ctrl+C to stop.\n");

    if open {
        let _ = open_browser(&format!("http://{addr}"));
    }

    for mut request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();
        let origin = header_value(&request, "Origin");
        let content_type = header_value(&request, "Content-Type");

        // Read body up-front for methods that carry one
        let body = if matches!(method, Method::Put | Method::Post | Method::Patch) {
            let mut buf = String::new();
            let _ = request.as_reader().read_to_string(&mut buf);
            Some(buf)
        } else {
            None
        };

        let incoming = Incoming {
            method: method.clone(),
            url: &url,
            origin: origin.as_deref(),
            content_type: content_type.as_deref(),
            body: body.as_deref(),
        };
        let resp = match dispatch(config, addr, &incoming) {
            Ok(resp) => resp,
            Err(e) => error_response(&e),
        };
        let status = resp.status_code().0;
        let _ = request.respond(resp);

        // Brief access log; the query string is left out.
        println!(
            "{} {} {} {}",
            method,
            request_path(&url),
            status,
            chrono::Local::now().format("%H:%M:%S")
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

type HttpResponse = Response<Cursor<Vec<u8>>>;

/// The parts of a request the router looks at.
#[derive(Debug, Clone)]
struct Incoming<'a> {
    method: Method,
    url: &'a str,
    origin: Option<&'a str>,
    content_type: Option<&'a str>,
    body: Option<&'a str>,
}

fn request_path(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn header_value(request: &Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_string())
}

/// Dispatch an incoming request to the appropriate handler.
///
/// `addr` is the address the server is bound to.
fn dispatch(config: &ActivityConfig, addr: &str, req: &Incoming<'_>) -> Result<HttpResponse> {
    match (&req.method, request_path(req.url)) {
        // Frontend
        (&Method::Get, "/") | (&Method::Get, "/index.html") => Ok(serve_frontend()),

        // API: dashboard
        (&Method::Post, "/api/render") => {
            check_render_request(addr, req)?;
            api::post_render(config, req.body.unwrap_or(""))
        }

        // API: configuration and diagnostics
        (&Method::Get, "/api/config") => api::get_config(config),
        (&Method::Get, "/api/health") => api::get_health(config),
        (&Method::Get, "/api/history") => api::get_history(config, req.url),

        // 404
        _ => Ok(not_found()),
    }
}

// ---------------------------------------------------------------------------
// Request guard
// ---------------------------------------------------------------------------

/// Origins the dashboard page itself is served from.
///
/// A loopback bind address also accepts the other loopback spellings.
fn own_origins(addr: &str) -> Vec<String> {
    let mut origins = vec![format!("http://{addr}")];
    if let Some((host, port)) = addr.rsplit_once(':')
        && matches!(host, "127.0.0.1" | "localhost" | "[::1]")
    {
        for loopback in ["127.0.0.1", "localhost", "[::1]"] {
            origins.push(format!("http://{loopback}:{port}"));
        }
    }
    origins
}

/// A render request must come from the dashboard page (or carry no
/// `Origin`, as non-browser clients do) and must have a JSON body.
/// Cross-site JSON posts need a preflight this server never answers.
fn check_render_request(addr: &str, req: &Incoming<'_>) -> Result<()> {
    if let Some(origin) = req.origin {
        let origin = origin.trim_end_matches('/');
        if !own_origins(addr).iter().any(|own| own == origin) {
            return Err(Forbidden(format!("render requests from {origin} are not allowed")).into());
        }
    }

    let is_json = req
        .content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"));
    if !is_json {
        return Err(BadRequest("render requests must be application/json".to_string()).into());
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// HTTP status for a dashboard error.
fn dashboard_status(err: &DashboardError) -> u16 {
    match err {
        DashboardError::Auth(_) => 401,
        DashboardError::NotFound(_) => 404,
        DashboardError::EmptyData(_) => 422,
        DashboardError::Network(_) | DashboardError::InvalidResponse(_) => 502,
    }
}

/// Status code and `kind` for any handler error.
fn classify(err: &anyhow::Error) -> (u16, &'static str) {
    if let Some(err) = err.downcast_ref::<DashboardError>() {
        (dashboard_status(err), err.kind())
    } else if err.downcast_ref::<BadRequest>().is_some() {
        (400, "bad_request")
    } else if err.downcast_ref::<Forbidden>().is_some() {
        (403, "forbidden")
    } else {
        (500, "internal")
    }
}

/// JSON error body `{"error": message, "kind": kind}` with a matching status.
fn error_response(err: &anyhow::Error) -> HttpResponse {
    let (status, kind) = classify(err);
    let body = serde_json::json!({ "error": format!("{err:#}"), "kind": kind }).to_string();
    Response::from_data(body.into_bytes())
        .with_header(content_type_json())
        .with_status_code(StatusCode(status))
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Serve the embedded single-page frontend.
fn serve_frontend() -> HttpResponse {
    Response::from_data(frontend::INDEX_HTML.as_bytes().to_vec())
        .with_header(content_type_html())
        .with_status_code(StatusCode(200))
}

/// 404 response.
fn not_found() -> HttpResponse {
    let body = r#"{"error": "not found", "kind": "not_found"}"#;
    Response::from_data(body.as_bytes().to_vec())
        .with_header(content_type_json())
        .with_status_code(StatusCode(404))
}

/// JSON content type header.
pub(crate) fn content_type_json() -> Header {
    Header::from_bytes("Content-Type", "application/json; charset=utf-8")
        .expect("static header must be valid")
}

/// HTML content type header.
fn content_type_html() -> Header {
    Header::from_bytes("Content-Type", "text/html; charset=utf-8")
        .expect("static header must be valid")
}

/// Attempt to open a URL in the system default browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "127.0.0.1:8501";

    fn disabled_logging() -> ActivityConfig {
        let mut config = ActivityConfig::default();
        config.logging.enabled = false;
        config
    }

    fn get(url: &str) -> Incoming<'_> {
        Incoming {
            method: Method::Get,
            url,
            origin: None,
            content_type: None,
            body: None,
        }
    }

    fn render(body: &str) -> Incoming<'_> {
        Incoming {
            method: Method::Post,
            url: "/api/render",
            origin: Some("http://127.0.0.1:8501"),
            content_type: Some("application/json"),
            body: Some(body),
        }
    }

    fn dispatch_err(config: &ActivityConfig, req: &Incoming<'_>) -> anyhow::Error {
        let Err(err) = dispatch(config, ADDR, req) else {
            panic!("expected the request to be rejected");
        };
        err
    }

    #[test]
    fn request_path_strips_query() {
        assert_eq!(request_path("/api/history?days=7"), "/api/history");
        assert_eq!(request_path("/"), "/");
    }

    #[test]
    fn dashboard_errors_map_to_statuses() {
        let cases = [
            (DashboardError::Auth("x".into()), 401, "auth"),
            (DashboardError::NotFound("x".into()), 404, "not_found"),
            (DashboardError::EmptyData("x".into()), 422, "empty_data"),
            (DashboardError::Network("x".into()), 502, "network"),
            (DashboardError::InvalidResponse("x".into()), 502, "invalid_response"),
        ];
        for (err, status, kind) in cases {
            assert_eq!(classify(&anyhow::Error::new(err)), (status, kind));
        }
    }

    #[test]
    fn bad_request_and_other_errors() {
        let bad = anyhow::Error::new(BadRequest("missing body".into()));
        assert_eq!(classify(&bad), (400, "bad_request"));

        let forbidden = anyhow::Error::new(Forbidden("cross-site".into()));
        assert_eq!(classify(&forbidden), (403, "forbidden"));

        let other = anyhow::anyhow!("disk full");
        assert_eq!(classify(&other), (500, "internal"));
    }

    #[test]
    fn error_response_has_status_and_kind() {
        let resp = error_response(&anyhow::Error::new(DashboardError::EmptyData(
            "stream 'Tower' has no commits".into(),
        )));
        assert_eq!(resp.status_code().0, 422);
    }

    #[test]
    fn unknown_route_is_404() {
        let config = disabled_logging();
        let resp = dispatch(&config, ADDR, &get("/nope")).unwrap();
        assert_eq!(resp.status_code().0, 404);
    }

    #[test]
    fn index_is_served() {
        let config = disabled_logging();
        let resp = dispatch(&config, ADDR, &get("/")).unwrap();
        assert_eq!(resp.status_code().0, 200);
    }

    #[test]
    fn render_without_token_awaits_credentials() {
        let config = disabled_logging();
        let req = render(r#"{"server": "speckle.xyz", "token": ""}"#);
        let resp = dispatch(&config, ADDR, &req).unwrap();
        assert_eq!(resp.status_code().0, 200);
    }

    #[test]
    fn malformed_render_body_is_bad_request() {
        let config = disabled_logging();
        let err = dispatch_err(&config, &render("{not json"));
        assert_eq!(classify(&err).0, 400);
    }

    #[test]
    fn loopback_spellings_are_own_origins() {
        let origins = own_origins(ADDR);
        assert!(origins.contains(&"http://localhost:8501".to_string()));
        assert!(origins.contains(&"http://[::1]:8501".to_string()));
        assert_eq!(own_origins("10.0.0.5:9000"), vec!["http://10.0.0.5:9000"]);
    }

    #[test]
    fn cross_site_render_is_forbidden() {
        let config = disabled_logging();
        let mut req = render(r#"{"server": "https://attacker.example", "token": ""}"#);
        req.origin = Some("https://attacker.example");
        assert_eq!(classify(&dispatch_err(&config, &req)), (403, "forbidden"));

        req.origin = Some("null");
        assert_eq!(classify(&dispatch_err(&config, &req)).0, 403);
    }

    #[test]
    fn same_origin_and_originless_renders_pass() {
        let config = disabled_logging();
        let mut req = render("{}");
        req.origin = Some("http://localhost:8501/");
        assert!(dispatch(&config, ADDR, &req).is_ok());

        req.origin = None;
        req.content_type = Some("application/json; charset=utf-8");
        assert!(dispatch(&config, ADDR, &req).is_ok());
    }

    #[test]
    fn non_json_render_is_bad_request() {
        let config = disabled_logging();
        let mut req = render("{}");
        req.content_type = Some("text/plain");
        assert_eq!(classify(&dispatch_err(&config, &req)), (400, "bad_request"));

        req.content_type = None;
        assert_eq!(classify(&dispatch_err(&config, &req)).0, 400);
    }
}
