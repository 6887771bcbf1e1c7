use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::adapters::http::router::{ApiRequest, ApiResponse, route};
use crate::app::App;
use crate::core::errors::Result;

/// Header carrying the caller identity used when roles are enforced.
pub const USER_HEADER: &str = "x-user-id";

/// Headroom on top of the photo limit for everything that is not a photo.
const BODY_SLACK_BYTES: usize = 64 * 1024;

/// HTTP server state
pub struct HttpServer {
    app: Arc<App>,
    bind_addr: SocketAddr,
    max_body_bytes: usize,
}

impl HttpServer {
    pub fn new(app: Arc<App>, bind_addr: SocketAddr, max_upload_bytes: u64) -> Self {
        let max_upload = usize::try_from(max_upload_bytes).unwrap_or(usize::MAX);
        Self {
            app,
            bind_addr,
            max_body_bytes: max_upload.saturating_add(BODY_SLACK_BYTES),
        }
    }

    /// Run the HTTP server until the process is stopped.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!(method = %method, path = %path, "Incoming request");

        let api_response = match self.read_request(req).await {
            Ok(api_request) => {
                let app = self.app.clone();
                tokio::task::spawn_blocking(move || route(&app, &api_request))
                    .await
                    .unwrap_or_else(|e| {
                        error!(error = %e, "Request handler panicked");
                        plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                    })
            }
            Err(response) => response,
        };

        let status = api_response.status;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if status.is_server_error() {
            error!(method = %method, path = %path, status = status.as_u16(), elapsed_ms, "Request");
        } else {
            info!(method = %method, path = %path, status = status.as_u16(), elapsed_ms, "Request");
        }

        Ok(into_hyper(api_response))
    }

    /// Read headers and the whole body, refusing bodies over the limit.
    async fn read_request(
        &self,
        req: Request<Incoming>,
    ) -> std::result::Result<ApiRequest, ApiResponse> {
        let (parts, body) = req.into_parts();
        let header_str = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let mut api_request = ApiRequest::new(parts.method.clone(), parts.uri.path());
        api_request.query = parts.uri.query().map(str::to_string);
        api_request.user_id = header_str(USER_HEADER).filter(|u| !u.is_empty());
        api_request.content_type = header_str(header::CONTENT_TYPE.as_str());

        api_request.body = match Limited::new(body, self.max_body_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return Err(plain(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large"));
            }
            Err(e) => {
                warn!(error = %e, "Failed to read request body");
                return Err(plain(StatusCode::BAD_REQUEST, "Failed to read request body"));
            }
        };
        Ok(api_request)
    }
}

fn plain(status: StatusCode, message: &str) -> ApiResponse {
    ApiResponse {
        status,
        content_type: "application/json".into(),
        body: Bytes::from(serde_json::json!({ "error": message }).to_string()),
    }
}

fn cors(headers: &mut HeaderMap) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, X-User-Id"),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
}

fn into_hyper(api: ApiResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(api.body));
    *response.status_mut() = api.status;
    let headers = response.headers_mut();
    let content_type = HeaderValue::from_str(&api.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    cors(headers);
    response
}
