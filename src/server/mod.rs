//! HTTP/1 front end: `GET /?url=...` or `GET /single?url=...`.

use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;

use crate::check::Checker;
use crate::error::{CheckError, report};

pub const MISSING_URL_MESSAGE: &str = "No URL query parameter";

/// Pause after a failed accept, so errors such as fd exhaustion do not spin.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Serialize)]
struct ErrorBody {
    #[serde(rename = "errorMessage")]
    error_message: String,
}

/// Accepts connections until `shutdown` resolves. Each connection is served
/// on its own task; connections still open at shutdown are left to finish.
pub async fn serve<S>(listener: TcpListener, checker: Checker, shutdown: S)
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            (stream, peer) = accept_with_retry(|| listener.accept(), ACCEPT_RETRY_DELAY) => {

                let checker = checker.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| handle(req, checker.clone()));
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        log::debug!("Connection from {peer} closed with error: {e}");
                    }
                });
            }
            _ = &mut shutdown => {
                log::info!("Stopped accepting connections");
                break;
            }
        }
    }
}

/// Calls `accept` until it succeeds, sleeping `delay` after each failure.
async fn accept_with_retry<T, E, F, Fut>(mut accept: F, delay: Duration) -> T
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                log::warn!("Failed to accept connection: {e}");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn handle(
    req: Request<Incoming>,
    checker: Checker,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (status, body) = route(&checker, req.method(), req.uri().path(), req.uri().query()).await;
    log::debug!("{} {} -> {}", req.method(), req.uri(), status.as_u16());

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    Ok(response)
}

/// Maps a request line to a status and JSON body.
pub async fn route(
    checker: &Checker,
    method: &Method,
    path: &str,
    query: Option<&str>,
) -> (StatusCode, Bytes) {
    if !matches!(path, "/" | "/single") {
        return error(StatusCode::NOT_FOUND, format!("No route for {path}"));
    }
    if method != Method::GET {
        return error(StatusCode::METHOD_NOT_ALLOWED, format!("Method {method} not allowed"));
    }

    let Some(target) = query_param(query, "url").filter(|url| !url.is_empty()) else {
        return error(StatusCode::BAD_REQUEST, MISSING_URL_MESSAGE.to_string());
    };

    match checker.check(&target).await {
        Ok(check) => json(StatusCode::ACCEPTED, &check),
        Err(e @ CheckError::InvalidInput { .. }) => error(StatusCode::BAD_REQUEST, report(&e)),
        Err(e @ CheckError::ProbeFailed { .. }) => {
            error(StatusCode::INTERNAL_SERVER_ERROR, report(&e))
        }
    }
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn error(status: StatusCode, error_message: String) -> (StatusCode, Bytes) {
    json(status, &ErrorBody { error_message })
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> (StatusCode, Bytes) {
    match serde_json::to_vec(value) {
        Ok(body) => (status, Bytes::from(body)),
        Err(e) => {
            log::error!("Failed to encode response body: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"errorMessage":"Failed to encode response"}"#),
            )
        }
    }
}
