//! Transport-level responses produced by the frontend.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::engine::HttpArgs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpResponse {
    /// 200 with a SAML-bearing body (form-post binding).
    Content {
        body: String,
        headers: Vec<(String, String)>,
    },
    /// 302 to a SAML-bearing URL (redirect binding).
    Redirect { location: String },
    /// 401.
    Unauthorized { message: String },
    /// 500.
    ServiceError { message: String },
}

impl HttpResponse {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpResponse::Unauthorized {
            message: message.into(),
        }
    }

    pub fn service_error(message: impl Into<String>) -> Self {
        HttpResponse::ServiceError {
            message: message.into(),
        }
    }

    /// Turn engine transport output into a response.
    ///
    /// A body means form-post; otherwise a `Location` header means redirect.
    /// Output with neither is an engine inconsistency and becomes a service
    /// error rather than an empty success.
    pub fn from_http_args(mut args: HttpArgs) -> Self {
        if let Some(body) = args.data.take().filter(|data| !data.is_empty()) {
            return HttpResponse::Content {
                body,
                headers: args.headers,
            };
        }
        match args.header("Location") {
            Some(location) => HttpResponse::Redirect {
                location: location.to_string(),
            },
            None => HttpResponse::service_error("Don't know how to return response"),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HttpResponse::Content { .. } => StatusCode::OK,
            HttpResponse::Redirect { .. } => StatusCode::FOUND,
            HttpResponse::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            HttpResponse::ServiceError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            HttpResponse::Content { body, headers } => {
                let mut response = (status, body).into_response();
                let response_headers = response.headers_mut();
                // First engine value replaces any default; repeats are kept
                let mut seen: Vec<HeaderName> = Vec::new();
                for (name, value) in headers {
                    match (
                        HeaderName::try_from(name.as_str()),
                        HeaderValue::try_from(value.as_str()),
                    ) {
                        (Ok(name), Ok(value)) if seen.contains(&name) => {
                            response_headers.append(name, value);
                        }
                        (Ok(name), Ok(value)) => {
                            response_headers.insert(name.clone(), value);
                            seen.push(name);
                        }
                        _ => tracing::warn!(header = %name, "Dropping invalid engine header"),
                    }
                }
                response
            }
            HttpResponse::Redirect { location } => match HeaderValue::try_from(location) {
                Ok(location) => {
                    let mut response = Response::new(Body::empty());
                    *response.status_mut() = status;
                    response.headers_mut().insert(header::LOCATION, location);
                    response
                }
                Err(_) => {
                    tracing::error!("Engine produced a redirect location that is not a valid header");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Service error").into_response()
                }
            },
            HttpResponse::Unauthorized { message } | HttpResponse::ServiceError { message } => {
                (status, message).into_response()
            }
        }
    }
}
