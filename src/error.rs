use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use quick_xml::escape::escape;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing parameter value: {0}")]
    MissingParameterValue(String),

    #[error("Invalid parameter value for {locator}: {message}")]
    InvalidParameterValue { locator: String, message: String },

    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid XML: {0}")]
    InvalidXml(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn invalid_parameter(locator: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::InvalidParameterValue {
            locator: locator.into(),
            message: message.into(),
        }
    }
}

impl From<quick_xml::Error> for AppError {
    fn from(e: quick_xml::Error) -> Self {
        AppError::InvalidXml(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for AppError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        AppError::InvalidXml(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Upstream(e.to_string())
    }
}

/// An OWS 1.1 exception, the error format WFS clients expect.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionReport {
    pub code: &'static str,
    pub locator: Option<String>,
    pub text: String,
}

impl ExceptionReport {
    pub fn to_xml(&self) -> String {
        let locator = self
            .locator
            .as_ref()
            .map(|l| format!(" locator=\"{}\"", escape(l.as_str())))
            .unwrap_or_default();

        format!(
            "<ows:ExceptionReport xmlns:ows=\"http://www.opengis.net/ows\" version=\"1.1.0\">\
             <ows:Exception exceptionCode=\"{}\"{}>\
             <ows:ExceptionText>{}</ows:ExceptionText>\
             </ows:Exception></ows:ExceptionReport>",
            self.code,
            locator,
            escape(self.text.as_str())
        )
    }
}

impl AppError {
    fn status_and_report(&self) -> (StatusCode, ExceptionReport) {
        let report = |code, locator: Option<&str>, text: String| ExceptionReport {
            code,
            locator: locator.map(str::to_string),
            text,
        };

        match self {
            AppError::MissingParameterValue(locator) => (
                StatusCode::BAD_REQUEST,
                report(
                    "MissingParameterValue",
                    Some(locator.as_str()),
                    format!("Missing parameter: {}", locator),
                ),
            ),
            AppError::InvalidParameterValue { locator, message } => (
                StatusCode::BAD_REQUEST,
                report("InvalidParameterValue", Some(locator.as_str()), message.clone()),
            ),
            AppError::OperationNotSupported(op) => (
                StatusCode::BAD_REQUEST,
                report(
                    "OperationNotSupported",
                    Some(op.as_str()),
                    format!("Operation {} is not supported", op),
                ),
            ),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                report("AccessDenied", None, msg.clone()),
            ),
            AppError::AccessDenied(msg) => (
                StatusCode::FORBIDDEN,
                report("AccessDenied", None, msg.clone()),
            ),
            AppError::InvalidXml(msg) => (
                StatusCode::BAD_REQUEST,
                report("InvalidParameterValue", None, format!("Invalid XML: {}", msg)),
            ),
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    report(
                        "NoApplicableCode",
                        None,
                        "The feature service could not be reached".to_string(),
                    ),
                )
            }
            AppError::Config(msg) => {
                tracing::error!("Config error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    report("NoApplicableCode", None, "Configuration error".to_string()),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, report) = self.status_and_report();

        (
            status,
            [(header::CONTENT_TYPE, "application/xml")],
            report.to_xml(),
        )
            .into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
