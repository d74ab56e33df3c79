//! Error reporting for failed requests.
//!
//! The request layer hands over the route and the failure; the reporter
//! records one `"error"` span. The client only ever sees a generic 500.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;

use crate::observability::metrics;
use crate::telemetry::span::SpanStatus;
use crate::telemetry::tracer::Tracer;

pub const ERROR_SPAN: &str = "error";
pub const ERROR_COMPONENT: &str = "errorHandler";
pub const ERROR_CODE: i64 = 1;

/// Method plus route template of the failing request, e.g. `GET /users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLabel {
    method: String,
    route: Option<String>,
}

impl RouteLabel {
    pub fn new(method: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            route: Some(route.into()),
        }
    }

    /// Label for a request that failed before route resolution.
    pub fn unresolved(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            route: None,
        }
    }
}

impl fmt::Display for RouteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.route {
            Some(route) => write!(f, "{} {}", self.method, route),
            None => write!(f, "{} *", self.method),
        }
    }
}

/// Internal detail of a failure. Never sent to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    /// Cause chain and, when `RUST_BACKTRACE` enables it, a backtrace.
    pub stack: String,
}

impl Failure {
    pub fn new(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: stack.into(),
        }
    }

    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut lines = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            lines.push(format!("    caused by: {}", cause));
            source = cause.source();
        }
        push_backtrace(&mut lines);

        Self::new(err.to_string(), lines.join("\n"))
    }

    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };

        let mut lines = vec!["    panicked in request handler".to_string()];
        push_backtrace(&mut lines);
        Self::new(message, lines.join("\n"))
    }

    /// Message followed by the stack, the value recorded as `errMsg`.
    pub fn detail(&self) -> String {
        if self.stack.is_empty() {
            format!("Error: {}", self.message)
        } else {
            format!("Error: {}\n{}", self.message, self.stack)
        }
    }
}

fn push_backtrace(lines: &mut Vec<String>) {
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        lines.push(backtrace.to_string());
    }
}

/// Records request failures as `"error"` spans.
#[derive(Clone, Debug)]
pub struct ErrorReporter {
    tracer: Tracer,
}

impl ErrorReporter {
    pub fn new(tracer: Tracer) -> Self {
        Self { tracer }
    }

    /// Record `failure` for `route`. Never fails and never blocks on export.
    pub fn report_error(&self, route: &RouteLabel, failure: &Failure) {
        let route = route.to_string();

        self.tracer.in_span(ERROR_SPAN, |span| {
            span.set_attribute("component", ERROR_COMPONENT);
            span.set_attribute("errMsg", failure.detail());
            span.set_attribute("errorCode", ERROR_CODE);
            span.set_attribute("route", route.as_str());
            span.set_status(SpanStatus::Error);
        });

        metrics::record_handler_failure(&route);
        tracing::error!(route = %route, error = %failure.message, "Request failed");
    }
}
