//! JSON-lines front end: one request object per line, one response object per line.
//!
//! ```text
//! {"id": 1, "op": "availability", "propertyId": 1, "startDate": "2024-01-10", "endDate": "2024-01-12"}
//! {"id": 1, "status": 200, "body": {"available": true, "price": 100.0}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::context::RequestContext;
use crate::handlers::{Handlers, Response};
use crate::repository::{BookingRepository, PropertyRepository};

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    Availability {
        property_id: Option<Value>,
        start_date: Option<String>,
        end_date: Option<String>,
    },
    Book {
        #[serde(default)]
        body: Value,
    },
    #[serde(rename_all = "camelCase")]
    Cancel { booking_id: Option<Value> },
    #[serde(rename_all = "camelCase")]
    Property { property_id: Option<Value> },
    Search {
        #[serde(default)]
        body: Value,
    },
}

impl Request {
    pub fn op(&self) -> &'static str {
        match self {
            Request::Availability { .. } => "availability",
            Request::Book { .. } => "book",
            Request::Cancel { .. } => "cancel",
            Request::Property { .. } => "property",
            Request::Search { .. } => "search",
        }
    }
}

#[derive(Serialize)]
struct Reply<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(flatten)]
    response: &'a Response,
}

/// Path-style parameter as the handlers expect it: numbers and strings both accepted.
fn param(value: &Option<Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// Request body as raw text. A JSON string is taken verbatim.
fn raw_body(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub async fn handle<P, B>(
    handlers: &Handlers<P, B>,
    ctx: &RequestContext,
    request: Request,
) -> Response
where
    P: PropertyRepository,
    B: BookingRepository,
{
    match request {
        Request::Availability {
            property_id,
            start_date,
            end_date,
        } => {
            handlers
                .availability(
                    ctx,
                    param(&property_id).as_deref(),
                    start_date.as_deref(),
                    end_date.as_deref(),
                )
                .await
        }
        Request::Book { body } => handlers.book(ctx, &raw_body(&body)).await,
        Request::Cancel { booking_id } => handlers.cancel(ctx, param(&booking_id).as_deref()).await,
        Request::Property { property_id } => {
            handlers.property(ctx, param(&property_id).as_deref()).await
        }
        Request::Search { body } => handlers.search(ctx, &raw_body(&body)).await,
    }
}

/// Handle one input line. Blank lines produce no output.
pub async fn dispatch_line<P, B>(
    handlers: &Handlers<P, B>,
    ctx: &RequestContext,
    line: &str,
) -> Option<String>
where
    P: PropertyRepository,
    B: BookingRepository,
{
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (id, response) = match serde_json::from_str::<Value>(line) {
        Err(_) => (None, Response::error(400, "Invalid JSON")),
        Ok(mut value) => {
            let id = value.as_object_mut().and_then(|o| o.remove("id"));
            match serde_json::from_value::<Request>(value) {
                Ok(request) => {
                    debug!("driver: {} request", request.op());
                    (id, handle(handlers, ctx, request).await)
                }
                Err(e) => (id, Response::error(400, &format!("Invalid request: {e}"))),
            }
        }
    };

    let reply = Reply {
        id,
        response: &response,
    };
    Some(serde_json::to_string(&reply).unwrap_or_else(|e| {
        format!(r#"{{"status":500,"body":{{"error":"encoding response: {e}"}}}}"#)
    }))
}
