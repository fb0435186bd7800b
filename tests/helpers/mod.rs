//! In-process stand-in for the booking service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub const TOKEN: &str = "test-token";

#[derive(Default)]
struct Otp {
    code: String,
    expired: bool,
    verified: bool,
}

#[derive(Default)]
pub struct StubBooking {
    jobs: Mutex<Vec<Value>>,
    otps: Mutex<HashMap<i64, Otp>>,
    issued: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub fail_list: AtomicBool,
}

type Reply = (StatusCode, Json<Value>);

fn reply(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "success": false, "message": message })))
}

impl StubBooking {
    /// The code most recently issued for a job.
    pub fn issued_code(&self, id: i64) -> Option<String> {
        self.otps.lock().unwrap().get(&id).map(|o| o.code.clone())
    }

    pub fn expire_code(&self, id: i64) {
        if let Some(otp) = self.otps.lock().unwrap().get_mut(&id) {
            otp.expired = true;
        }
    }

    pub fn status_of(&self, id: i64) -> Option<String> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j["booking_id"] == id)
            .and_then(|j| j["status"].as_str().map(str::to_string))
    }

    pub fn sends(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn verifies(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    fn authorized(headers: &HeaderMap) -> Result<(), Reply> {
        let expected = format!("Bearer {TOKEN}");
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some(value) if value == expected => Ok(()),
            Some(_) => Err(reply(StatusCode::UNAUTHORIZED, "Invalid token!")),
            None => Err(reply(StatusCode::UNAUTHORIZED, "Token is missing!")),
        }
    }

    fn find(&self, id: i64) -> Option<Value> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j["booking_id"] == id)
            .cloned()
    }
}

/// Columns of the assigned-services listing: login name only, no contact details.
fn list_row(row: &Value) -> Value {
    json!({
        "booking_id": row["booking_id"],
        "service_name": row["service_name"],
        "booking_date": row["booking_date"],
        "status": row["status"],
        "location_lat": row["location_lat"],
        "location_lng": row["location_lng"],
        "username": row["username"],
    })
}

/// Columns of the service detail: full customer name and contact details.
fn detail_row(row: &Value) -> Value {
    let mut detail = row.clone();
    if let Some(fields) = detail.as_object_mut() {
        fields.remove("username");
    }
    detail
}

async fn assigned(State(stub): State<Arc<StubBooking>>, headers: HeaderMap) -> Reply {
    if let Err(e) = StubBooking::authorized(&headers) {
        return e;
    }
    if stub.fail_list.load(Ordering::SeqCst) {
        return reply(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }
    let jobs: Vec<Value> = stub.jobs.lock().unwrap().iter().map(list_row).collect();
    (StatusCode::OK, Json(json!({ "assigned_services": jobs })))
}

async fn history(State(stub): State<Arc<StubBooking>>, headers: HeaderMap) -> Reply {
    if let Err(e) = StubBooking::authorized(&headers) {
        return e;
    }
    let done: Vec<Value> = stub
        .jobs
        .lock()
        .unwrap()
        .iter()
        .filter(|j| j["status"] == "completed")
        .map(list_row)
        .collect();
    (StatusCode::OK, Json(json!({ "assigned_services": done })))
}

async fn detail(
    State(stub): State<Arc<StubBooking>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Reply {
    if let Err(e) = StubBooking::authorized(&headers) {
        return e;
    }
    match stub.find(id) {
        Some(job) => (StatusCode::OK, Json(json!({ "success": true, "details": detail_row(&job) }))),
        None => reply(StatusCode::NOT_FOUND, "Booking not found"),
    }
}

async fn send_otp(
    State(stub): State<Arc<StubBooking>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Reply {
    if let Err(e) = StubBooking::authorized(&headers) {
        return e;
    }
    stub.send_calls.fetch_add(1, Ordering::SeqCst);
    if stub.find(id).is_none() {
        return reply(StatusCode::FORBIDDEN, "Unauthorized");
    }
    let n = stub.issued.fetch_add(1, Ordering::SeqCst);
    let code = format!("{:06}", 100_000 + n * 7_919);
    stub.otps.lock().unwrap().insert(
        id,
        Otp {
            code,
            ..Otp::default()
        },
    );
    (StatusCode::OK, Json(json!({ "success": true, "message": "OTP sent to user" })))
}

#[derive(Deserialize)]
struct VerifyBody {
    otp: Option<String>,
}

async fn verify_otp(
    State(stub): State<Arc<StubBooking>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<VerifyBody>,
) -> Reply {
    if let Err(e) = StubBooking::authorized(&headers) {
        return e;
    }
    stub.verify_calls.fetch_add(1, Ordering::SeqCst);

    let mut otps = stub.otps.lock().unwrap();
    let Some(otp) = otps.get_mut(&id) else {
        return reply(StatusCode::BAD_REQUEST, "OTP not sent");
    };
    if otp.verified {
        return reply(StatusCode::BAD_REQUEST, "OTP already used");
    }
    if body.otp.as_deref() != Some(otp.code.as_str()) {
        return reply(StatusCode::UNAUTHORIZED, "Invalid OTP");
    }
    if otp.expired {
        return reply(StatusCode::GONE, "OTP expired");
    }
    otp.verified = true;
    drop(otps);

    if let Some(job) = stub
        .jobs
        .lock()
        .unwrap()
        .iter_mut()
        .find(|j| j["booking_id"] == id)
    {
        job["status"] = json!("completed");
    }
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Booking marked as completed" })),
    )
}

/// Serve a booking stub seeded with `jobs`. Returns its base URL (with the
/// `/technician` prefix) and a handle for inspecting calls.
pub async fn start_booking_stub(jobs: Vec<Value>) -> (String, Arc<StubBooking>) {
    let stub = Arc::new(StubBooking {
        jobs: Mutex::new(jobs),
        ..StubBooking::default()
    });

    let api = Router::new()
        .route("/assigned-services", get(assigned))
        .route("/service-history", get(history))
        .route("/service/{id}", get(detail))
        .route("/service/{id}/send_otp", post(send_otp))
        .route("/service/{id}/verify_otp", post(verify_otp))
        .with_state(stub.clone());
    let app = Router::new().nest("/technician", api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/technician"), stub)
}

/// A local address nothing is listening on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/technician")
}
