use crate::{
    backend::BookingBackend,
    booking_engine::BookingEngine,
    configuration::Configuration,
    error::{BookingError, BookingResult},
    types::{Booking, BookingEvent, BookingRequest, DaySlots},
};
use axum::extract::{Query, Request};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum::{
    routing::{get, post},
    Router,
};
use axum_valid::Valid;
use chrono::{NaiveDate, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState<B: BookingBackend, C: Configuration> {
    pub engine: BookingEngine<B>,
    pub configuration: C,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotsQuery {
    date: NaiveDate,
    #[serde(default)]
    professional_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DayQuery {
    professional_id: String,
    date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CancelRequest {
    id: Uuid,
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = match &self {
            BookingError::Validation { .. } | BookingError::ClosedDay { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            BookingError::Conflict { .. } => StatusCode::CONFLICT,
            BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
            BookingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        match &self {
            BookingError::Validation { field, .. } => body["field"] = json!(field),
            BookingError::Conflict {
                conflicting_booking_id: Some(id),
                ..
            } => body["conflicting_booking_id"] = json!(id),
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

pub fn create_app<B: BookingBackend, C: Configuration>(
    engine: BookingEngine<B>,
    configuration: C,
) -> Router {
    let state = AppState {
        engine,
        configuration,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/slots", get(get_slots::<B, C>))
        .route("/book", post(book::<B, C>))
        .route("/cancel", post(cancel::<B, C>))
        .route("/events", get(booking_events::<B, C>));

    let admin = Router::new()
        .route("/bookings", get(list_bookings::<B, C>))
        .route("/bookings/day", get(list_day_bookings::<B, C>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth::<B, C>,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .with_state(state)
        .layer(cors)
}

async fn admin_auth<B: BookingBackend, C: Configuration>(
    State(state): State<AppState<B, C>>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let Some(password) = state.configuration.password() else {
        warn!("Admin request rejected, no admin password configured");
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
    };

    if let Some(auth_header) = request.headers().get("x-admin-password") {
        if auth_header.to_str().unwrap_or("") != password {
            return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
        }
    } else {
        return Err((StatusCode::UNAUTHORIZED, "Missing credentials".to_string()));
    }
    Ok(next.run(request).await)
}

/// Runs an engine call on the blocking pool, the file and database stores
/// do synchronous I/O.
async fn run_blocking<T, F>(task: F) -> Result<T, BookingError>
where
    F: FnOnce() -> BookingResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|err| {
        error!(%err, "Booking task failed");
        BookingError::Storage("booking task failed".into())
    })?
}

async fn get_slots<B: BookingBackend, C: Configuration>(
    State(state): State<AppState<B, C>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<DaySlots>, BookingError> {
    let engine = state.engine;
    let slots =
        run_blocking(move || engine.get_slots(query.date, &query.professional_id, Utc::now()))
            .await?;
    Ok(Json(slots))
}

async fn book<B: BookingBackend, C: Configuration>(
    State(state): State<AppState<B, C>>,
    Valid(Json(request)): Valid<Json<BookingRequest>>,
) -> Result<Json<Booking>, BookingError> {
    debug!(professional_id = %request.professional_id, date = %request.date, time = %request.time, "Booking requested");
    let engine = state.engine;
    let booking = run_blocking(move || engine.submit(&request, Utc::now())).await?;
    Ok(Json(booking))
}

async fn cancel<B: BookingBackend, C: Configuration>(
    State(state): State<AppState<B, C>>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Booking>, BookingError> {
    let engine = state.engine;
    let booking = run_blocking(move || engine.cancel(request.id)).await?;
    Ok(Json(booking))
}

async fn list_bookings<B: BookingBackend, C: Configuration>(
    State(state): State<AppState<B, C>>,
) -> Result<Json<Vec<Booking>>, BookingError> {
    let engine = state.engine;
    Ok(Json(run_blocking(move || engine.bookings()).await?))
}

async fn list_day_bookings<B: BookingBackend, C: Configuration>(
    State(state): State<AppState<B, C>>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Vec<Booking>>, BookingError> {
    let engine = state.engine;
    let bookings =
        run_blocking(move || engine.bookings_on(&query.professional_id, query.date)).await?;
    Ok(Json(bookings))
}

async fn booking_events<B: BookingBackend, C: Configuration>(
    State(state): State<AppState<B, C>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = state.engine.subscribe().filter_map(|event| async move {
        let event = event.ok()?;
        let name = match &event {
            BookingEvent::Created(_) => "created",
            BookingEvent::Cancelled(_) => "cancelled",
        };
        Event::default().event(name).json_data(&event).ok().map(Ok)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        configuration_handler::ConfigurationHandler,
        schedule::Schedule,
        testutils::{booking_request, MockBookingBackend},
        types::SlotStatus,
    };
    use chrono::{Datelike, Duration, Weekday};
    use clap::Parser;
    use reqwest::Client;
    use std::sync::atomic::Ordering;
    use tokio::{task::JoinHandle, time::timeout};

    const ADMIN_PASSWORD: &str = "123";

    struct TestServer {
        server: JoinHandle<()>,
        backend: MockBookingBackend,
        address: String,
    }

    impl TestServer {
        fn url(&self, path: &str) -> String {
            format!("{}/{path}", self.address)
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            self.server.abort();
        }
    }

    async fn init() -> TestServer {
        let backend = MockBookingBackend::new();
        let engine = BookingEngine::new(backend.clone(), Schedule::default());
        let configuration =
            ConfigurationHandler::try_parse_from(["salon_booking", "--password", ADMIN_PASSWORD])
                .unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let app = create_app(engine, configuration);
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            server,
            backend,
            address,
        }
    }

    /// A future day the salon is open, as `YYYY-MM-DD`.
    fn next_open_day() -> String {
        let mut date = Utc::now().date_naive() + Duration::days(1);
        while matches!(date.weekday(), Weekday::Sun | Weekday::Mon) {
            date += Duration::days(1);
        }
        date.format("%Y-%m-%d").to_string()
    }

    fn next_closed_day() -> String {
        let mut date = Utc::now().date_naive() + Duration::days(1);
        while date.weekday() != Weekday::Sun {
            date += Duration::days(1);
        }
        date.format("%Y-%m-%d").to_string()
    }

    async fn post_booking(server: &TestServer, request: &BookingRequest) -> reqwest::Response {
        Client::new()
            .post(server.url("book"))
            .json(request)
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_slots() {
        let server = init().await;

        let response = Client::new()
            .get(server.url(&format!("slots?date={}&professional_id=P1", next_open_day())))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK.as_u16());
        let day_slots: DaySlots = response.json().await.unwrap();
        assert!(!day_slots.is_closed());
        assert_eq!(day_slots.slots.len(), 11);
        assert!(day_slots
            .slots
            .iter()
            .all(|slot| slot.status == SlotStatus::Available));
        assert_eq!(server.backend.0.calls_to_list.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_slots_closed_day() {
        let server = init().await;

        let response = Client::new()
            .get(server.url(&format!("slots?date={}&professional_id=P1", next_closed_day())))
            .send()
            .await
            .unwrap();
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["closed"], "closed_day");
        assert_eq!(body["slots"][0]["status"], "CLOSED");
    }

    #[tokio::test]
    async fn test_get_slots_rejects_malformed_date() {
        let server = init().await;

        let response = Client::new()
            .get(server.url("slots?date=05-03-2024&professional_id=P1"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST.as_u16());
        assert_eq!(server.backend.0.calls_to_list.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_book_and_cancel() {
        let server = init().await;
        let date = next_open_day();

        let response = post_booking(&server, &booking_request("P1", &date, "11:00")).await;
        assert_eq!(response.status(), StatusCode::OK.as_u16());
        let booking: Booking = response.json().await.unwrap();
        assert_eq!(booking.professional_id, "P1");
        assert_eq!(booking.end - booking.start, Duration::minutes(180));

        let response = post_booking(&server, &booking_request("P1", &date, "12:00")).await;
        assert_eq!(response.status(), StatusCode::CONFLICT.as_u16());
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "conflict");
        assert_eq!(body["conflicting_booking_id"], booking.id.to_string());

        let response = Client::new()
            .post(server.url("cancel"))
            .json(&CancelRequest { id: booking.id })
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK.as_u16());

        let response = Client::new()
            .post(server.url("cancel"))
            .json(&CancelRequest { id: booking.id })
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND.as_u16());

        assert_eq!(server.backend.0.calls_to_insert.load(Ordering::SeqCst), 1);
        assert_eq!(server.backend.0.calls_to_remove.load(Ordering::SeqCst), 2);
    }

    #[test_case::test_case ("123", "phone" ; "short phone")]
    #[test_case::test_case ("(99) 98765-4321", "phone" ; "unknown area code")]
    #[tokio::test]
    async fn test_book_validation_error(phone: &str, field: &str) {
        let server = init().await;
        let mut request = booking_request("P1", &next_open_day(), "11:00");
        request.phone = phone.into();

        let response = post_booking(&server, &request).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY.as_u16());
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "validation");
        assert_eq!(body["field"], field);
        assert_eq!(server.backend.0.calls_to_insert.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_book_closed_day() {
        let server = init().await;
        let response =
            post_booking(&server, &booking_request("P1", &next_closed_day(), "11:00")).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY.as_u16());
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "closed_day");
    }

    #[tokio::test]
    async fn test_book_oversized_payload() {
        let server = init().await;
        let mut request = booking_request("P1", &next_open_day(), "11:00");
        request.client_name = "x".repeat(500);

        let response = post_booking(&server, &request).await;
        assert!(response.status().is_client_error());
        assert_eq!(server.backend.0.calls_to_list.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_storage_failure() {
        let server = init().await;
        server.backend.0.success.store(false, Ordering::SeqCst);

        let response = post_booking(&server, &booking_request("P1", &next_open_day(), "11:00")).await;
        assert_eq!(
            response.status(),
            StatusCode::INTERNAL_SERVER_ERROR.as_u16()
        );
    }

    #[test_case::test_case (None, StatusCode::UNAUTHORIZED, 0)]
    #[test_case::test_case (Some("wrong"), StatusCode::UNAUTHORIZED, 0)]
    #[test_case::test_case (Some(ADMIN_PASSWORD), StatusCode::OK, 1)]
    #[tokio::test]
    async fn test_authorization(
        password: Option<&str>,
        status_code: StatusCode,
        expected_backend_calls: u64,
    ) {
        let server = init().await;

        let mut request_builder = Client::new().get(server.url("bookings"));
        if let Some(password) = password {
            request_builder = request_builder.header("x-admin-password", password);
        }
        let response = request_builder.send().await.unwrap();

        assert_eq!(response.status(), status_code.as_u16());
        assert_eq!(
            server.backend.0.calls_to_bookings.load(Ordering::SeqCst),
            expected_backend_calls
        );
    }

    #[tokio::test]
    async fn test_event_stream() {
        let server = init().await;

        let response = Client::new()
            .get(server.url("events"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK.as_u16());
        let mut events = Box::pin(response.bytes_stream());

        let booking: Booking = post_booking(&server, &booking_request("P1", &next_open_day(), "11:00"))
            .await
            .json()
            .await
            .unwrap();

        let mut received = String::new();
        while !received.contains(&booking.id.to_string()) {
            let chunk = timeout(std::time::Duration::from_secs(5), events.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            received.push_str(&String::from_utf8_lossy(&chunk));
        }
        assert!(received.contains("event: created"));
    }

    #[tokio::test]
    async fn test_get_slots_rejects_last_representable_day() {
        let server = init().await;

        let response = Client::new()
            .get(server.url("slots"))
            .query(&[("date", NaiveDate::MAX.to_string()), ("professional_id", "P1".into())])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY.as_u16());
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "validation");
        assert_eq!(body["field"], "date");
    }

    #[tokio::test]
    async fn test_list_day_bookings() {
        let server = init().await;
        let date = next_open_day();
        let booking: Booking = post_booking(&server, &booking_request("P1", &date, "11:00"))
            .await
            .json()
            .await
            .unwrap();

        for (professional_id, expected) in [("P1", vec![booking]), ("P2", vec![])] {
            let response = Client::new()
                .get(server.url("bookings/day"))
                .query(&[("professional_id", professional_id), ("date", date.as_str())])
                .header("x-admin-password", ADMIN_PASSWORD)
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK.as_u16());
            let bookings: Vec<Booking> = response.json().await.unwrap();
            assert_eq!(bookings, expected);
        }

        let response = Client::new()
            .get(server.url("bookings/day"))
            .query(&[("professional_id", "P1"), ("date", date.as_str())])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED.as_u16());
    }

    #[tokio::test]
    async fn test_failed_blocking_task_is_a_storage_error() {
        let result: Result<(), BookingError> =
            run_blocking(|| panic!("store call panicked")).await;
        assert!(matches!(result, Err(BookingError::Storage(_))));
    }
}
