//! Consumers of the booking event stream.
//!
//! The engine only emits [`BookingEvent`]s. Turning them into messages for
//! the client and the business happens here, outside the booking path, so a
//! slow or failing notifier never affects a commit.

use crate::types::{Booking, BookingEvent};
use futures::StreamExt;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{info, warn};

pub const DEFAULT_COUNTRY_CODE: &str = "55";

#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, event: &BookingEvent);
}

/// Display form of a digits-only phone number, e.g. `(11) 98765-4321`.
pub fn format_phone(digits: &str) -> String {
    let digits: String = digits.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        0..=2 => format!("({digits}"),
        3..=6 => format!("({}) {}", &digits[..2], &digits[2..]),
        7..=10 => format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
        _ => format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..11]),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Digits only, without country code.
    pub recipient: String,
    pub text: String,
}

/// Composes chat messages and click-to-chat links for each event.
#[derive(Debug, Clone)]
pub struct WhatsAppNotifier {
    business_name: String,
    business_phone: String,
    country_code: String,
}

impl WhatsAppNotifier {
    pub fn new(business_name: impl Into<String>, business_phone: &str) -> Self {
        Self {
            business_name: business_name.into(),
            business_phone: business_phone.chars().filter(char::is_ascii_digit).collect(),
            country_code: DEFAULT_COUNTRY_CODE.into(),
        }
    }

    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = country_code.into();
        self
    }

    pub fn link(&self, message: &Message) -> String {
        format!(
            "https://wa.me/{}{}?text={}",
            self.country_code,
            message.recipient,
            urlencoding::encode(&message.text)
        )
    }

    pub fn compose(&self, event: &BookingEvent) -> Vec<Message> {
        let booking = event.booking();
        let date = booking.start.format("%d/%m/%Y");
        let time = booking.start.format("%H:%M");
        let services = booking.services.join(", ");

        let (client_text, business_text) = match event {
            BookingEvent::Created(_) => (
                format!(
                    "*Booking confirmed - {}*\n\nHello {},\n\nYour booking is confirmed.\n\n\
                     *Date:* {date}\n*Time:* {time}\n*Professional:* {}\n*Services:* {services}\n\n\
                     Booking id: {}",
                    self.business_name, booking.client_name, booking.professional_id, booking.id
                ),
                format!(
                    "*NEW BOOKING*\n\n*Client:* {}\n*Phone:* {}\n*Date:* {date}\n*Time:* {time}\n\
                     *Professional:* {}\n*Services:* {services}\n\nId: {}",
                    booking.client_name,
                    format_phone(&booking.phone),
                    booking.professional_id,
                    booking.id
                ),
            ),
            BookingEvent::Cancelled(_) => (
                format!(
                    "*Booking cancelled - {}*\n\nYour booking for {services} on {date} at {time} was cancelled.",
                    self.business_name
                ),
                format!(
                    "*CANCELLATION*\n\nBooking {} of {} ({}) on {date} at {time} was cancelled.",
                    booking.id,
                    booking.client_name,
                    format_phone(&booking.phone)
                ),
            ),
        };

        vec![
            Message {
                recipient: booking.phone.clone(),
                text: client_text,
            },
            Message {
                recipient: self.business_phone.clone(),
                text: business_text,
            },
        ]
    }
}

impl Notifier for WhatsAppNotifier {
    fn notify(&self, event: &BookingEvent) {
        for message in self.compose(event) {
            info!(recipient = %message.recipient, link = %self.link(&message), "Notification ready");
        }
    }
}

/// Logs events without composing messages.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &BookingEvent) {
        let Booking {
            id,
            professional_id,
            start,
            ..
        } = event.booking();
        match event {
            BookingEvent::Created(_) => info!(%id, %professional_id, %start, "Booking created"),
            BookingEvent::Cancelled(_) => info!(%id, %professional_id, %start, "Booking cancelled"),
        }
    }
}

/// Feeds every event to `notifier` until the engine goes away.
pub async fn dispatch_notifications<N: Notifier>(
    mut events: BroadcastStream<BookingEvent>,
    notifier: N,
) {
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => notifier.notify(&event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Notification dispatcher fell behind, events dropped")
            }
        }
    }
}
