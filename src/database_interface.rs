use crate::schema::bookings::{self, dsl};
use crate::{
    backend::BookingBackend,
    error::{BookingError, BookingResult},
    types::Booking,
};
use chrono::{DateTime, Utc};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::Text;
use diesel::{
    Connection, ConnectionError, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl,
    RunQueryDsl, SelectableHelper,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error};
use uuid::Uuid;

impl From<DieselError> for BookingError {
    fn from(err: DieselError) -> Self {
        error!(%err, "Database error");
        BookingError::Storage("database error".into())
    }
}

#[derive(Clone)]
pub struct DatabaseInterface {
    connection: Arc<Mutex<PgConnection>>,
}

impl DatabaseInterface {
    pub fn new(database_url: &str) -> Result<Self, ConnectionError> {
        let connection = Self::establish_connection(database_url)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn establish_connection(database_url: &str) -> Result<PgConnection, ConnectionError> {
        PgConnection::establish(database_url)
    }

    fn connection(&self) -> BookingResult<MutexGuard<'_, PgConnection>> {
        self.connection.lock().map_err(|err| {
            error!(%err, "Database connection lock poisoned");
            BookingError::Storage("database unavailable".into())
        })
    }
}

impl BookingBackend for DatabaseInterface {
    fn bookings(&self) -> BookingResult<Vec<Booking>> {
        let mut connection = self.connection()?;
        let result = dsl::bookings
            .order((dsl::start_time.asc(), dsl::id.asc()))
            .select(Booking::as_select())
            .load(&mut *connection)?;
        Ok(result)
    }

    fn list_by_professional_between(
        &self,
        professional_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> BookingResult<Vec<Booking>> {
        let mut connection = self.connection()?;
        let result = dsl::bookings
            .filter(dsl::professional_id.eq(professional_id))
            .filter(dsl::start_time.lt(until))
            .filter(dsl::end_time.gt(from))
            .order((dsl::start_time.asc(), dsl::id.asc()))
            .select(Booking::as_select())
            .load(&mut *connection)?;
        Ok(result)
    }

    fn insert(&self, booking: Booking) -> BookingResult<()> {
        let mut connection = self.connection()?;
        connection.transaction::<_, BookingError, _>(|connection| {
            // Serializes writers of the same professional until commit.
            diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind::<Text, _>(booking.professional_id.as_str())
                .execute(connection)?;

            let conflicting = dsl::bookings
                .filter(dsl::professional_id.eq(&booking.professional_id))
                .filter(dsl::start_time.lt(booking.end))
                .filter(dsl::end_time.gt(booking.start))
                .select(dsl::id)
                .first::<Uuid>(connection)
                .optional()?;
            if let Some(conflicting) = conflicting {
                debug!(id = %booking.id, %conflicting, "Rejected overlapping booking");
                return Err(BookingError::Conflict {
                    slot: booking.start,
                    conflicting_booking_id: Some(conflicting),
                });
            }

            match diesel::insert_into(bookings::table)
                .values(&booking)
                .execute(connection)
            {
                Ok(_) => Ok(()),
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    Err(BookingError::Conflict {
                        slot: booking.start,
                        conflicting_booking_id: Some(booking.id),
                    })
                }
                Err(err) => Err(err.into()),
            }
        })
    }

    fn remove(&self, id: Uuid) -> BookingResult<Booking> {
        let mut connection = self.connection()?;
        diesel::delete(dsl::bookings.find(id))
            .returning(Booking::as_returning())
            .get_result(&mut *connection)
            .optional()?
            .ok_or(BookingError::NotFound { id })
    }
}
