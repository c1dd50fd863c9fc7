use crate::schema::{booking_history, bookings, events, locks, seat_bookings, seats, users, waitlist};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::{
    deserialize::{self, FromSql},
    pg::{Pg, PgValue},
    serialize::{self, Output, ToSql},
    sql_types::Text,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Insertable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = events)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub venue: String,
    pub event_date: DateTime<Utc>,
    pub total_capacity: i32,
    pub available_capacity: i32,
    pub price: BigDecimal,
    pub has_seat_selection: bool,
    pub version: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = events)]
pub struct NewEvent {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub venue: String,
    pub event_date: DateTime<Utc>,
    pub total_capacity: i32,
    pub available_capacity: i32,
    pub price: BigDecimal,
    pub has_seat_selection: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::SeatStatus)]
pub enum SeatStatus {
    Available,
    Held,
    Booked,
    Blocked,
}

impl ToSql<crate::schema::sql_types::SeatStatus, Pg> for SeatStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Held => "HELD",
            SeatStatus::Booked => "BOOKED",
            SeatStatus::Blocked => "BLOCKED",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::SeatStatus, Pg> for SeatStatus {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "AVAILABLE" => Ok(SeatStatus::Available),
            "HELD" => Ok(SeatStatus::Held),
            "BOOKED" => Ok(SeatStatus::Booked),
            "BLOCKED" => Ok(SeatStatus::Blocked),
            s => Err(format!("unrecognized seat status: {s}").into()),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = seats)]
pub struct Seat {
    pub id: Uuid,
    pub event_id: Uuid,
    pub section: String,
    pub row_label: String,
    pub number: i32,
    pub price: BigDecimal,
    pub status: SeatStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = seats)]
pub struct NewSeat {
    pub id: Uuid,
    pub event_id: Uuid,
    pub section: String,
    pub row_label: String,
    pub number: i32,
    pub price: BigDecimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::BookingStatus)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl ToSql<crate::schema::sql_types::BookingStatus, Pg> for BookingStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Expired => "EXPIRED",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::BookingStatus, Pg> for BookingStatus {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "EXPIRED" => Ok(BookingStatus::Expired),
            s => Err(format!("unrecognized booking status: {s}").into()),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = bookings)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    pub total_amount: BigDecimal,
    pub status: BookingStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bookings)]
pub struct NewBooking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    pub total_amount: BigDecimal,
    pub status: BookingStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Queryable, Insertable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = seat_bookings)]
pub struct SeatBooking {
    pub booking_id: Uuid,
    pub seat_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::WaitlistStatus)]
pub enum WaitlistStatus {
    Active,
    Notified,
    Expired,
    Converted,
}

impl WaitlistStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WaitlistStatus::Expired | WaitlistStatus::Converted)
    }

    pub fn is_non_terminal(self) -> bool {
        !self.is_terminal()
    }
}

impl ToSql<crate::schema::sql_types::WaitlistStatus, Pg> for WaitlistStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            WaitlistStatus::Active => "ACTIVE",
            WaitlistStatus::Notified => "NOTIFIED",
            WaitlistStatus::Expired => "EXPIRED",
            WaitlistStatus::Converted => "CONVERTED",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::WaitlistStatus, Pg> for WaitlistStatus {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "ACTIVE" => Ok(WaitlistStatus::Active),
            "NOTIFIED" => Ok(WaitlistStatus::Notified),
            "EXPIRED" => Ok(WaitlistStatus::Expired),
            "CONVERTED" => Ok(WaitlistStatus::Converted),
            s => Err(format!("unrecognized waitlist status: {s}").into()),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = waitlist)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub requested_quantity: i32,
    pub position: i32,
    pub status: WaitlistStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = waitlist)]
pub struct NewWaitlistEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub requested_quantity: i32,
    pub position: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::BookingHistoryAction)]
pub enum BookingHistoryAction {
    Created,
    Confirmed,
    Cancelled,
    Expired,
    Modified,
}

impl ToSql<crate::schema::sql_types::BookingHistoryAction, Pg> for BookingHistoryAction {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            BookingHistoryAction::Created => "CREATED",
            BookingHistoryAction::Confirmed => "CONFIRMED",
            BookingHistoryAction::Cancelled => "CANCELLED",
            BookingHistoryAction::Expired => "EXPIRED",
            BookingHistoryAction::Modified => "MODIFIED",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::BookingHistoryAction, Pg> for BookingHistoryAction {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "CREATED" => Ok(BookingHistoryAction::Created),
            "CONFIRMED" => Ok(BookingHistoryAction::Confirmed),
            "CANCELLED" => Ok(BookingHistoryAction::Cancelled),
            "EXPIRED" => Ok(BookingHistoryAction::Expired),
            "MODIFIED" => Ok(BookingHistoryAction::Modified),
            s => Err(format!("unrecognized booking history action: {s}").into()),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = booking_history)]
pub struct BookingHistoryEntry {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub action: BookingHistoryAction,
    pub details: Option<String>,
    pub performed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = booking_history)]
pub struct NewBookingHistoryEntry {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub action: BookingHistoryAction,
    pub details: Option<String>,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Insertable, Selectable)]
#[diesel(table_name = locks)]
pub struct LockRow {
    pub key: String,
    pub owner: String,
    pub expires_at: DateTime<Utc>,
}
