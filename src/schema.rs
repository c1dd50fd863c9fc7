// Hand-aligned with the migrations that would produce this shape; no migration
// tooling is carried by this crate, so this file plays the role the generated
// schema.rs would play in a fully migrated deployment.

pub mod sql_types {
    #[derive(diesel::query_builder::QueryId, diesel::sql_types::SqlType)]
    #[diesel(postgres_type(name = "booking_status"))]
    pub struct BookingStatus;

    #[derive(diesel::query_builder::QueryId, diesel::sql_types::SqlType)]
    #[diesel(postgres_type(name = "seat_status"))]
    pub struct SeatStatus;

    #[derive(diesel::query_builder::QueryId, diesel::sql_types::SqlType)]
    #[diesel(postgres_type(name = "waitlist_status"))]
    pub struct WaitlistStatus;

    #[derive(diesel::query_builder::QueryId, diesel::sql_types::SqlType)]
    #[diesel(postgres_type(name = "booking_history_action"))]
    pub struct BookingHistoryAction;
}

diesel::table! {
    users (id) {
        id -> Uuid,
        #[max_length = 320]
        email -> Varchar,
        #[max_length = 255]
        password_hash -> Varchar,
        #[max_length = 100]
        first_name -> Varchar,
        #[max_length = 100]
        last_name -> Varchar,
        is_admin -> Bool,
        is_active -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    events (id) {
        id -> Uuid,
        #[max_length = 255]
        name -> Varchar,
        description -> Nullable<Text>,
        #[max_length = 255]
        venue -> Varchar,
        event_date -> Timestamptz,
        total_capacity -> Int4,
        available_capacity -> Int4,
        price -> Numeric,
        has_seat_selection -> Bool,
        version -> Int4,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use super::sql_types::SeatStatus;

    seats (id) {
        id -> Uuid,
        event_id -> Uuid,
        #[max_length = 50]
        section -> Varchar,
        #[max_length = 10]
        row_label -> Varchar,
        number -> Int4,
        price -> Numeric,
        status -> SeatStatus,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use super::sql_types::BookingStatus;

    bookings (id) {
        id -> Uuid,
        user_id -> Uuid,
        event_id -> Uuid,
        quantity -> Int4,
        total_amount -> Numeric,
        status -> BookingStatus,
        expires_at -> Nullable<Timestamptz>,
        #[max_length = 255]
        payment_reference -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    seat_bookings (booking_id, seat_id) {
        booking_id -> Uuid,
        seat_id -> Uuid,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use super::sql_types::WaitlistStatus;

    waitlist (id) {
        id -> Uuid,
        user_id -> Uuid,
        event_id -> Uuid,
        requested_quantity -> Int4,
        position -> Int4,
        status -> WaitlistStatus,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use super::sql_types::BookingHistoryAction;

    booking_history (id) {
        id -> Uuid,
        booking_id -> Uuid,
        action -> BookingHistoryAction,
        details -> Nullable<Text>,
        performed_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    locks (key) {
        #[max_length = 255]
        key -> Varchar,
        #[max_length = 64]
        owner -> Varchar,
        expires_at -> Timestamptz,
    }
}

diesel::joinable!(seats -> events (event_id));
diesel::joinable!(bookings -> events (event_id));
diesel::joinable!(bookings -> users (user_id));
diesel::joinable!(seat_bookings -> bookings (booking_id));
diesel::joinable!(seat_bookings -> seats (seat_id));
diesel::joinable!(waitlist -> events (event_id));
diesel::joinable!(waitlist -> users (user_id));
diesel::joinable!(booking_history -> bookings (booking_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    events,
    seats,
    bookings,
    seat_bookings,
    waitlist,
    booking_history,
    locks,
);
