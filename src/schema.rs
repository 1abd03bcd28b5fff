diesel::table! {
    bookings (id) {
        id -> Uuid,
        client_name -> Text,
        phone -> Text,
        professional_id -> Text,
        // Elements are never NULL, so the array maps to Vec<String>.
        services -> Array<Text>,
        start_time -> Timestamptz,
        end_time -> Timestamptz,
        created_at -> Timestamptz,
    }
}
