// Nest's fixed room ("where") identifiers.

const ROOMS: &[(&str, &str)] = &[
    ("00000000-0000-0000-0000-000100000000", "Entryway"),
    ("00000000-0000-0000-0000-000100000001", "Basement"),
    ("00000000-0000-0000-0000-000100000002", "Hallway"),
    ("00000000-0000-0000-0000-000100000003", "Den"),
    ("00000000-0000-0000-0000-000100000004", "Attic"),
    ("00000000-0000-0000-0000-000100000005", "Master Bedroom"),
    ("00000000-0000-0000-0000-000100000006", "Downstairs"),
    ("00000000-0000-0000-0000-000100000007", "Garage"),
    ("00000000-0000-0000-0000-000100000008", "Kids Room"),
    ("00000000-0000-0000-0000-000100000009", "Garage \"Hallway\""),
    ("00000000-0000-0000-0000-00010000000a", "Kitchen"),
    ("00000000-0000-0000-0000-00010000000b", "Family Room"),
    ("00000000-0000-0000-0000-00010000000c", "Living Room"),
    ("00000000-0000-0000-0000-00010000000d", "Bedroom"),
    ("00000000-0000-0000-0000-00010000000e", "Office"),
    ("00000000-0000-0000-0000-00010000000f", "Upstairs"),
    ("00000000-0000-0000-0000-000100000010", "Dining Room"),
];

/// Room name for a Nest `where_id`, if it is one of the built-in rooms.
pub fn room_name(where_id: &str) -> Option<&'static str> {
    ROOMS
        .iter()
        .find(|(id, _)| id.eq_ignore_ascii_case(where_id))
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_rooms_resolve() {
        assert_eq!(
            room_name("00000000-0000-0000-0000-00010000000c"),
            Some("Living Room")
        );
        assert_eq!(
            room_name("00000000-0000-0000-0000-00010000000C"),
            Some("Living Room")
        );
    }

    #[test]
    fn custom_rooms_are_unknown() {
        assert_eq!(room_name("8a2d9b1e-0000-0000-0000-000000000000"), None);
    }
}
