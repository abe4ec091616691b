/// Max characters in a name, tax id, unit number, or term text field.
pub const MAX_FIELD_LEN: usize = 200;

/// Max characters in a liability declaration.
pub const MAX_DECLARATION_LEN: usize = 10_000;

/// Max guests on one booking's roster.
pub const MAX_GUESTS_PER_BOOKING: usize = 500;
