/// Static event details; these come from configuration, not from the guest sheet.
#[derive(Debug, Clone, Default)]
pub struct EventDetails {
    pub couple_names: String,
    pub venue_name: String,
    pub venue_city: String,
    pub venue_address: String,
    /// RFC 3339 start time, e.g. `2026-12-05T12:00:00+08:00`.
    pub datetime: Option<String>,
}
