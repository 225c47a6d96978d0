/// Fresh v4 UUID for task/tracepoint/capture ids.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Display form for long session ids: `ses_ab...wxyz`.
pub fn shorten_id(id: &str) -> String {
    if id.len() <= 14 || !id.is_char_boundary(6) || !id.is_char_boundary(id.len() - 4) {
        return id.to_string();
    }
    format!("{}...{}", &id[..6], &id[id.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ids_pass_through() {
        assert_eq!(shorten_id("ses_abc"), "ses_abc");
        assert_eq!(shorten_id("exactly14chars"), "exactly14chars");
    }

    #[test]
    fn long_ids_are_abbreviated() {
        assert_eq!(
            shorten_id("ses_0123456789abcdef0123"),
            "ses_01...0123"
        );
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}
