//! Local store key layout.
//!
//! All keys live under the store's namespace; identity segments are the
//! user id when known, otherwise the session id.

pub const PENDING_EVENTS: &str = "pending_events";
pub const SESSION_ID: &str = "session_id";
pub const USER_ID: &str = "user_id";

pub fn flow_state(flow_key: &str, identity: &str) -> String {
    format!("flow_state:{flow_key}:{identity}")
}

pub fn flow_cache(key: &str) -> String {
    format!("flow_cache:{key}")
}

pub fn theme_cache(theme_id: &str) -> String {
    format!("theme_cache:{theme_id}")
}

pub fn variant_cache(flow_key: &str, identity: &str) -> String {
    format!("variant_cache:{flow_key}:{identity}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed_by_kind() {
        assert_eq!(flow_state("welcome", "u1"), "flow_state:welcome:u1");
        assert_eq!(flow_cache("active"), "flow_cache:active");
        assert_eq!(theme_cache("dark"), "theme_cache:dark");
        assert_eq!(variant_cache("welcome", "s-1"), "variant_cache:welcome:s-1");
    }
}
