use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// Injected time source. Services never read the process clock directly so
/// tests can fix `created_at_ms` deterministically.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }
}

/// Injected identifier source. Generated identifiers must sort
/// lexicographically in creation order; the cursor tie-break relies on it.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> String;
}

#[derive(Clone, Debug, Default)]
pub struct UuidV7IdGenerator;

impl IdGenerator for UuidV7IdGenerator {
    fn new_id(&self) -> String {
        Uuid::now_v7().simple().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_v7_ids_are_32_hex_chars() {
        let id = UuidV7IdGenerator.new_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn uuid_v7_ids_sort_by_generation_time() {
        let first = UuidV7IdGenerator.new_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = UuidV7IdGenerator.new_id();
        assert!(first < second);
    }

    #[test]
    fn system_clock_is_past_2020() {
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}
