use std::time::{SystemTime, UNIX_EPOCH};

/// seconds since [UNIX_EPOCH], in the `f32` precision the on-disk records keep
pub fn now() -> f32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f32())
        .unwrap_or_default()
}

/// nanoseconds since [UNIX_EPOCH], used to seed disk signatures
pub fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}
