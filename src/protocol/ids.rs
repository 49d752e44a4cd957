//! Locally generated correlation identifiers

/// 16 random bytes, lowercase hex (32 characters)
pub fn new_task_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
