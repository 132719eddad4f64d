//! Response nonces.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static SENT: AtomicU64 = AtomicU64::new(0);
static EPOCH: OnceLock<u64> = OnceLock::new();

/// Next response nonce.
///
/// A gateway echoes the nonce in its ACK or NACK, which ties the reply to
/// one response. The process start time prefixes a running count, so nonces
/// from a restarted control plane never match ones issued before.
pub fn generate_nonce() -> String {
    let epoch = *EPOCH.get_or_init(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    });
    let sent = SENT.fetch_add(1, Ordering::Relaxed);
    format!("{epoch:x}-{sent}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_differ() {
        assert_ne!(generate_nonce(), generate_nonce());
    }

    #[test]
    fn nonces_share_the_process_prefix() {
        let a = generate_nonce();
        let b = generate_nonce();
        let prefix = |n: &str| n.split('-').next().map(str::to_owned);
        assert_eq!(prefix(&a), prefix(&b));
    }
}
