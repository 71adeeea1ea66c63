use rand::Rng;

const PREFIX: &str = "TXN";
const SUFFIX_LEN: usize = 8;

/// `TXN{transaction_id}_{8 hex chars}`, with a fresh suffix per attempt.
pub fn mint(transaction_id: i64) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("{}{}_{:08x}", PREFIX, transaction_id, suffix)
}

/// Recovers the transaction id, or `None` if `merchant_order_id` was not
/// minted by [`mint`].
pub fn transaction_id(merchant_order_id: &str) -> Option<i64> {
    let rest = merchant_order_id.strip_prefix(PREFIX)?;
    let (id, suffix) = rest.split_once('_')?;

    if suffix.len() != SUFFIX_LEN || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    id.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_encode_the_transaction() {
        let order_id = mint(42);
        assert!(order_id.starts_with("TXN42_"));
        assert_eq!(order_id.len(), "TXN42_".len() + SUFFIX_LEN);
        assert_eq!(transaction_id(&order_id), Some(42));
    }

    #[test]
    fn repeated_attempts_get_distinct_ids() {
        let ids: std::collections::HashSet<String> = (0..50).map(|_| mint(7)).collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn foreign_ids_are_rejected() {
        assert_eq!(transaction_id("TXN42"), None);
        assert_eq!(transaction_id("ORD42_0000abcd"), None);
        assert_eq!(transaction_id("TXN_0000abcd"), None);
        assert_eq!(transaction_id("TXN-4_0000abcd"), None);
        assert_eq!(transaction_id("TXN42_xyz"), None);
        assert_eq!(transaction_id("TXN42_0000abcd"), Some(42));
    }
}
