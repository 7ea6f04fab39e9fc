use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

/// Random reference for a user-initiated transaction, e.g. `TXN-8F2KQ0ZL1M3A`.
pub fn generate() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("TXN-{}", suffix.to_uppercase())
}

/// Deterministic reference for the n-th settlement credit of an order, so a
/// retried settlement lands on the same references.
pub fn settlement(order_id: Uuid, step: usize) -> String {
    format!("STL-{}-{}", order_id.simple(), step)
}

pub fn refund(order_id: Uuid) -> String {
    format!("RFD-{}", order_id.simple())
}

pub fn order_payment(order_id: Uuid) -> String {
    format!("PAY-{}", order_id.simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_reference_shape() {
        let r = generate();
        assert!(r.starts_with("TXN-"));
        assert_eq!(r.len(), 16);
        assert!(r[4..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_ne!(generate(), generate());
    }

    #[test]
    fn test_order_references_are_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(settlement(id, 2), settlement(id, 2));
        assert_ne!(settlement(id, 1), settlement(id, 2));
        assert_eq!(refund(id), format!("RFD-{}", id.simple()));
    }
}
