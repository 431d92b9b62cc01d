//! SHA256 + base36 plan id generation.

use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha256};

use drift_core::operation::MigrationOperation;

/// Base36 alphabet (0-9, a-z).
const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the derived id suffix.
const ID_LENGTH: usize = 8;

/// Converts a byte slice to a base36 string of exactly `length` characters.
///
/// Digits are written least-significant first into a zero-filled buffer, so
/// short values come out zero-padded and oversized values keep their low
/// digits.
pub fn encode_base36(data: &[u8], length: usize) -> String {
    let base = BigUint::from(36u32);
    let mut remaining = BigUint::from_bytes_be(data);

    let mut out = vec![b'0'; length];
    for slot in out.iter_mut().rev() {
        if remaining.is_zero() {
            break;
        }
        let digit = (&remaining % &base)
            .to_u32_digits()
            .first()
            .copied()
            .unwrap_or(0) as usize;
        *slot = BASE36_ALPHABET[digit];
        remaining /= &base;
    }

    String::from_utf8(out).expect("base36 chars are valid UTF-8")
}

/// Derives a deterministic plan id from an operation set.
///
/// Hashes the `(ordinal, object_name, sql)` identity of every operation, so
/// the same diff always compiles to the same plan id.
pub fn derive_plan_id(ops: &[MigrationOperation]) -> String {
    let mut h = Sha256::new();
    for op in ops {
        h.update(op.hash_input().as_bytes());
        h.update([0]);
    }
    let digest = h.finalize();
    format!("plan-{}", encode_base36(&digest[..5], ID_LENGTH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::enums::OperationKind;
    use drift_core::operation::OperationDetail;

    fn op(kind: OperationKind, name: &str) -> MigrationOperation {
        MigrationOperation::new(kind, name, format!("-- {name}"), OperationDetail::Data)
    }

    #[test]
    fn encode_base36_pads_to_length() {
        let s = encode_base36(&[0, 0, 1], 8);
        assert_eq!(s.len(), 8);
        assert!(s.starts_with('0'));
        assert!(s.ends_with('1'));
    }

    #[test]
    fn plan_id_is_deterministic() {
        let ops = vec![
            op(OperationKind::CreateTable, "users"),
            op(OperationKind::CreateIndex, "users_idx"),
        ];
        assert_eq!(derive_plan_id(&ops), derive_plan_id(&ops));
    }

    #[test]
    fn plan_id_depends_on_operations() {
        let a = vec![op(OperationKind::CreateTable, "users")];
        let b = vec![op(OperationKind::CreateTable, "accounts")];
        assert_ne!(derive_plan_id(&a), derive_plan_id(&b));
    }

    #[test]
    fn plan_id_shape() {
        let id = derive_plan_id(&[]);
        assert!(id.starts_with("plan-"));
        assert_eq!(id.len(), "plan-".len() + 8);
    }
}
