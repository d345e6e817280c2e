//! Serialization and deserialization -related logic.

use std::borrow::Borrow;

/// A trait for types that can serialize and deserialize keys for storage
/// access.
pub trait StateKeyCodec<K> {
    /// Error type that can arise during deserialization.
    type KeyError: std::fmt::Debug;

    /// Serializes a key into a bytes vector.
    ///
    /// This method **must** not panic as all instances of the key type are
    /// supposed to be serializable.
    fn encode_key(&self, key: &K) -> Vec<u8>;

    /// Tries to deserialize a key from a bytes slice, and returns a
    /// [`Result`] with either the deserialized key or an error.
    fn try_decode_key(&self, bytes: &[u8]) -> Result<K, Self::KeyError>;

    /// Deserializes a key from a bytes slice.
    ///
    /// # Panics
    /// Panics if the call to [`StateKeyCodec::try_decode_key`] fails. Use
    /// [`StateKeyCodec::try_decode_key`] if you need to gracefully handle
    /// errors.
    fn decode_key(&self, bytes: &[u8]) -> K {
        self.try_decode_key(bytes).unwrap_or_else(|err| {
            panic!(
                "Failed to decode key 0x{}, error: {:?}",
                hex::encode(bytes),
                err
            )
        })
    }
}

/// A trait for types that can serialize and deserialize values for storage
/// access.
pub trait StateValueCodec<V> {
    /// Error type that can arise during deserialization.
    type ValueError: std::fmt::Debug;

    /// Serializes a value into a bytes vector.
    ///
    /// This method **must** not panic as all instances of the value type are
    /// supposed to be serializable.
    fn encode_value(&self, value: &V) -> Vec<u8>;

    /// Tries to deserialize a value from a bytes slice, and returns a
    /// [`Result`] with either the deserialized value or an error.
    fn try_decode_value(&self, bytes: &[u8]) -> Result<V, Self::ValueError>;

    /// Deserializes a value from a bytes slice.
    ///
    /// # Panics
    /// Panics if the call to [`StateValueCodec::try_decode_value`] fails. Use
    /// [`StateValueCodec::try_decode_value`] if you need to gracefully handle
    /// errors.
    fn decode_value(&self, bytes: &[u8]) -> V {
        self.try_decode_value(bytes).unwrap_or_else(|err| {
            panic!(
                "Failed to decode value 0x{}, error: {:?}",
                hex::encode(bytes),
                err
            )
        })
    }
}

/// A market trait for types that implement both [`StateKeyCodec`] and
/// [`StateValueCodec`].
pub trait StateCodec<K, V>: StateKeyCodec<K> + StateValueCodec<V> {}

impl<K, V, C> StateCodec<K, V> for C where C: StateKeyCodec<K> + StateValueCodec<V> {}

/// Encodes a borrowed form `Q` of a key `K` to exactly the bytes `K` itself
/// would encode to, so that maps can be queried without an owned key.
pub trait EncodeKeyLike<Q: ?Sized, K> {
    /// Encodes a reference to `Q` as if it were a reference to `K`.
    fn encode_key_like(&self, borrowed: &Q) -> Vec<u8>;
}

/// Encodes a leading component `P` of a composite key.
///
/// The output must be a byte prefix of the encoding of every key whose
/// leading component equals `P`. Prefix scans over a map rely on it.
pub trait EncodeKeyPrefix<P: ?Sized> {
    /// Encodes the key prefix.
    fn encode_key_prefix(&self, prefix: &P) -> Vec<u8>;
}

/// A [`StateCodec`] that uses [`borsh`] for all keys and values.
///
/// Borsh encodes tuples and structs as the concatenation of their fields, so
/// the encoding of the first field(s) is a prefix of the encoding of the
/// whole key. Types that need keys to sort in a particular order (timestamps)
/// control that through their own `BorshSerialize` impl.
#[derive(Debug, Default, PartialEq, Eq, Clone, borsh::BorshDeserialize, borsh::BorshSerialize)]
pub struct BorshCodec;

impl<K> StateKeyCodec<K> for BorshCodec
where
    K: borsh::BorshSerialize + borsh::BorshDeserialize,
{
    type KeyError = std::io::Error;

    fn encode_key(&self, key: &K) -> Vec<u8> {
        key.try_to_vec().expect("Failed to serialize key")
    }

    fn try_decode_key(&self, bytes: &[u8]) -> Result<K, Self::KeyError> {
        K::try_from_slice(bytes)
    }
}

impl<V> StateValueCodec<V> for BorshCodec
where
    V: borsh::BorshSerialize + borsh::BorshDeserialize,
{
    type ValueError = std::io::Error;

    fn encode_value(&self, value: &V) -> Vec<u8> {
        value.try_to_vec().expect("Failed to serialize value")
    }

    fn try_decode_value(&self, bytes: &[u8]) -> Result<V, Self::ValueError> {
        V::try_from_slice(bytes)
    }
}

impl<Q, K> EncodeKeyLike<Q, K> for BorshCodec
where
    K: Borrow<Q>,
    Q: borsh::BorshSerialize + ?Sized,
{
    fn encode_key_like(&self, borrowed: &Q) -> Vec<u8> {
        borrowed.try_to_vec().expect("Failed to serialize key")
    }
}

impl<P> EncodeKeyPrefix<P> for BorshCodec
where
    P: borsh::BorshSerialize + ?Sized,
{
    fn encode_key_prefix(&self, prefix: &P) -> Vec<u8> {
        prefix.try_to_vec().expect("Failed to serialize key prefix")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_prefix_is_prefix_of_full_key() {
        let codec = BorshCodec;
        let full = StateKeyCodec::<(String, u8, [u8; 4])>::encode_key(
            &codec,
            &("rollapp_1234-1".to_string(), 2, [9; 4]),
        );
        let prefix = codec.encode_key_prefix(&"rollapp_1234-1".to_string());
        assert!(full.starts_with(&prefix));

        let other = codec.encode_key_prefix(&"rollapp_1234".to_string());
        assert!(!full.starts_with(&other));
    }

    #[test]
    fn borrowed_key_encodes_like_owned() {
        let codec = BorshCodec;
        let owned = StateKeyCodec::<String>::encode_key(&codec, &"abc".to_string());
        let borrowed = EncodeKeyLike::<str, String>::encode_key_like(&codec, "abc");
        assert_eq!(owned, borrowed);
    }
}
