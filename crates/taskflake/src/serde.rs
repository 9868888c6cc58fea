use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serialize an [`EntityId`] as its native `u64` representation.
///
/// For use with `#[serde(with = "as_number")]` on DTO fields.
///
/// [`EntityId`]: crate::EntityId
pub mod as_number {
    use super::{Deserialize, Deserializer, Serialize, Serializer};
    use crate::EntityId;

    /// Serialize a key as its raw integer.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying serializer fails.
    pub fn serialize<S>(id: &EntityId, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        id.to_raw().serialize(s)
    }

    /// Deserialize a key from its raw integer.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The underlying deserializer fails
    /// - The value has the reserved bit set
    pub fn deserialize<'de, D>(d: D) -> Result<EntityId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = u64::deserialize(d)?;
        let id = EntityId::from_raw(raw);
        if !id.is_valid() {
            return Err(serde::de::Error::custom(
                "entity id has the reserved bit set",
            ));
        }
        Ok(id)
    }
}

/// Serialize an [`EntityId`] as a decimal string.
///
/// For JSON consumers whose number type cannot hold a full 64-bit integer
/// (JavaScript truncates above 2^53). For use with
/// `#[serde(with = "as_string")]` on DTO fields.
///
/// [`EntityId`]: crate::EntityId
pub mod as_string {
    use super::{Deserializer, Serializer};
    use crate::EntityId;

    /// Serialize a key as a decimal string.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying serializer fails.
    pub fn serialize<S>(id: &EntityId, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.collect_str(id)
    }

    /// Deserialize a key from a decimal string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The underlying deserializer fails
    /// - The string is not a decimal `u64`
    /// - The decoded value has the reserved bit set
    pub fn deserialize<'de, D>(d: D) -> Result<EntityId, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StrVisitor;

        impl serde::de::Visitor<'_> for StrVisitor {
            type Value = EntityId;

            fn expecting(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
                formatter.write_str("a decimal string entity id")
            }

            #[inline]
            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let raw: u64 = v.parse().map_err(E::custom)?;
                let id = EntityId::from_raw(raw);
                if !id.is_valid() {
                    return Err(E::custom("entity id has the reserved bit set"));
                }
                Ok(id)
            }
        }

        d.deserialize_str(StrVisitor)
    }
}
