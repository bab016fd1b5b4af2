use crate::varint;
use indexmap::IndexMap;
use std::collections::VecDeque;

/// Ordered multimap of payload fields, tag to the values in the order they appeared.
pub(crate) type Fields = IndexMap<u128, VecDeque<u128>>;

/// Payload field tags.
///
/// Even tags must be understood by an indexer, an unknown even tag turns the runestone into a
/// cenotaph. Odd tags may be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Body = 0,
    Flags = 2,
    Rune = 4,
    Premine = 6,
    Cap = 8,
    Amount = 10,
    HeightStart = 12,
    HeightEnd = 14,
    OffsetStart = 16,
    OffsetEnd = 18,
    Mint = 20,
    Pointer = 22,
    Cenotaph = 126,

    Divisibility = 1,
    Spacers = 3,
    Symbol = 5,
    Nop = 127,
}

impl Tag {
    /// Removes the first `N` values of this tag from `fields` if `with` accepts them.
    ///
    /// Values beyond the first `N` stay in place. Nothing is removed when fewer than `N` values
    /// are present or when `with` returns `None`.
    pub(crate) fn take<const N: usize, T>(
        self,
        fields: &mut Fields,
        with: impl Fn([u128; N]) -> Option<T>,
    ) -> Option<T> {
        let key = u128::from(self);
        let field = fields.get_mut(&key)?;

        let mut values = [0u128; N];
        for (i, value) in values.iter_mut().enumerate() {
            *value = *field.get(i)?;
        }

        let value = with(values)?;

        field.drain(0..N);

        if field.is_empty() {
            fields.shift_remove(&key);
        }

        Some(value)
    }

    pub(crate) fn encode<const N: usize>(self, values: [u128; N], payload: &mut Vec<u8>) {
        for value in values {
            varint::encode_to_vec(self.into(), payload);
            varint::encode_to_vec(value, payload);
        }
    }

    pub(crate) fn encode_option<T: Into<u128>>(self, value: Option<T>, payload: &mut Vec<u8>) {
        if let Some(value) = value {
            self.encode([value.into()], payload)
        }
    }
}

impl From<Tag> for u128 {
    fn from(tag: Tag) -> Self {
        tag as u128
    }
}

impl PartialEq<u128> for Tag {
    fn eq(&self, other: &u128) -> bool {
        u128::from(*self) == *other
    }
}
