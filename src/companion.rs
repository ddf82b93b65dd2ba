//! Companion device channel
//!
//! Messages between the watch and the companion app are small dictionaries of
//! key-tagged values:
//!
//! ```text
//! u8 count
//! count * { u32 key, u8 type, u16 length, [u8; length] value }
//! ```
//!
//! All integers are little endian. Types are 0 = byte array, 1 = C string,
//! 2 = unsigned integer, 3 = signed integer (integers are 1, 2 or 4 bytes).

use core::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

/// Largest message accepted from the companion device
pub const INBOX_CAPACITY: usize = 256;

/// Largest message sent to the companion device
pub const OUTBOX_CAPACITY: usize = 16;

/// Key of the weather refresh request sent on tap
pub const REFRESH_KEY: u32 = 0x3;

const HEADER_LEN: usize = 1;
const TUPLE_HEADER_LEN: usize = 4 + 1 + 2;

const TYPE_BYTES: u8 = 0;
const TYPE_CSTRING: u8 = 1;
const TYPE_UINT: u8 = 2;
const TYPE_INT: u8 = 3;

/// Decoding errors of a dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DictionaryError {
    /// Message without a header
    Empty,
    /// A tuple runs past the end of the message
    Truncated,
    /// Unknown tuple type tag
    UnknownType(u8),
    /// Integer value that is not 1, 2 or 4 bytes wide
    BadIntegerWidth(u16),
}

impl fmt::Display for DictionaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionaryError::Empty => write!(f, "empty message"),
            DictionaryError::Truncated => write!(f, "truncated tuple"),
            DictionaryError::UnknownType(tag) => write!(f, "unknown tuple type {}", tag),
            DictionaryError::BadIntegerWidth(width) => {
                write!(f, "integer of {} bytes", width)
            }
        }
    }
}

/// Why a message from the companion device could not be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The message is not a valid dictionary
    Malformed(DictionaryError),
    /// A known key carried a value of the wrong type
    UnexpectedType { key: u32 },
    /// The message arrived while the event queue was full and was dropped
    QueueFull,
}

impl From<DictionaryError> for TransportError {
    fn from(error: DictionaryError) -> Self {
        TransportError::Malformed(error)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Malformed(error) => write!(f, "malformed message: {}", error),
            TransportError::UnexpectedType { key } => {
                write!(f, "unexpected value type for key {}", key)
            }
            TransportError::QueueFull => write!(f, "message dropped, event queue full"),
        }
    }
}

/// Value of a dictionary entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleValue<'a> {
    Bytes(&'a [u8]),
    /// Text including its terminator, if the sender wrote one
    CString(&'a [u8]),
    UInt(u32),
    Int(i32),
}

/// Single dictionary entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuple<'a> {
    pub key: u32,
    pub value: TupleValue<'a>,
}

/// Dictionary borrowed from a received message
#[derive(Debug, Clone, Copy)]
pub struct Dictionary<'a> {
    count: u8,
    tuples: &'a [u8],
}

impl<'a> Dictionary<'a> {
    /// Read the dictionary header. Tuples are decoded lazily by [`Self::iter`].
    pub fn parse(message: &'a [u8]) -> Result<Self, DictionaryError> {
        match message.split_first() {
            Some((&count, tuples)) => Ok(Self { count, tuples }),
            None => Err(DictionaryError::Empty),
        }
    }

    /// Number of tuples announced in the header
    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> TupleIter<'a> {
        TupleIter {
            remaining: self.count,
            data: self.tuples,
        }
    }
}

/// Iterator over the tuples of a [`Dictionary`]. Stops after the first error.
pub struct TupleIter<'a> {
    remaining: u8,
    data: &'a [u8],
}

impl<'a> TupleIter<'a> {
    fn next_tuple(&mut self) -> Result<Tuple<'a>, DictionaryError> {
        if self.data.len() < TUPLE_HEADER_LEN {
            return Err(DictionaryError::Truncated);
        }
        let (header, rest) = self.data.split_at(TUPLE_HEADER_LEN);
        let key = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let tag = header[4];
        let length = u16::from_le_bytes([header[5], header[6]]);

        if rest.len() < length as usize {
            return Err(DictionaryError::Truncated);
        }
        let (value, rest) = rest.split_at(length as usize);

        let value = match tag {
            TYPE_BYTES => TupleValue::Bytes(value),
            TYPE_CSTRING => TupleValue::CString(value),
            TYPE_UINT => TupleValue::UInt(read_uint(value)?),
            TYPE_INT => TupleValue::Int(read_int(value)?),
            other => return Err(DictionaryError::UnknownType(other)),
        };

        self.data = rest;
        Ok(Tuple { key, value })
    }
}

impl<'a> Iterator for TupleIter<'a> {
    type Item = Result<Tuple<'a>, DictionaryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let tuple = self.next_tuple();
        self.remaining = match tuple {
            Ok(_) => self.remaining - 1,
            Err(_) => 0,
        };
        Some(tuple)
    }
}

fn read_uint(value: &[u8]) -> Result<u32, DictionaryError> {
    match *value {
        [a] => Ok(a as u32),
        [a, b] => Ok(u16::from_le_bytes([a, b]) as u32),
        [a, b, c, d] => Ok(u32::from_le_bytes([a, b, c, d])),
        _ => Err(DictionaryError::BadIntegerWidth(value.len() as u16)),
    }
}

fn read_int(value: &[u8]) -> Result<i32, DictionaryError> {
    match *value {
        [a] => Ok(a as i8 as i32),
        [a, b] => Ok(i16::from_le_bytes([a, b]) as i32),
        [a, b, c, d] => Ok(i32::from_le_bytes([a, b, c, d])),
        _ => Err(DictionaryError::BadIntegerWidth(value.len() as u16)),
    }
}

/// Error while encoding a dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriterError {
    BufferTooSmall,
    TooManyTuples,
    ValueTooLong,
}

impl fmt::Display for WriterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterError::BufferTooSmall => write!(f, "buffer too small"),
            WriterError::TooManyTuples => write!(f, "too many tuples"),
            WriterError::ValueTooLong => write!(f, "value too long"),
        }
    }
}

/// Encodes a dictionary into a caller provided buffer
pub struct DictionaryWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
    count: u8,
}

impl<'a> DictionaryWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Result<Self, WriterError> {
        if buf.len() < HEADER_LEN {
            return Err(WriterError::BufferTooSmall);
        }
        buf[0] = 0;
        Ok(Self {
            buf,
            len: HEADER_LEN,
            count: 0,
        })
    }

    fn write_tuple(&mut self, key: u32, tag: u8, value: &[u8]) -> Result<(), WriterError> {
        let count = self.count.checked_add(1).ok_or(WriterError::TooManyTuples)?;
        let length = u16::try_from(value.len()).map_err(|_| WriterError::ValueTooLong)?;
        let end = self.len + TUPLE_HEADER_LEN + value.len();
        if end > self.buf.len() {
            return Err(WriterError::BufferTooSmall);
        }

        let tuple = &mut self.buf[self.len..end];
        tuple[..4].copy_from_slice(&key.to_le_bytes());
        tuple[4] = tag;
        tuple[5..7].copy_from_slice(&length.to_le_bytes());
        tuple[TUPLE_HEADER_LEN..].copy_from_slice(value);

        self.len = end;
        self.count = count;
        self.buf[0] = count;
        Ok(())
    }

    pub fn write_bytes(&mut self, key: u32, value: &[u8]) -> Result<(), WriterError> {
        self.write_tuple(key, TYPE_BYTES, value)
    }

    /// Write `value` as a NUL terminated string
    pub fn write_cstring(&mut self, key: u32, value: &str) -> Result<(), WriterError> {
        let length = u16::try_from(value.len() + 1).map_err(|_| WriterError::ValueTooLong)?;
        let end = self.len + TUPLE_HEADER_LEN + length as usize;
        if end > self.buf.len() {
            return Err(WriterError::BufferTooSmall);
        }
        self.write_tuple(key, TYPE_CSTRING, &[])?;
        // Patch the empty tuple into the terminated string
        let start = self.len;
        self.buf[start - 2..start].copy_from_slice(&length.to_le_bytes());
        self.buf[start..start + value.len()].copy_from_slice(value.as_bytes());
        self.buf[start + value.len()] = 0;
        self.len = end;
        Ok(())
    }

    pub fn write_u8(&mut self, key: u32, value: u8) -> Result<(), WriterError> {
        self.write_tuple(key, TYPE_UINT, &[value])
    }

    pub fn write_u32(&mut self, key: u32, value: u32) -> Result<(), WriterError> {
        self.write_tuple(key, TYPE_UINT, &value.to_le_bytes())
    }

    pub fn write_i32(&mut self, key: u32, value: i32) -> Result<(), WriterError> {
        self.write_tuple(key, TYPE_INT, &value.to_le_bytes())
    }

    /// Encoded message
    pub fn finish(self) -> &'a [u8] {
        let Self { buf, len, .. } = self;
        &buf[..len]
    }
}

/// Encode the message asking the companion device for a fresh weather push
pub fn refresh_request(buf: &mut [u8]) -> Result<&[u8], WriterError> {
    let mut writer = DictionaryWriter::new(buf)?;
    writer.write_u8(REFRESH_KEY, 1)?;
    Ok(writer.finish())
}

/// Messages from the companion device lost before they reached the app.
///
/// Written from the BLE event callback, drained by the task that owns the app.
pub struct DroppedMessages(AtomicU32);

impl DroppedMessages {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Count one lost message
    pub fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of messages lost since the last call
    pub fn take(&self) -> u32 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

impl Default for DroppedMessages {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weather_message() {
        let message = [
            2, // two tuples
            0x1, 0, 0, 0, TYPE_CSTRING, 4, 0, b'5', b'C', b'!', 0, //
            0x2, 0, 0, 0, TYPE_CSTRING, 3, 0, b'R', b'i', b'o',
        ];
        let dictionary = Dictionary::parse(&message).unwrap();
        assert_eq!(dictionary.len(), 2);

        let mut tuples = dictionary.iter();
        assert_eq!(
            tuples.next(),
            Some(Ok(Tuple {
                key: 1,
                value: TupleValue::CString(b"5C!\0")
            }))
        );
        assert_eq!(
            tuples.next(),
            Some(Ok(Tuple {
                key: 2,
                value: TupleValue::CString(b"Rio")
            }))
        );
        assert_eq!(tuples.next(), None);
    }

    #[test]
    fn test_parse_integers() {
        let message = [
            3, //
            9, 0, 0, 0, TYPE_UINT, 2, 0, 0x10, 0x27, //
            10, 0, 0, 0, TYPE_INT, 1, 0, 0xfb, //
            11, 0, 0, 0, TYPE_INT, 4, 0, 0xff, 0xff, 0xff, 0xff,
        ];
        let values: [_; 3] = core::array::from_fn({
            let mut tuples = Dictionary::parse(&message).unwrap().iter();
            move |_| tuples.next().unwrap().unwrap().value
        });
        assert_eq!(
            values,
            [TupleValue::UInt(10_000), TupleValue::Int(-5), TupleValue::Int(-1)]
        );
    }

    #[test]
    fn test_empty_message() {
        assert_eq!(Dictionary::parse(&[]).err(), Some(DictionaryError::Empty));
        assert!(Dictionary::parse(&[0]).unwrap().iter().next().is_none());
    }

    #[test]
    fn test_value_longer_than_message() {
        let message = [1, 0, 0, 0, 0, TYPE_CSTRING, 200, 0, b'a', b'b'];
        let mut tuples = Dictionary::parse(&message).unwrap().iter();
        assert_eq!(tuples.next(), Some(Err(DictionaryError::Truncated)));
        assert_eq!(tuples.next(), None);
    }

    #[test]
    fn test_missing_tuple() {
        let message = [2, 0, 0, 0, 0, TYPE_BYTES, 1, 0, 0xaa];
        let results: [_; 2] = core::array::from_fn({
            let mut tuples = Dictionary::parse(&message).unwrap().iter();
            move |_| tuples.next()
        });
        assert!(matches!(results[0], Some(Ok(_))));
        assert_eq!(results[1], Some(Err(DictionaryError::Truncated)));
    }

    #[test]
    fn test_unknown_type_and_width() {
        let message = [1, 0, 0, 0, 0, 9, 0, 0];
        let mut tuples = Dictionary::parse(&message).unwrap().iter();
        assert_eq!(tuples.next(), Some(Err(DictionaryError::UnknownType(9))));

        let message = [1, 0, 0, 0, 0, TYPE_UINT, 3, 0, 1, 2, 3];
        let mut tuples = Dictionary::parse(&message).unwrap().iter();
        assert_eq!(tuples.next(), Some(Err(DictionaryError::BadIntegerWidth(3))));
    }

    #[test]
    fn test_writer_cstring_layout() {
        let mut buf = [0u8; 32];
        let mut writer = DictionaryWriter::new(&mut buf).unwrap();
        writer.write_cstring(0x2, "Oslo").unwrap();
        assert_eq!(
            writer.finish(),
            &[1, 2, 0, 0, 0, TYPE_CSTRING, 5, 0, b'O', b's', b'l', b'o', 0]
        );
    }

    #[test]
    fn test_writer_output_parses_back() {
        let mut buf = [0u8; 64];
        let mut writer = DictionaryWriter::new(&mut buf).unwrap();
        writer.write_bytes(0x1, &[0xde, 0xad]).unwrap();
        writer.write_i32(0x2, -40).unwrap();
        writer.write_u32(0x3, 70_000).unwrap();
        let message = writer.finish();

        let values: [_; 3] = core::array::from_fn({
            let mut tuples = Dictionary::parse(message).unwrap().iter();
            move |_| tuples.next().unwrap().unwrap()
        });
        assert_eq!(
            values,
            [
                Tuple { key: 1, value: TupleValue::Bytes(&[0xde, 0xad]) },
                Tuple { key: 2, value: TupleValue::Int(-40) },
                Tuple { key: 3, value: TupleValue::UInt(70_000) },
            ]
        );
    }

    #[test]
    fn test_writer_buffer_too_small() {
        let mut buf = [0u8; 8];
        let mut writer = DictionaryWriter::new(&mut buf).unwrap();
        assert_eq!(
            writer.write_cstring(0, "too long"),
            Err(WriterError::BufferTooSmall)
        );
        assert_eq!(writer.write_u32(0, 1), Err(WriterError::BufferTooSmall));
        assert_eq!(writer.finish(), &[0]);
    }

    #[test]
    fn test_dropped_messages_drain() {
        let dropped = DroppedMessages::new();
        assert_eq!(dropped.take(), 0);

        dropped.record();
        dropped.record();
        assert_eq!(dropped.take(), 2);
        assert_eq!(dropped.take(), 0);
    }

    #[test]
    fn test_refresh_request() {
        let mut buf = [0u8; OUTBOX_CAPACITY];
        let request = refresh_request(&mut buf).unwrap();
        assert_eq!(request, &[1, 3, 0, 0, 0, TYPE_UINT, 1, 0, 1]);

        let tuple = Dictionary::parse(request).unwrap().iter().next().unwrap().unwrap();
        assert_eq!(tuple.key, REFRESH_KEY);
        assert_eq!(tuple.value, TupleValue::UInt(1));
    }
}
