//! ObjectId conversion helpers.

use bson::{Bson, oid::ObjectId};
use tracing::warn;

use crate::error::{MongoError, MongoResult};

/// Convert a value to an [`ObjectId`], generating a fresh one for `None`.
///
/// Conversion failures are logged and yield `None`.
///
/// ```rust
/// use storehouse_mongodb::{Bson, document::to_object_id};
///
/// let id = to_object_id(Some(&Bson::String("65f1c0ffee0ddba11ca7f00d".into())));
/// assert_eq!(id.unwrap().to_hex(), "65f1c0ffee0ddba11ca7f00d");
///
/// assert!(to_object_id(Some(&Bson::Boolean(true))).is_none());
/// assert!(to_object_id(None).is_some());
/// ```
pub fn to_object_id(value: Option<&Bson>) -> Option<ObjectId> {
    let Some(value) = value else {
        return Some(ObjectId::new());
    };

    match try_object_id(value) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(error = %e, "Could not convert value to an ObjectId");
            None
        }
    }
}

/// Convert a value to an [`ObjectId`].
///
/// Accepts an ObjectId, a 24-character hex string, 12 raw bytes, or a
/// timestamp in seconds (the remaining bytes are generated).
pub fn try_object_id(value: &Bson) -> MongoResult<ObjectId> {
    match value {
        Bson::ObjectId(id) => Ok(*id),
        Bson::String(hex) => parse_object_id(hex),
        Bson::Binary(binary) => {
            let bytes: [u8; 12] = binary.bytes.as_slice().try_into().map_err(|_| {
                MongoError::invalid_object_id(format!(
                    "expected 12 bytes, got {}",
                    binary.bytes.len()
                ))
            })?;
            Ok(ObjectId::from_bytes(bytes))
        }
        Bson::Int32(seconds) => from_timestamp(i64::from(*seconds)),
        Bson::Int64(seconds) => from_timestamp(*seconds),
        other => Err(MongoError::invalid_object_id(format!(
            "cannot convert {:?} to an object id",
            other.element_type()
        ))),
    }
}

/// Parse an ObjectId from a string.
pub fn parse_object_id(s: &str) -> MongoResult<ObjectId> {
    ObjectId::parse_str(s).map_err(MongoError::from)
}

fn from_timestamp(seconds: i64) -> MongoResult<ObjectId> {
    let seconds = u32::try_from(seconds).map_err(|_| {
        MongoError::invalid_object_id(format!("timestamp {} is out of range", seconds))
    })?;

    let mut bytes = ObjectId::new().bytes();
    bytes[..4].copy_from_slice(&seconds.to_be_bytes());
    Ok(ObjectId::from_bytes(bytes))
}
