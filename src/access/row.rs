//! Fixed-width row codec.
//!
//! A row serializes to exactly [`ROW_SIZE`] bytes:
//!
//! | field    | offset | size |
//! |----------|--------|------|
//! | id       | 0      | 4 (u32 LE) |
//! | username | 4      | 33 (32 + NUL, zero-padded) |
//! | email    | 37     | 256 (255 + NUL, zero-padded) |
//!
//! Field lengths are validated at construction, never by truncation, so
//! serialization itself cannot fail and round-trips are exact.

use thiserror::Error;

pub const USERNAME_MAX_LEN: usize = 32;
pub const EMAIL_MAX_LEN: usize = 255;

const ID_SIZE: usize = 4;
const USERNAME_SIZE: usize = USERNAME_MAX_LEN + 1;
const EMAIL_SIZE: usize = EMAIL_MAX_LEN + 1;

const ID_OFFSET: usize = 0;
const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RowError {
    #[error("username exceeds {USERNAME_MAX_LEN} bytes")]
    UsernameTooLong,

    #[error("email exceeds {EMAIL_MAX_LEN} bytes")]
    EmailTooLong,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    id: u32,
    username: String,
    email: String,
}

impl Row {
    pub fn new(id: u32, username: &str, email: &str) -> Result<Self, RowError> {
        if username.len() > USERNAME_MAX_LEN {
            return Err(RowError::UsernameTooLong);
        }
        if email.len() > EMAIL_MAX_LEN {
            return Err(RowError::EmailTooLong);
        }
        Ok(Self {
            id,
            username: username.to_string(),
            email: email.to_string(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Writes the row into `buf`, which must be exactly `ROW_SIZE` bytes.
    pub fn serialize(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), ROW_SIZE);

        buf[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());

        buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE].fill(0);
        buf[USERNAME_OFFSET..USERNAME_OFFSET + self.username.len()]
            .copy_from_slice(self.username.as_bytes());

        buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE].fill(0);
        buf[EMAIL_OFFSET..EMAIL_OFFSET + self.email.len()].copy_from_slice(self.email.as_bytes());
    }

    /// Reads a row back out of `buf`. Text fields end at their first NUL.
    pub fn deserialize(buf: &[u8]) -> Self {
        debug_assert_eq!(buf.len(), ROW_SIZE);

        let id = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let username = read_nul_terminated(&buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]);
        let email = read_nul_terminated(&buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]);

        Self {
            id,
            username,
            email,
        }
    }
}

fn read_nul_terminated(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_row_size() {
        assert_eq!(ROW_SIZE, 293);
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let row = Row::new(1, "user1", "user1@example.com")?;
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);

        let decoded = Row::deserialize(&buf);
        assert_eq!(decoded, row);
        assert_eq!(decoded.id(), 1);
        assert_eq!(decoded.username(), "user1");
        assert_eq!(decoded.email(), "user1@example.com");
        Ok(())
    }

    #[test]
    fn test_maximum_length_fields() -> Result<()> {
        let username = "a".repeat(USERNAME_MAX_LEN);
        let email = "b".repeat(EMAIL_MAX_LEN);
        let row = Row::new(1, &username, &email)?;

        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);
        let decoded = Row::deserialize(&buf);
        assert_eq!(decoded.username(), username);
        assert_eq!(decoded.email(), email);
        Ok(())
    }

    #[test]
    fn test_too_long_fields_rejected() {
        let username = "a".repeat(USERNAME_MAX_LEN + 1);
        assert_eq!(
            Row::new(1, &username, "e@example.com"),
            Err(RowError::UsernameTooLong)
        );

        let email = "b".repeat(EMAIL_MAX_LEN + 1);
        assert_eq!(Row::new(1, "user", &email), Err(RowError::EmailTooLong));
    }

    #[test]
    fn test_empty_fields() -> Result<()> {
        let row = Row::new(7, "", "")?;
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);
        let decoded = Row::deserialize(&buf);
        assert_eq!(decoded.username(), "");
        assert_eq!(decoded.email(), "");
        Ok(())
    }

    #[test]
    fn test_serialize_pads_with_zeros() -> Result<()> {
        let row = Row::new(0xA1B2_C3D4, "ab", "cd")?;
        let mut buf = [0xFFu8; ROW_SIZE];
        row.serialize(&mut buf);

        // Little-endian id
        assert_eq!(&buf[0..4], &[0xD4, 0xC3, 0xB2, 0xA1]);
        // Text then zero padding to the end of each field
        assert_eq!(&buf[4..6], b"ab");
        assert!(buf[6..37].iter().all(|&b| b == 0));
        assert_eq!(&buf[37..39], b"cd");
        assert!(buf[39..].iter().all(|&b| b == 0));
        Ok(())
    }
}
