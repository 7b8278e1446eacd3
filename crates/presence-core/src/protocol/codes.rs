//! Message codes carried in the `code` field of every envelope.
//!
//! | code | name      | direction     |
//! |------|-----------|---------------|
//! | 0    | Admin     | reserved      |
//! | 1    | Message   | reserved      |
//! | 2    | Activity  | bidirectional |
//! | 3    | UserList  | outbound      |
//! | 5    | NameClaim | bidirectional |
//! | 6    | UserLeft  | outbound      |
//! | 7    | SignUp    | reserved      |
//!
//! Code 4 has never been assigned.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageCode {
    Admin = 0,
    Message = 1,
    Activity = 2,
    UserList = 3,
    NameClaim = 5,
    UserLeft = 6,
    SignUp = 7,
}

impl MessageCode {
    pub fn as_i64(self) -> i64 {
        self as u8 as i64
    }
}

impl TryFrom<i64> for MessageCode {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageCode::Admin),
            1 => Ok(MessageCode::Message),
            2 => Ok(MessageCode::Activity),
            3 => Ok(MessageCode::UserList),
            5 => Ok(MessageCode::NameClaim),
            6 => Ok(MessageCode::UserLeft),
            7 => Ok(MessageCode::SignUp),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_accepts_every_assigned_code() {
        for code in [0, 1, 2, 3, 5, 6, 7] {
            let parsed = MessageCode::try_from(code).unwrap();
            assert_eq!(parsed.as_i64(), code);
        }
    }

    #[test]
    fn test_try_from_rejects_unassigned_codes() {
        assert_eq!(MessageCode::try_from(4), Err(4));
        assert_eq!(MessageCode::try_from(-1), Err(-1));
        assert_eq!(MessageCode::try_from(42), Err(42));
    }
}
