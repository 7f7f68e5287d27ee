use serde::{Deserialize, Serialize};

/// Gender marker carried on profile records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sex {
    #[default]
    Unknown,
    Male,
    Female,
}

impl Sex {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Sex::Male,
            2 => Sex::Female,
            _ => Sex::Unknown,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Sex::Unknown => 0,
            Sex::Male => 1,
            Sex::Female => 2,
        }
    }
}

/// Role of a member inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GroupRole {
    Owner,
    Admin,
    #[default]
    Member,
}

/// Profile of an account the client has no friend relationship with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StrangerInfo {
    pub user_id: u64,
    pub nickname: String,
    pub sex: Sex,
    pub age: u8,
    pub area: String,
    pub signature: String,
    pub description: String,
}

/// Profile of a friend. The remark is the locally-set alias.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FriendInfo {
    pub user_id: u64,
    pub nickname: String,
    pub remark: String,
    pub sex: Sex,
    pub age: u8,
    pub area: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: u64,
    pub group_name: String,
    pub member_count: u32,
    pub max_member_count: u32,
    pub owner_id: u64,
    pub create_time: i64,
    pub grade: u8,
    pub last_join_time: i64,
    pub last_sent_time: i64,
    /// Expiry of the whole-group mute, 0 when not muted.
    pub shutup_time_whole: i64,
    /// Expiry of the mute applied to the logged-in account, 0 when not muted.
    pub shutup_time_me: i64,
    pub update_time: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemberInfo {
    pub group_id: u64,
    pub user_id: u64,
    pub nickname: String,
    pub card: String,
    pub sex: Sex,
    pub age: u8,
    pub area: String,
    pub join_time: i64,
    pub last_sent_time: i64,
    pub level: u8,
    pub role: GroupRole,
    pub title: String,
    pub title_expire_time: i64,
    pub shutup_time: i64,
    pub update_time: i64,
}

/// Identity of the logged-in account, populated by a successful login.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoginInfo {
    pub user_id: u64,
    pub nickname: String,
    pub sex: Sex,
    pub age: u8,
}

/// Handle returned by message-send operations, usable for recall/lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageId {
    pub message_id: String,
}

/// A message as returned by a message-lookup operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: String,
    pub sender_id: u64,
    /// Set when the message was sent in a group.
    pub group_id: Option<u64>,
    pub time: i64,
    pub content: crate::types::message::MessageContent,
}

/// Identity of an anonymous group sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anonymous {
    pub id: u64,
    pub name: String,
    pub flag: String,
}

/// Online-status codes accepted by `set_online_status`.
pub const ONLINE_STATUS_CODES: [u8; 6] = [11, 31, 41, 50, 60, 70];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sex_codes_round_trip() {
        for code in [0u8, 1, 2] {
            assert_eq!(Sex::from_code(code).code(), code);
        }
        assert_eq!(Sex::from_code(9), Sex::Unknown);
    }
}
