//! Typed wire envelope spoken over the transport.
//!
//! Only two things cross the codec seam: the per-connection correlation
//! sequence and the typed payloads. The byte layout below (bincode inside
//! length-prefixed frames) is the reference codec used by the test-suite
//! and the demo; a real deployment substitutes its own [`FrameCodec`].

use crate::types::message::MessageContent;
use crate::types::records::{
    FriendInfo, GroupInfo, LoginInfo, MemberInfo, MessageRecord, StrangerInfo,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outbound envelope: one operation stamped with its correlation sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub seq: u32,
    pub command: Command,
}

/// Inbound envelope: either the reply to a submitted operation or an
/// unsolicited push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerFrame {
    Reply { seq: u32, reply: Reply },
    Push(Push),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Auth {
        account_id: u64,
        credential_md5: [u8; 16],
        device_fingerprint: String,
        platform: u8,
        session_token: Option<Vec<u8>>,
    },
    SubmitCaptcha {
        token: String,
        answer: String,
    },
    Logoff,
    Heartbeat,

    SetOnlineStatus {
        status: u8,
    },

    GetStrangerInfo {
        user_id: u64,
    },
    GetGroupInfo {
        group_id: u64,
    },
    GetMemberInfo {
        group_id: u64,
        user_id: u64,
    },
    FetchFriendList,
    FetchGroupList,
    FetchMemberList {
        group_id: u64,
    },

    SendPrivateMsg {
        user_id: u64,
        content: MessageContent,
        fragmented: bool,
    },
    SendGroupMsg {
        group_id: u64,
        content: MessageContent,
        fragmented: bool,
    },
    RecallMsg {
        message_id: String,
    },
    GetMsg {
        message_id: String,
    },

    SetGroupName {
        group_id: u64,
        name: String,
    },
    SetGroupCard {
        group_id: u64,
        user_id: u64,
        card: String,
    },
    SetGroupAdmin {
        group_id: u64,
        user_id: u64,
        enable: bool,
    },
    SetGroupSpecialTitle {
        group_id: u64,
        user_id: u64,
        title: String,
        duration: u32,
    },
    SetGroupKick {
        group_id: u64,
        user_id: u64,
        reject_add_request: bool,
    },
    SetGroupBan {
        group_id: u64,
        user_id: u64,
        duration: u32,
    },
    SetGroupWholeBan {
        group_id: u64,
        enable: bool,
    },
    SetGroupAnonymous {
        group_id: u64,
        enable: bool,
    },
    LeaveGroup {
        group_id: u64,
        dismiss: bool,
    },
    SendGroupNotice {
        group_id: u64,
        content: String,
    },
    SendGroupPoke {
        group_id: u64,
        user_id: u64,
    },

    SetFriendAddRequest {
        flag: String,
        approve: bool,
        remark: String,
        block: bool,
    },
    SetGroupAddRequest {
        flag: String,
        approve: bool,
        reason: String,
        block: bool,
    },
    AddFriend {
        group_id: u64,
        user_id: u64,
        comment: String,
    },
    AddGroup {
        group_id: u64,
        comment: String,
    },
    DeleteFriend {
        user_id: u64,
        block: bool,
    },
    InviteFriend {
        group_id: u64,
        user_id: u64,
    },
    SendLike {
        user_id: u64,
        times: u8,
    },

    SetNickname {
        nickname: String,
    },
    SetGender {
        gender: u8,
    },
    SetBirthday {
        birthday: u32,
    },
    SetSignature {
        signature: String,
    },
    SetDescription {
        description: String,
    },
}

impl Command {
    /// Stable label used in log lines and pending-operation bookkeeping.
    pub fn tag(&self) -> &'static str {
        match self {
            Command::Auth { .. } => "auth",
            Command::SubmitCaptcha { .. } => "submit_captcha",
            Command::Logoff => "logoff",
            Command::Heartbeat => "heartbeat",
            Command::SetOnlineStatus { .. } => "set_online_status",
            Command::GetStrangerInfo { .. } => "get_stranger_info",
            Command::GetGroupInfo { .. } => "get_group_info",
            Command::GetMemberInfo { .. } => "get_member_info",
            Command::FetchFriendList => "fetch_friend_list",
            Command::FetchGroupList => "fetch_group_list",
            Command::FetchMemberList { .. } => "fetch_member_list",
            Command::SendPrivateMsg { .. } => "send_private_msg",
            Command::SendGroupMsg { .. } => "send_group_msg",
            Command::RecallMsg { .. } => "recall_msg",
            Command::GetMsg { .. } => "get_msg",
            Command::SetGroupName { .. } => "set_group_name",
            Command::SetGroupCard { .. } => "set_group_card",
            Command::SetGroupAdmin { .. } => "set_group_admin",
            Command::SetGroupSpecialTitle { .. } => "set_group_special_title",
            Command::SetGroupKick { .. } => "set_group_kick",
            Command::SetGroupBan { .. } => "set_group_ban",
            Command::SetGroupWholeBan { .. } => "set_group_whole_ban",
            Command::SetGroupAnonymous { .. } => "set_group_anonymous",
            Command::LeaveGroup { .. } => "leave_group",
            Command::SendGroupNotice { .. } => "send_group_notice",
            Command::SendGroupPoke { .. } => "send_group_poke",
            Command::SetFriendAddRequest { .. } => "set_friend_add_request",
            Command::SetGroupAddRequest { .. } => "set_group_add_request",
            Command::AddFriend { .. } => "add_friend",
            Command::AddGroup { .. } => "add_group",
            Command::DeleteFriend { .. } => "delete_friend",
            Command::InviteFriend { .. } => "invite_friend",
            Command::SendLike { .. } => "send_like",
            Command::SetNickname { .. } => "set_nickname",
            Command::SetGender { .. } => "set_gender",
            Command::SetBirthday { .. } => "set_birthday",
            Command::SetSignature { .. } => "set_signature",
            Command::SetDescription { .. } => "set_description",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    /// Plain success with no payload.
    Ack,
    /// The server accepted the operation and will complete it on its own.
    Accepted,
    /// Application-level rejection (bad identifier, no permission, ...).
    Error { code: i32, message: String },
    /// The message was rejected by rate control; a fragmented resend may
    /// be attempted.
    Throttled,

    LoginOk {
        profile: LoginInfo,
        session_token: Vec<u8>,
    },
    LoginCaptcha {
        token: String,
        image: Vec<u8>,
    },
    LoginRejected {
        code: i32,
        message: String,
    },

    Stranger(Option<StrangerInfo>),
    Group(Option<GroupInfo>),
    Member(Option<MemberInfo>),
    FriendList(Vec<FriendInfo>),
    GroupList(Vec<GroupInfo>),
    /// `None` means the group itself is unknown to the server.
    MemberList(Option<Vec<MemberInfo>>),
    MessageReceipt {
        message_id: String,
    },
    Message(Option<MessageRecord>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Push {
    PrivateMessage {
        message_id: String,
        sender_id: u64,
        sender_nickname: String,
        /// True when the sender is on the friend list server-side.
        from_friend: bool,
        /// Group the temporary session is routed through, if any.
        via_group: Option<u64>,
        time: i64,
        content: MessageContent,
        auto_reply: bool,
    },
    GroupMessage {
        message_id: String,
        group_id: u64,
        sender_id: u64,
        anonymous: Option<crate::types::records::Anonymous>,
        time: i64,
        content: MessageContent,
    },

    FriendRequest {
        user_id: u64,
        nickname: String,
        comment: String,
        flag: String,
        source: String,
        time: i64,
    },
    GroupAddRequest {
        group_id: u64,
        user_id: u64,
        nickname: String,
        comment: String,
        flag: String,
        time: i64,
    },
    GroupInviteRequest {
        group_id: u64,
        user_id: u64,
        inviter_id: u64,
        flag: String,
        time: i64,
    },

    FriendAdded {
        friend: FriendInfo,
        time: i64,
    },
    FriendRemoved {
        user_id: u64,
        time: i64,
    },
    FriendRecall {
        user_id: u64,
        message_id: String,
        time: i64,
    },
    FriendPoke {
        user_id: u64,
        operator_id: u64,
        action: String,
        time: i64,
    },

    MemberJoined {
        group_id: u64,
        member: MemberInfo,
        time: i64,
    },
    MemberLeft {
        group_id: u64,
        user_id: u64,
        /// Operator present when the member was kicked.
        operator_id: Option<u64>,
        time: i64,
    },
    GroupDismissed {
        group_id: u64,
        operator_id: u64,
        time: i64,
    },
    GroupRecall {
        group_id: u64,
        user_id: u64,
        operator_id: u64,
        message_id: String,
        time: i64,
    },
    GroupAdminChanged {
        group_id: u64,
        user_id: u64,
        set: bool,
        time: i64,
    },
    GroupBanSet {
        group_id: u64,
        operator_id: u64,
        user_id: u64,
        duration: u32,
        time: i64,
    },
    GroupTransferred {
        group_id: u64,
        operator_id: u64,
        user_id: u64,
        time: i64,
    },
    GroupPoke {
        group_id: u64,
        operator_id: u64,
        user_id: u64,
        time: i64,
    },
    GroupSettingChanged {
        group_id: u64,
        field: String,
        enabled: bool,
        time: i64,
    },

    /// The account logged in from another device; this connection is about
    /// to be displaced.
    Kickoff {
        message: String,
        time: i64,
    },
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame encode failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("frame decode failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// Conversion between typed envelopes and raw frame payloads.
///
/// Implementations see only payload bytes; the length-prefixed outer
/// framing lives in [`crate::framing`].
pub trait FrameCodec: Send + Sync {
    fn encode(&self, frame: &ClientFrame) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, payload: &[u8]) -> Result<ServerFrame, CodecError>;
}

/// Reference codec: bincode with the standard configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl BincodeCodec {
    pub fn new() -> Self {
        Self
    }

    /// Server-side half, used by the scripted test server and the demo.
    pub fn encode_server(&self, frame: &ServerFrame) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serde::encode_to_vec(
            frame,
            bincode::config::standard(),
        )?)
    }

    /// Server-side half, used by the scripted test server and the demo.
    pub fn decode_client(&self, payload: &[u8]) -> Result<ClientFrame, CodecError> {
        let (frame, _) = bincode::serde::decode_from_slice(payload, bincode::config::standard())?;
        Ok(frame)
    }
}

impl FrameCodec for BincodeCodec {
    fn encode(&self, frame: &ClientFrame) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serde::encode_to_vec(
            frame,
            bincode::config::standard(),
        )?)
    }

    fn decode(&self, payload: &[u8]) -> Result<ServerFrame, CodecError> {
        let (frame, _) = bincode::serde::decode_from_slice(payload, bincode::config::standard())?;
        Ok(frame)
    }
}
