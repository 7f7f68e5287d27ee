use crate::types::message::MessageContent;
use crate::types::records::{Anonymous, FriendInfo, MemberInfo};

/// Envelope handed to every registered observer.
///
/// `name` is the full dotted event name (`category.type.subtype`) the
/// envelope was dispatched under; `kind` is the typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    pub self_id: u64,
    pub time: i64,
    pub name: String,
    pub kind: EventKind,
}

impl EventData {
    pub fn new(self_id: u64, time: i64, kind: EventKind) -> Self {
        Self {
            self_id,
            time,
            name: kind.name(),
            kind,
        }
    }

    pub fn category(&self) -> &str {
        self.name.split('.').next().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    System(SystemEvent),
    Request(RequestEvent),
    Message(MessageEvent),
    Notice(NoticeEvent),
}

impl EventKind {
    /// Full dotted name this payload is dispatched under.
    pub fn name(&self) -> String {
        match self {
            EventKind::System(ev) => match ev {
                SystemEvent::Online => "system.online".into(),
                SystemEvent::OfflineNetwork { .. } => "system.offline.network".into(),
                SystemEvent::OfflineKickoff { .. } => "system.offline.kickoff".into(),
                SystemEvent::LoginCaptcha { .. } => "system.login.captcha".into(),
                SystemEvent::LoginError { .. } => "system.login.error".into(),
            },
            EventKind::Request(ev) => match ev {
                RequestEvent::FriendAdd { .. } => "request.friend.add".into(),
                RequestEvent::GroupAdd { .. } => "request.group.add".into(),
                RequestEvent::GroupInvite { .. } => "request.group.invite".into(),
            },
            EventKind::Message(ev) => match ev {
                MessageEvent::Private { sub_type, .. } => {
                    format!("message.private.{}", sub_type.as_str())
                }
                MessageEvent::Group { anonymous, .. } => {
                    if anonymous.is_some() {
                        "message.group.anonymous".into()
                    } else {
                        "message.group.normal".into()
                    }
                }
            },
            EventKind::Notice(ev) => match ev {
                NoticeEvent::FriendIncrease { .. } => "notice.friend.increase".into(),
                NoticeEvent::FriendDecrease { .. } => "notice.friend.decrease".into(),
                NoticeEvent::FriendRecall { .. } => "notice.friend.recall".into(),
                NoticeEvent::FriendPoke { .. } => "notice.friend.poke".into(),
                NoticeEvent::GroupIncrease { .. } => "notice.group.increase".into(),
                NoticeEvent::GroupDecrease { .. } => "notice.group.decrease".into(),
                NoticeEvent::GroupRecall { .. } => "notice.group.recall".into(),
                NoticeEvent::GroupAdmin { .. } => "notice.group.admin".into(),
                NoticeEvent::GroupBan { .. } => "notice.group.ban".into(),
                NoticeEvent::GroupTransfer { .. } => "notice.group.transfer".into(),
                NoticeEvent::GroupPoke { .. } => "notice.group.poke".into(),
                NoticeEvent::GroupSetting { .. } => "notice.group.setting".into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SystemEvent {
    Online,
    OfflineNetwork { message: String },
    OfflineKickoff { message: String },
    LoginCaptcha { image: Vec<u8> },
    LoginError { code: i32, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent {
    FriendAdd {
        user_id: u64,
        nickname: String,
        comment: String,
        /// Opaque token echoed back in `set_friend_add_request`.
        flag: String,
        source: String,
    },
    GroupAdd {
        group_id: u64,
        user_id: u64,
        nickname: String,
        comment: String,
        flag: String,
    },
    GroupInvite {
        group_id: u64,
        user_id: u64,
        inviter_id: u64,
        flag: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateSubType {
    /// Sender is a friend.
    Friend,
    /// Temporary session routed through a shared group.
    Group,
    Other,
}

impl PrivateSubType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivateSubType::Friend => "friend",
            PrivateSubType::Group => "group",
            PrivateSubType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageEvent {
    Private {
        sub_type: PrivateSubType,
        message_id: String,
        user_id: u64,
        nickname: String,
        content: MessageContent,
        auto_reply: bool,
    },
    Group {
        message_id: String,
        group_id: u64,
        user_id: u64,
        anonymous: Option<Anonymous>,
        content: MessageContent,
    },
}

/// How a member ended up leaving in a `notice.group.decrease` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecreaseKind {
    Leave,
    Kick,
    /// The logged-in account was kicked.
    KickMe,
    Dismiss,
}

impl DecreaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecreaseKind::Leave => "leave",
            DecreaseKind::Kick => "kick",
            DecreaseKind::KickMe => "kick_me",
            DecreaseKind::Dismiss => "dismiss",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NoticeEvent {
    FriendIncrease {
        friend: FriendInfo,
    },
    FriendDecrease {
        user_id: u64,
    },
    FriendRecall {
        user_id: u64,
        message_id: String,
    },
    FriendPoke {
        user_id: u64,
        operator_id: u64,
        action: String,
    },
    GroupIncrease {
        group_id: u64,
        member: MemberInfo,
    },
    GroupDecrease {
        group_id: u64,
        user_id: u64,
        /// Absent for a voluntary leave.
        operator_id: Option<u64>,
        kind: DecreaseKind,
    },
    GroupRecall {
        group_id: u64,
        user_id: u64,
        operator_id: u64,
        message_id: String,
    },
    GroupAdmin {
        group_id: u64,
        user_id: u64,
        set: bool,
    },
    GroupBan {
        group_id: u64,
        operator_id: u64,
        /// 0 bans the whole group.
        user_id: u64,
        duration: u32,
    },
    GroupTransfer {
        group_id: u64,
        operator_id: u64,
        user_id: u64,
    },
    GroupPoke {
        group_id: u64,
        operator_id: u64,
        user_id: u64,
    },
    GroupSetting {
        group_id: u64,
        field: String,
        enabled: bool,
    },
}
