//! Push classification and delivery.
//!
//! Runs on the sequential inbound-processing path. Side-effecting pushes
//! apply their cache mutation before the event is dispatched, so an
//! observer always sees a cache consistent with the event it is
//! handling.

use crate::client::Client;
use crate::types::events::{
    DecreaseKind, EventKind, MessageEvent, NoticeEvent, PrivateSubType, RequestEvent,
};
use crate::types::records::GroupRole;
use crate::wire::Push;
use log::debug;
use std::sync::Arc;

impl Client {
    pub(crate) async fn handle_push(self: &Arc<Self>, push: Push) {
        match push {
            Push::PrivateMessage {
                message_id,
                sender_id,
                sender_nickname,
                from_friend,
                via_group,
                time,
                content,
                auto_reply,
            } => {
                self.record_message_activity(false).await;
                let sub_type = if from_friend {
                    PrivateSubType::Friend
                } else if via_group.is_some() {
                    PrivateSubType::Group
                } else {
                    PrivateSubType::Other
                };
                self.dispatch_event_at(
                    time,
                    EventKind::Message(MessageEvent::Private {
                        sub_type,
                        message_id,
                        user_id: sender_id,
                        nickname: sender_nickname,
                        content,
                        auto_reply,
                    }),
                );
            }

            Push::GroupMessage {
                message_id,
                group_id,
                sender_id,
                anonymous,
                time,
                content,
            } => {
                self.record_message_activity(false).await;
                if self.config.ignore_self && sender_id == self.account_id {
                    debug!(target: "Client", "Ignoring own group message {message_id}");
                    return;
                }
                self.dispatch_event_at(
                    time,
                    EventKind::Message(MessageEvent::Group {
                        message_id,
                        group_id,
                        user_id: sender_id,
                        anonymous,
                        content,
                    }),
                );
            }

            Push::FriendRequest {
                user_id,
                nickname,
                comment,
                flag,
                source,
                time,
            } => {
                self.dispatch_event_at(
                    time,
                    EventKind::Request(RequestEvent::FriendAdd {
                        user_id,
                        nickname,
                        comment,
                        flag,
                        source,
                    }),
                );
            }

            Push::GroupAddRequest {
                group_id,
                user_id,
                nickname,
                comment,
                flag,
                time,
            } => {
                self.dispatch_event_at(
                    time,
                    EventKind::Request(RequestEvent::GroupAdd {
                        group_id,
                        user_id,
                        nickname,
                        comment,
                        flag,
                    }),
                );
            }

            Push::GroupInviteRequest {
                group_id,
                user_id,
                inviter_id,
                flag,
                time,
            } => {
                self.dispatch_event_at(
                    time,
                    EventKind::Request(RequestEvent::GroupInvite {
                        group_id,
                        user_id,
                        inviter_id,
                        flag,
                    }),
                );
            }

            Push::FriendAdded { friend, time } => {
                self.cache.upsert_friend(friend.clone());
                self.dispatch_event_at(time, EventKind::Notice(NoticeEvent::FriendIncrease { friend }));
            }

            Push::FriendRemoved { user_id, time } => {
                self.cache.remove_friend(user_id);
                self.dispatch_event_at(time, EventKind::Notice(NoticeEvent::FriendDecrease { user_id }));
            }

            Push::FriendRecall {
                user_id,
                message_id,
                time,
            } => {
                self.dispatch_event_at(
                    time,
                    EventKind::Notice(NoticeEvent::FriendRecall {
                        user_id,
                        message_id,
                    }),
                );
            }

            Push::FriendPoke {
                user_id,
                operator_id,
                action,
                time,
            } => {
                self.dispatch_event_at(
                    time,
                    EventKind::Notice(NoticeEvent::FriendPoke {
                        user_id,
                        operator_id,
                        action,
                    }),
                );
            }

            Push::MemberJoined {
                group_id,
                member,
                time,
            } => {
                self.cache.upsert_member(member.clone());
                self.cache.update_group(group_id, |g| {
                    g.member_count = g.member_count.saturating_add(1);
                });
                self.dispatch_event_at(
                    time,
                    EventKind::Notice(NoticeEvent::GroupIncrease { group_id, member }),
                );
            }

            Push::MemberLeft {
                group_id,
                user_id,
                operator_id,
                time,
            } => {
                let kind = if user_id == self.account_id {
                    // Our own departure removes the whole group.
                    self.cache.remove_group(group_id);
                    if operator_id.is_some() {
                        DecreaseKind::KickMe
                    } else {
                        DecreaseKind::Leave
                    }
                } else {
                    self.cache.remove_member(group_id, user_id);
                    self.cache.update_group(group_id, |g| {
                        g.member_count = g.member_count.saturating_sub(1);
                    });
                    if operator_id.is_some() {
                        DecreaseKind::Kick
                    } else {
                        DecreaseKind::Leave
                    }
                };
                self.dispatch_event_at(
                    time,
                    EventKind::Notice(NoticeEvent::GroupDecrease {
                        group_id,
                        user_id,
                        operator_id,
                        kind,
                    }),
                );
            }

            Push::GroupDismissed {
                group_id,
                operator_id,
                time,
            } => {
                self.cache.remove_group(group_id);
                self.dispatch_event_at(
                    time,
                    EventKind::Notice(NoticeEvent::GroupDecrease {
                        group_id,
                        user_id: self.account_id,
                        operator_id: Some(operator_id),
                        kind: DecreaseKind::Dismiss,
                    }),
                );
            }

            Push::GroupRecall {
                group_id,
                user_id,
                operator_id,
                message_id,
                time,
            } => {
                self.dispatch_event_at(
                    time,
                    EventKind::Notice(NoticeEvent::GroupRecall {
                        group_id,
                        user_id,
                        operator_id,
                        message_id,
                    }),
                );
            }

            Push::GroupAdminChanged {
                group_id,
                user_id,
                set,
                time,
            } => {
                self.cache.update_member(group_id, user_id, |m| {
                    m.role = if set { GroupRole::Admin } else { GroupRole::Member };
                });
                self.dispatch_event_at(
                    time,
                    EventKind::Notice(NoticeEvent::GroupAdmin {
                        group_id,
                        user_id,
                        set,
                    }),
                );
            }

            Push::GroupBanSet {
                group_id,
                operator_id,
                user_id,
                duration,
                time,
            } => {
                let until = if duration == 0 { 0 } else { time + duration as i64 };
                if user_id == 0 {
                    self.cache
                        .update_group(group_id, |g| g.shutup_time_whole = until);
                } else {
                    if user_id == self.account_id {
                        self.cache
                            .update_group(group_id, |g| g.shutup_time_me = until);
                    }
                    self.cache
                        .update_member(group_id, user_id, |m| m.shutup_time = until);
                }
                self.dispatch_event_at(
                    time,
                    EventKind::Notice(NoticeEvent::GroupBan {
                        group_id,
                        operator_id,
                        user_id,
                        duration,
                    }),
                );
            }

            Push::GroupTransferred {
                group_id,
                operator_id,
                user_id,
                time,
            } => {
                self.cache.update_group(group_id, |g| g.owner_id = user_id);
                self.cache
                    .update_member(group_id, user_id, |m| m.role = GroupRole::Owner);
                self.cache
                    .update_member(group_id, operator_id, |m| m.role = GroupRole::Member);
                self.dispatch_event_at(
                    time,
                    EventKind::Notice(NoticeEvent::GroupTransfer {
                        group_id,
                        operator_id,
                        user_id,
                    }),
                );
            }

            Push::GroupPoke {
                group_id,
                operator_id,
                user_id,
                time,
            } => {
                self.dispatch_event_at(
                    time,
                    EventKind::Notice(NoticeEvent::GroupPoke {
                        group_id,
                        operator_id,
                        user_id,
                    }),
                );
            }

            Push::GroupSettingChanged {
                group_id,
                field,
                enabled,
                time,
            } => {
                self.dispatch_event_at(
                    time,
                    EventKind::Notice(NoticeEvent::GroupSetting {
                        group_id,
                        field,
                        enabled,
                    }),
                );
            }

            Push::Kickoff { message, time } => {
                self.handle_kickoff(message, time).await;
            }
        }
    }
}
