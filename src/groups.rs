use crate::cache::FetchKey;
use crate::client::Client;
use crate::types::envelope::{CallResult, retcode};
use crate::types::records::{GroupInfo, MemberInfo};
use crate::wire::{Command, Reply};
use std::collections::HashMap;

impl Client {
    /// Snapshot of the group cache. Served locally; use
    /// [`Client::reload_group_list`] to refresh from the server.
    pub fn get_group_list(&self) -> CallResult<HashMap<u64, GroupInfo>> {
        CallResult::ok(self.cache.groups_snapshot())
    }

    /// Cache-first group profile lookup.
    pub async fn get_group_info(&self, group_id: u64, no_cache: bool) -> CallResult<GroupInfo> {
        let _gate = match self.admission().await {
            Ok(gate) => gate,
            Err(result) => return result,
        };
        if !no_cache && let Some(info) = self.cache.group(group_id) {
            return CallResult::ok(info);
        }

        let key = FetchKey::Group(group_id);
        let lock = self.cache.fetch_lock(key);
        let guard = lock.lock().await;

        if !no_cache && let Some(info) = self.cache.group(group_id) {
            drop(guard);
            self.cache.release_fetch_lock(&key);
            return CallResult::ok(info);
        }

        let res = self.dispatch_call(Command::GetGroupInfo { group_id }).await;
        let out = if res.retcode == retcode::OK {
            match res.data {
                Some(Reply::Group(Some(info))) => {
                    self.cache.upsert_group(info.clone());
                    CallResult::ok(info)
                }
                Some(Reply::Group(None)) => {
                    self.cache.remove_group(group_id);
                    CallResult::failed(retcode::FAILED, "group not found")
                }
                _ => CallResult::error("unexpected reply payload"),
            }
        } else {
            Self::carry(res)
        };

        drop(guard);
        self.cache.release_fetch_lock(&key);
        out
    }

    /// Member list of one group. The nested map is loaded on first use;
    /// a loaded-but-empty list is a valid cached state and will not
    /// trigger another fetch.
    pub async fn get_group_member_list(
        &self,
        group_id: u64,
        no_cache: bool,
    ) -> CallResult<HashMap<u64, MemberInfo>> {
        let _gate = match self.admission().await {
            Ok(gate) => gate,
            Err(result) => return result,
        };
        if !no_cache && let Some(members) = self.cache.members_snapshot(group_id) {
            return CallResult::ok(members);
        }

        let key = FetchKey::MemberList(group_id);
        let lock = self.cache.fetch_lock(key);
        let guard = lock.lock().await;

        if !no_cache && let Some(members) = self.cache.members_snapshot(group_id) {
            drop(guard);
            self.cache.release_fetch_lock(&key);
            return CallResult::ok(members);
        }

        let res = self.dispatch_call(Command::FetchMemberList { group_id }).await;
        let out = if res.retcode == retcode::OK {
            match res.data {
                Some(Reply::MemberList(Some(list))) => {
                    self.cache.set_member_list(group_id, list);
                    match self.cache.members_snapshot(group_id) {
                        Some(members) => CallResult::ok(members),
                        None => CallResult::error("member list vanished during load"),
                    }
                }
                Some(Reply::MemberList(None)) => {
                    // The group itself is gone; drop everything we hold
                    // for it.
                    self.cache.remove_group(group_id);
                    CallResult::failed(retcode::FAILED, "group not found")
                }
                _ => CallResult::error("unexpected reply payload"),
            }
        } else {
            Self::carry(res)
        };

        drop(guard);
        self.cache.release_fetch_lock(&key);
        out
    }

    /// Cache-first member profile lookup.
    pub async fn get_group_member_info(
        &self,
        group_id: u64,
        user_id: u64,
        no_cache: bool,
    ) -> CallResult<MemberInfo> {
        let _gate = match self.admission().await {
            Ok(gate) => gate,
            Err(result) => return result,
        };
        if !no_cache && let Some(member) = self.cache.member(group_id, user_id) {
            return CallResult::ok(member);
        }

        let key = FetchKey::Member(group_id, user_id);
        let lock = self.cache.fetch_lock(key);
        let guard = lock.lock().await;

        if !no_cache && let Some(member) = self.cache.member(group_id, user_id) {
            drop(guard);
            self.cache.release_fetch_lock(&key);
            return CallResult::ok(member);
        }

        let res = self
            .dispatch_call(Command::GetMemberInfo { group_id, user_id })
            .await;
        let out = if res.retcode == retcode::OK {
            match res.data {
                Some(Reply::Member(Some(member))) => {
                    self.cache.upsert_member(member.clone());
                    CallResult::ok(member)
                }
                Some(Reply::Member(None)) => {
                    self.cache.remove_member(group_id, user_id);
                    CallResult::failed(retcode::FAILED, "member not found")
                }
                _ => CallResult::error("unexpected reply payload"),
            }
        } else {
            Self::carry(res)
        };

        drop(guard);
        self.cache.release_fetch_lock(&key);
        out
    }

    // ---- administration ----

    pub async fn set_group_name(&self, group_id: u64, name: &str) -> CallResult<()> {
        let res = self
            .call_ack(Command::SetGroupName {
                group_id,
                name: name.to_string(),
            })
            .await;
        if res.is_ok() {
            self.cache
                .update_group(group_id, |g| g.group_name = name.to_string());
        }
        res
    }

    pub async fn set_group_card(&self, group_id: u64, user_id: u64, card: &str) -> CallResult<()> {
        let res = self
            .call_ack(Command::SetGroupCard {
                group_id,
                user_id,
                card: card.to_string(),
            })
            .await;
        if res.is_ok() {
            self.cache
                .update_member(group_id, user_id, |m| m.card = card.to_string());
        }
        res
    }

    /// Grants or revokes admin. The cache is updated by the
    /// `notice.group.admin` push that confirms the change.
    pub async fn set_group_admin(&self, group_id: u64, user_id: u64, enable: bool) -> CallResult<()> {
        self.call_ack(Command::SetGroupAdmin {
            group_id,
            user_id,
            enable,
        })
        .await
    }

    pub async fn set_group_special_title(
        &self,
        group_id: u64,
        user_id: u64,
        title: &str,
        duration: u32,
    ) -> CallResult<()> {
        self.call_ack(Command::SetGroupSpecialTitle {
            group_id,
            user_id,
            title: title.to_string(),
            duration,
        })
        .await
    }

    /// Kicks a member. The member cache entry is removed by the
    /// `notice.group.decrease` push.
    pub async fn set_group_kick(
        &self,
        group_id: u64,
        user_id: u64,
        reject_add_request: bool,
    ) -> CallResult<()> {
        self.call_ack(Command::SetGroupKick {
            group_id,
            user_id,
            reject_add_request,
        })
        .await
    }

    /// Mutes a member for `duration` seconds (0 lifts the mute).
    pub async fn set_group_ban(&self, group_id: u64, user_id: u64, duration: u32) -> CallResult<()> {
        self.call_ack(Command::SetGroupBan {
            group_id,
            user_id,
            duration,
        })
        .await
    }

    pub async fn set_group_whole_ban(&self, group_id: u64, enable: bool) -> CallResult<()> {
        self.call_ack(Command::SetGroupWholeBan { group_id, enable }).await
    }

    pub async fn set_group_anonymous(&self, group_id: u64, enable: bool) -> CallResult<()> {
        self.call_ack(Command::SetGroupAnonymous { group_id, enable }).await
    }

    /// Leaves the group, or dismisses it when the account owns it. The
    /// group is dropped from the cache once the server confirms.
    pub async fn set_group_leave(&self, group_id: u64, dismiss: bool) -> CallResult<()> {
        let res = self.call_ack(Command::LeaveGroup { group_id, dismiss }).await;
        if res.is_ok() {
            self.cache.remove_group(group_id);
        }
        res
    }

    pub async fn send_group_notice(&self, group_id: u64, content: &str) -> CallResult<()> {
        self.call_ack(Command::SendGroupNotice {
            group_id,
            content: content.to_string(),
        })
        .await
    }

    pub async fn send_group_poke(&self, group_id: u64, user_id: u64) -> CallResult<()> {
        self.call_ack(Command::SendGroupPoke { group_id, user_id }).await
    }
}
