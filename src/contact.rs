use crate::cache::FetchKey;
use crate::client::Client;
use crate::types::envelope::{CallResult, retcode};
use crate::types::records::{FriendInfo, StrangerInfo};
use crate::wire::{Command, Reply};
use std::collections::HashMap;

impl Client {
    /// Snapshot of the friend cache. Served locally; use
    /// [`Client::reload_friend_list`] to refresh from the server.
    pub fn get_friend_list(&self) -> CallResult<HashMap<u64, FriendInfo>> {
        CallResult::ok(self.cache.friends_snapshot())
    }

    /// Snapshot of the stranger cache.
    pub fn get_stranger_list(&self) -> CallResult<HashMap<u64, StrangerInfo>> {
        CallResult::ok(self.cache.strangers_snapshot())
    }

    /// Cache-first friend profile lookup. Friend profiles have no
    /// per-entry fetch on the wire; a forced refresh goes through the
    /// bulk friend-list reload.
    pub async fn get_friend_info(&self, user_id: u64, no_cache: bool) -> CallResult<FriendInfo> {
        {
            let _gate = match self.admission().await {
                Ok(gate) => gate,
                Err(result) => return result,
            };
            if !no_cache && let Some(info) = self.cache.friend(user_id) {
                return CallResult::ok(info);
            }
            // The gate's read side must be released before the reload
            // takes its write side.
        }
        let res = self.reload_friend_list().await;
        if !res.is_ok() {
            return Self::carry(res);
        }
        match self.cache.friend(user_id) {
            Some(info) => CallResult::ok(info),
            None => CallResult::failed(retcode::FAILED, "not a friend"),
        }
    }

    /// Cache-first stranger profile lookup. Concurrent cold reads of the
    /// same id are collapsed into one network fetch.
    pub async fn get_stranger_info(&self, user_id: u64, no_cache: bool) -> CallResult<StrangerInfo> {
        let _gate = match self.admission().await {
            Ok(gate) => gate,
            Err(result) => return result,
        };
        if !no_cache && let Some(info) = self.cache.stranger(user_id) {
            return CallResult::ok(info);
        }

        let key = FetchKey::Stranger(user_id);
        let lock = self.cache.fetch_lock(key);
        let guard = lock.lock().await;

        // Another caller may have completed the fetch while we queued.
        if !no_cache && let Some(info) = self.cache.stranger(user_id) {
            drop(guard);
            self.cache.release_fetch_lock(&key);
            return CallResult::ok(info);
        }

        let res = self.dispatch_call(Command::GetStrangerInfo { user_id }).await;
        let out = if res.retcode == retcode::OK {
            match res.data {
                Some(Reply::Stranger(Some(info))) => {
                    self.cache.upsert_stranger(info.clone());
                    CallResult::ok(info)
                }
                Some(Reply::Stranger(None)) => {
                    // A "not found" evicts any stale entry.
                    self.cache.remove_stranger(user_id);
                    CallResult::failed(retcode::FAILED, "user not found")
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

    /// Approves or rejects a pending friend request by its flag token.
    pub async fn set_friend_add_request(
        &self,
        flag: &str,
        approve: bool,
        remark: &str,
        block: bool,
    ) -> CallResult<()> {
        self.call_ack(Command::SetFriendAddRequest {
            flag: flag.to_string(),
            approve,
            remark: remark.to_string(),
            block,
        })
        .await
    }

    /// Approves or rejects a pending group-join request by its flag token.
    pub async fn set_group_add_request(
        &self,
        flag: &str,
        approve: bool,
        reason: &str,
        block: bool,
    ) -> CallResult<()> {
        self.call_ack(Command::SetGroupAddRequest {
            flag: flag.to_string(),
            approve,
            reason: reason.to_string(),
            block,
        })
        .await
    }

    /// Asks a group member to become a friend. The shared group is the
    /// verification context the server demands.
    pub async fn add_friend(&self, group_id: u64, user_id: u64, comment: &str) -> CallResult<()> {
        self.call_ack(Command::AddFriend {
            group_id,
            user_id,
            comment: comment.to_string(),
        })
        .await
    }

    /// Applies to join a group.
    pub async fn add_group(&self, group_id: u64, comment: &str) -> CallResult<()> {
        self.call_ack(Command::AddGroup {
            group_id,
            comment: comment.to_string(),
        })
        .await
    }

    /// Removes a friend. The cache entry is evicted as soon as the
    /// server confirms; the matching `notice.friend.decrease` push (if
    /// any) is then a no-op on the cache.
    pub async fn delete_friend(&self, user_id: u64, block: bool) -> CallResult<()> {
        let res = self.call_ack(Command::DeleteFriend { user_id, block }).await;
        if res.is_ok() {
            self.cache.remove_friend(user_id);
        }
        res
    }

    /// Invites a friend into a group the account administers.
    pub async fn invite_friend(&self, group_id: u64, user_id: u64) -> CallResult<()> {
        self.call_ack(Command::InviteFriend { group_id, user_id }).await
    }

    /// Sends profile "likes"; the server caps this at 20 per target per
    /// day.
    pub async fn send_like(&self, user_id: u64, times: u8) -> CallResult<()> {
        if times == 0 || times > 20 {
            return CallResult::error("times must be between 1 and 20");
        }
        self.call_ack(Command::SendLike { user_id, times }).await
    }
}
