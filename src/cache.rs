//! Authoritative social-graph cache.
//!
//! All four mappings are mutated either by the sequential inbound push
//! path or by a facade operation applying a fetched result; readers get a
//! cloned snapshot and never observe a half-applied change. Bulk reloads
//! replace an entire top-level mapping in one write, and only after the
//! full remote listing succeeded.

use crate::types::records::{FriendInfo, GroupInfo, MemberInfo, StrangerInfo};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;

/// Key for the single-flight fetch locks. One lock per distinct remote
/// lookup, so two concurrent cold reads of the same entity issue one
/// network fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum FetchKey {
    Stranger(u64),
    Group(u64),
    Member(u64, u64),
    MemberList(u64),
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct CacheManager {
    friends: RwLock<HashMap<u64, FriendInfo>>,
    strangers: RwLock<HashMap<u64, StrangerInfo>>,
    groups: RwLock<HashMap<u64, GroupInfo>>,
    /// Nested member maps. A missing outer key means the group's member
    /// list has never been loaded; an empty inner map means it was loaded
    /// and the group has no members. The two are never conflated.
    members: RwLock<HashMap<u64, HashMap<u64, MemberInfo>>>,
    fetch_locks: DashMap<FetchKey, Arc<Mutex<()>>>,
}

impl CacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- friends ----

    pub fn friend(&self, user_id: u64) -> Option<FriendInfo> {
        read(&self.friends).get(&user_id).cloned()
    }

    pub fn friends_snapshot(&self) -> HashMap<u64, FriendInfo> {
        read(&self.friends).clone()
    }

    pub fn upsert_friend(&self, friend: FriendInfo) {
        write(&self.friends).insert(friend.user_id, friend);
    }

    pub fn remove_friend(&self, user_id: u64) -> bool {
        write(&self.friends).remove(&user_id).is_some()
    }

    /// Replaces the whole friend mapping in one step.
    pub fn replace_friends(&self, list: Vec<FriendInfo>) {
        let map: HashMap<u64, FriendInfo> = list.into_iter().map(|f| (f.user_id, f)).collect();
        *write(&self.friends) = map;
    }

    // ---- strangers ----

    pub fn stranger(&self, user_id: u64) -> Option<StrangerInfo> {
        read(&self.strangers).get(&user_id).cloned()
    }

    pub fn strangers_snapshot(&self) -> HashMap<u64, StrangerInfo> {
        read(&self.strangers).clone()
    }

    pub fn upsert_stranger(&self, stranger: StrangerInfo) {
        write(&self.strangers).insert(stranger.user_id, stranger);
    }

    pub fn remove_stranger(&self, user_id: u64) -> bool {
        write(&self.strangers).remove(&user_id).is_some()
    }

    // ---- groups ----

    pub fn group(&self, group_id: u64) -> Option<GroupInfo> {
        read(&self.groups).get(&group_id).cloned()
    }

    pub fn groups_snapshot(&self) -> HashMap<u64, GroupInfo> {
        read(&self.groups).clone()
    }

    pub fn upsert_group(&self, group: GroupInfo) {
        write(&self.groups).insert(group.group_id, group);
    }

    pub fn update_group<F>(&self, group_id: u64, f: F) -> bool
    where
        F: FnOnce(&mut GroupInfo),
    {
        match write(&self.groups).get_mut(&group_id) {
            Some(group) => {
                f(group);
                true
            }
            None => false,
        }
    }

    /// Removes a group and its member map (kicked, left, or dismissed).
    pub fn remove_group(&self, group_id: u64) -> bool {
        let removed = write(&self.groups).remove(&group_id).is_some();
        write(&self.members).remove(&group_id);
        removed
    }

    /// Replaces the whole group mapping in one step. Member maps of
    /// groups that no longer exist are dropped with their group.
    pub fn replace_groups(&self, list: Vec<GroupInfo>) {
        let map: HashMap<u64, GroupInfo> = list.into_iter().map(|g| (g.group_id, g)).collect();
        write(&self.members).retain(|group_id, _| map.contains_key(group_id));
        *write(&self.groups) = map;
    }

    // ---- members ----

    /// Whether the member list of `group_id` has been loaded at all.
    pub fn members_loaded(&self, group_id: u64) -> bool {
        read(&self.members).contains_key(&group_id)
    }

    /// `None` when the list was never loaded; `Some(empty)` when it was
    /// loaded and the group has no members.
    pub fn members_snapshot(&self, group_id: u64) -> Option<HashMap<u64, MemberInfo>> {
        read(&self.members).get(&group_id).cloned()
    }

    pub fn member(&self, group_id: u64, user_id: u64) -> Option<MemberInfo> {
        read(&self.members)
            .get(&group_id)
            .and_then(|m| m.get(&user_id).cloned())
    }

    pub fn set_member_list(&self, group_id: u64, list: Vec<MemberInfo>) {
        let map: HashMap<u64, MemberInfo> = list.into_iter().map(|m| (m.user_id, m)).collect();
        write(&self.members).insert(group_id, map);
    }

    pub fn remove_member_list(&self, group_id: u64) {
        write(&self.members).remove(&group_id);
    }

    /// Inserts into an already-loaded member map. A map that was never
    /// loaded stays absent: lazily materializing a single member would
    /// make it look loaded-and-tiny.
    pub fn upsert_member(&self, member: MemberInfo) {
        if let Some(map) = write(&self.members).get_mut(&member.group_id) {
            map.insert(member.user_id, member);
        }
    }

    pub fn update_member<F>(&self, group_id: u64, user_id: u64, f: F) -> bool
    where
        F: FnOnce(&mut MemberInfo),
    {
        match write(&self.members)
            .get_mut(&group_id)
            .and_then(|m| m.get_mut(&user_id))
        {
            Some(member) => {
                f(member);
                true
            }
            None => false,
        }
    }

    pub fn remove_member(&self, group_id: u64, user_id: u64) -> bool {
        match write(&self.members).get_mut(&group_id) {
            Some(map) => map.remove(&user_id).is_some(),
            None => false,
        }
    }

    // ---- single-flight ----

    pub(crate) fn fetch_lock(&self, key: FetchKey) -> Arc<Mutex<()>> {
        self.fetch_locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the lock entry once a fetch settled, so the map stays
    /// bounded by the number of fetches in flight.
    pub(crate) fn release_fetch_lock(&self, key: &FetchKey) {
        self.fetch_locks.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(group_id: u64, user_id: u64) -> MemberInfo {
        MemberInfo {
            group_id,
            user_id,
            nickname: format!("user-{user_id}"),
            ..Default::default()
        }
    }

    #[test]
    fn absent_and_empty_member_maps_are_distinct() {
        let cache = CacheManager::new();

        assert!(!cache.members_loaded(100));
        assert!(cache.members_snapshot(100).is_none());

        cache.set_member_list(100, Vec::new());
        assert!(cache.members_loaded(100));
        assert_eq!(cache.members_snapshot(100), Some(HashMap::new()));
    }

    #[test]
    fn upsert_member_does_not_materialize_unloaded_map() {
        let cache = CacheManager::new();
        cache.upsert_member(member(100, 1));
        assert!(!cache.members_loaded(100));

        cache.set_member_list(100, vec![member(100, 1)]);
        cache.upsert_member(member(100, 2));
        assert_eq!(cache.members_snapshot(100).unwrap().len(), 2);
    }

    #[test]
    fn replace_groups_drops_member_maps_of_vanished_groups() {
        let cache = CacheManager::new();
        cache.upsert_group(GroupInfo {
            group_id: 1,
            ..Default::default()
        });
        cache.set_member_list(1, vec![member(1, 5)]);
        cache.set_member_list(2, vec![member(2, 6)]);

        cache.replace_groups(vec![GroupInfo {
            group_id: 2,
            ..Default::default()
        }]);

        assert!(!cache.members_loaded(1));
        assert!(cache.members_loaded(2));
        assert!(cache.group(1).is_none());
        assert!(cache.group(2).is_some());
    }

    #[test]
    fn remove_group_takes_members_with_it() {
        let cache = CacheManager::new();
        cache.upsert_group(GroupInfo {
            group_id: 7,
            ..Default::default()
        });
        cache.set_member_list(7, vec![member(7, 1)]);

        assert!(cache.remove_group(7));
        assert!(cache.group(7).is_none());
        assert!(!cache.members_loaded(7));
    }

    #[test]
    fn fetch_locks_are_shared_then_released() {
        let cache = CacheManager::new();
        let a = cache.fetch_lock(FetchKey::Stranger(55));
        let b = cache.fetch_lock(FetchKey::Stranger(55));
        assert!(Arc::ptr_eq(&a, &b));

        cache.release_fetch_lock(&FetchKey::Stranger(55));
        let c = cache.fetch_lock(FetchKey::Stranger(55));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
