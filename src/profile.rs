use crate::client::Client;
use crate::types::envelope::CallResult;
use crate::types::records::{ONLINE_STATUS_CODES, Sex};
use crate::wire::Command;
use std::sync::atomic::Ordering;

impl Client {
    /// Sets the account's online-status code (11 online, 31 away,
    /// 41 invisible, 50 busy, 60 q-me, 70 do-not-disturb).
    pub async fn set_online_status(&self, status: u8) -> CallResult<()> {
        if !ONLINE_STATUS_CODES.contains(&status) {
            return CallResult::error("invalid online status code");
        }
        let res = self.call_ack(Command::SetOnlineStatus { status }).await;
        if res.is_ok() {
            self.online_status.store(status, Ordering::Relaxed);
        }
        res
    }

    pub async fn set_nickname(&self, nickname: &str) -> CallResult<()> {
        let res = self
            .call_ack(Command::SetNickname {
                nickname: nickname.to_string(),
            })
            .await;
        if res.is_ok()
            && let Some(info) = self.login_info.write().await.as_mut()
        {
            info.nickname = nickname.to_string();
        }
        res
    }

    /// Gender code: 0 unknown, 1 male, 2 female.
    pub async fn set_gender(&self, gender: u8) -> CallResult<()> {
        if gender > 2 {
            return CallResult::error("gender must be 0, 1 or 2");
        }
        let res = self.call_ack(Command::SetGender { gender }).await;
        if res.is_ok()
            && let Some(info) = self.login_info.write().await.as_mut()
        {
            info.sex = Sex::from_code(gender);
        }
        res
    }

    /// Birthday in `yyyymmdd` form, e.g. `20110202`.
    pub async fn set_birthday(&self, birthday: u32) -> CallResult<()> {
        self.call_ack(Command::SetBirthday { birthday }).await
    }

    pub async fn set_signature(&self, signature: &str) -> CallResult<()> {
        self.call_ack(Command::SetSignature {
            signature: signature.to_string(),
        })
        .await
    }

    pub async fn set_description(&self, description: &str) -> CallResult<()> {
        self.call_ack(Command::SetDescription {
            description: description.to_string(),
        })
        .await
    }
}
