use crate::client::Client;
use crate::types::envelope::{CallResult, retcode};
use crate::types::message::MessageContent;
use crate::types::records::{MessageId, MessageRecord};
use crate::wire::{Command, Reply};
use log::info;

impl Client {
    /// Sends a private chat message. Throttle rejections are retried
    /// once with the fragmented encoding when `config.resend` is set.
    pub async fn send_private_msg(
        &self,
        user_id: u64,
        content: impl Into<MessageContent>,
    ) -> CallResult<MessageId> {
        let content = content.into();
        if content.is_empty() {
            return CallResult::error("cannot send an empty message");
        }
        self.send_msg_inner(move |fragmented| Command::SendPrivateMsg {
            user_id,
            content: content.clone(),
            fragmented,
        })
        .await
    }

    /// Sends a group chat message. Same throttle handling as
    /// [`Self::send_private_msg`].
    pub async fn send_group_msg(
        &self,
        group_id: u64,
        content: impl Into<MessageContent>,
    ) -> CallResult<MessageId> {
        let content = content.into();
        if content.is_empty() {
            return CallResult::error("cannot send an empty message");
        }
        self.send_msg_inner(move |fragmented| Command::SendGroupMsg {
            group_id,
            content: content.clone(),
            fragmented,
        })
        .await
    }

    async fn send_msg_inner(&self, build: impl Fn(bool) -> Command) -> CallResult<MessageId> {
        let _gate = match self.admission().await {
            Ok(gate) => gate,
            Err(result) => return result,
        };

        let mut res = self.dispatch_call(build(false)).await;
        if res.retcode == retcode::OK
            && matches!(res.data, Some(Reply::Throttled))
            && self.config.resend
        {
            info!(
                target: "Client",
                "Message throttled by rate control, retrying with fragmented encoding"
            );
            res = self.dispatch_call(build(true)).await;
        }

        if res.retcode != retcode::OK {
            return Self::carry(res);
        }
        match res.data {
            Some(Reply::MessageReceipt { message_id }) => {
                self.record_message_activity(true).await;
                CallResult::ok(MessageId { message_id })
            }
            Some(Reply::Throttled) => {
                CallResult::failed(retcode::FAILED, "message rejected by rate control")
            }
            _ => CallResult::error("unexpected reply payload"),
        }
    }

    /// Recalls a previously-sent message.
    pub async fn delete_msg(&self, message_id: &str) -> CallResult<()> {
        self.call_ack(Command::RecallMsg {
            message_id: message_id.to_string(),
        })
        .await
    }

    /// Fetches a message by its id handle.
    pub async fn get_msg(&self, message_id: &str) -> CallResult<MessageRecord> {
        let res = self
            .call(Command::GetMsg {
                message_id: message_id.to_string(),
            })
            .await;
        if res.retcode != retcode::OK {
            return Self::carry(res);
        }
        match res.data {
            Some(Reply::Message(Some(record))) => CallResult::ok(record),
            Some(Reply::Message(None)) => {
                CallResult::failed(retcode::FAILED, "message not found")
            }
            _ => CallResult::error("unexpected reply payload"),
        }
    }
}
