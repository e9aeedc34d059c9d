use anyhow::Result;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use teloxide::{
    prelude::*,
    types::{ChatId, MessageId},
    ApiError, RequestError,
};

use crate::pipeline::ProgressTransport;

/// One chat message that is sent once and then edited in place.
pub struct TelegramProgress {
    bot: Bot,
    chat_id: ChatId,
    message_id: Mutex<Option<MessageId>>,
}

impl TelegramProgress {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self {
            bot,
            chat_id,
            message_id: Mutex::new(None),
        }
    }

    async fn send_or_edit(&self, text: &str) -> Result<()> {
        let existing = *self.message_id.lock();
        match existing {
            None => {
                let sent = self.bot.send_message(self.chat_id, text).await?;
                *self.message_id.lock() = Some(sent.id);
            }
            Some(id) => match self.bot.edit_message_text(self.chat_id, id, text).await {
                Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => {}
                Err(err) => return Err(err.into()),
            },
        }
        Ok(())
    }
}

impl ProgressTransport for TelegramProgress {
    fn publish<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.send_or_edit(text))
    }
}
