use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use teloxide::{
    dispatching::Dispatcher,
    error_handlers::ErrorHandler,
    net::Download,
    prelude::*,
    types::{Document, Message},
    update_listeners,
    utils::command::BotCommands,
};

use crate::{
    config::AppConfig,
    domain::{DigestRequest, RequestKind, RequestOrigin},
    infrastructure::shutdown::ShutdownListener,
    tasks::queue::{Priority, RequestQueue},
};

use super::{
    types::{AppState, BotResult, CurrentRun, GeneralCommand},
    utils::{check_upload, format_status, format_user_display, is_news_trigger, user_to_i64},
};

const WELCOME: &str = "🎓 Welcome to the UPSC News Agent! 📰\n\n\
I can help you with:\n\n\
1️⃣ Daily News Analysis\n\
   - Send /news or just the word \"news\"\n\
   - I fetch, filter and analyze today's important news for UPSC\n\
   - You get a detailed digest with potential exam questions\n\n\
2️⃣ Newspaper Analysis\n\
   - Send me a PDF (or TXT) of any newspaper\n\
   - I keep only the UPSC-relevant articles\n\
   - Each comes with a simplified explanation and practice questions\n\n\
Let's start your UPSC preparation journey! 🚀";

/// Documents one chat may have waiting at a time.
const MAX_QUEUED_DOCUMENTS_PER_CHAT: usize = 2;

const QUEUE_FULL_REPLY: &str = "🕒 You already have newspapers waiting to be analyzed. \
Please send this one again once they are done.";

const FALLBACK_REPLY: &str = "I didn't understand that. Try:\n\
• Send 'news' for daily UPSC news analysis\n\
• Send a newspaper PDF for analysis";

pub struct TelegramService {
    bot: Bot,
    state: Arc<AppState>,
}

/// Logs polling failures by kind; the dispatcher keeps retrying on its own.
struct ListenerErrorLogger;

impl ListenerErrorLogger {
    fn issue_kind(error: &teloxide::RequestError) -> &'static str {
        match error {
            teloxide::RequestError::Network(source) if source.is_timeout() => "timeout",
            teloxide::RequestError::Network(source) if source.is_connect() => "connection",
            teloxide::RequestError::Network(_) => "network",
            teloxide::RequestError::RetryAfter(_) => "rate limited",
            _ => "api",
        }
    }
}

impl ErrorHandler<teloxide::RequestError> for ListenerErrorLogger {
    fn handle_error(self: Arc<Self>, error: teloxide::RequestError) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            tracing::error!(
                target: "telegram",
                issue = Self::issue_kind(&error),
                error = %error,
                "update listener error"
            );
        })
    }
}

impl TelegramService {
    pub fn new(
        bot: Bot,
        config: Arc<AppConfig>,
        queue: Arc<RequestQueue<DigestRequest>>,
        current: CurrentRun,
    ) -> Self {
        let state = Arc::new(AppState {
            config,
            queue,
            current,
        });
        Self { bot, state }
    }

    pub async fn run(&self, mut shutdown: ShutdownListener) -> Result<()> {
        self.bot
            .set_my_commands(GeneralCommand::bot_commands())
            .await?;
        let me = self.bot.get_me().await?;
        tracing::info!(
            target: "telegram",
            bot_id = me.id.0,
            username = ?me.username,
            "connected to Telegram"
        );

        let handler = Update::filter_message()
            .branch(
                dptree::entry()
                    .filter_command::<GeneralCommand>()
                    .endpoint(Self::on_command),
            )
            .branch(
                dptree::filter(|msg: Message| msg.document().is_some())
                    .endpoint(Self::on_document),
            )
            .branch(dptree::endpoint(Self::on_plain_message));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.state.clone()])
            .default_handler(|update| async move {
                tracing::debug!(target: "telegram", ?update, "unhandled update");
            })
            .build();

        let listener = update_listeners::polling_default(self.bot.clone()).await;
        let shutdown_token = dispatcher.shutdown_token();
        let mut dispatcher_future = Box::pin(
            dispatcher.dispatch_with_listener(listener, Arc::new(ListenerErrorLogger)),
        );
        let mut dispatcher_finished = false;

        tokio::select! {
            _ = shutdown.notified() => {
                tracing::info!(target: "telegram", "dispatcher shutdown requested");
                if let Ok(wait) = shutdown_token.shutdown() {
                    wait.await;
                }
            }
            _ = &mut dispatcher_future => {
                dispatcher_finished = true;
                tracing::info!(target: "telegram", "dispatcher stopped");
            }
        }

        if !dispatcher_finished {
            dispatcher_future.await;
        }

        Ok(())
    }

    async fn on_command(
        bot: Bot,
        msg: Message,
        cmd: GeneralCommand,
        state: Arc<AppState>,
    ) -> BotResult<()> {
        match cmd {
            GeneralCommand::Start => {
                bot.send_message(msg.chat.id, WELCOME).await?;
            }
            GeneralCommand::Help => {
                bot.send_message(msg.chat.id, GeneralCommand::descriptions().to_string())
                    .await?;
            }
            GeneralCommand::News => Self::enqueue_news(&bot, &msg, &state).await?,
            GeneralCommand::Status => {
                let current = state.current_run();
                bot.send_message(
                    msg.chat.id,
                    format_status(state.queue_snapshot(), current.as_deref()),
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn on_plain_message(bot: Bot, msg: Message, state: Arc<AppState>) -> BotResult<()> {
        let Some(text) = msg.text() else {
            return Ok(());
        };
        if is_news_trigger(text) {
            return Self::enqueue_news(&bot, &msg, &state).await;
        }
        if msg.chat.is_private() {
            bot.send_message(msg.chat.id, FALLBACK_REPLY).await?;
        }
        Ok(())
    }

    async fn enqueue_news(bot: &Bot, msg: &Message, state: &AppState) -> BotResult<()> {
        let chat_id = msg.chat.id;
        let request = DigestRequest::news(
            chat_id,
            msg.from.as_ref().map(user_to_i64),
            RequestOrigin::Command,
        );
        let queued = state.queue.push_unique(Priority::Normal, request, |queued| {
            queued.chat_id == chat_id && matches!(queued.kind, RequestKind::DailyNews)
        });

        tracing::info!(
            target: "telegram",
            chat_id = chat_id.0,
            from = %msg.from.as_ref().map(format_user_display).unwrap_or_default(),
            queued,
            "news digest requested"
        );

        let reply = if queued {
            let waiting = state.queue_snapshot();
            let ahead = (waiting.high_priority + waiting.normal_priority).saturating_sub(1);
            if ahead == 0 && state.current_run().is_none() {
                "🔄 Starting UPSC news analysis... This may take a few minutes.".to_string()
            } else {
                format!("🕒 Your news digest is queued. Requests ahead of you: {ahead}.")
            }
        } else {
            "🕒 A news digest for this chat is already queued.".to_string()
        };
        bot.send_message(chat_id, reply).await?;
        Ok(())
    }

    async fn on_document(bot: Bot, msg: Message, state: Arc<AppState>) -> BotResult<()> {
        let Some(document) = msg.document() else {
            return Ok(());
        };
        let file_name = match check_upload(
            document.file_name.as_deref(),
            document.file.size,
            state.config.max_document_bytes,
        ) {
            Ok(name) => name,
            Err(reply) => {
                bot.send_message(msg.chat.id, reply).await?;
                return Ok(());
            }
        };

        let chat_id = msg.chat.id;
        let same_chat =
            move |queued: &DigestRequest| queued.chat_id == chat_id && !matches!(queued.kind, RequestKind::DailyNews);
        if state.queue.count(Priority::High, same_chat) >= MAX_QUEUED_DOCUMENTS_PER_CHAT {
            bot.send_message(chat_id, QUEUE_FULL_REPLY).await?;
            return Ok(());
        }

        let bytes = match Self::download(&bot, document).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(
                    target: "telegram",
                    chat_id = msg.chat.id.0,
                    error = %err,
                    "document download failed"
                );
                bot.send_message(
                    msg.chat.id,
                    "❌ I couldn't download that file. Please try sending it again.",
                )
                .await?;
                return Ok(());
            }
        };

        tracing::info!(
            target: "telegram",
            chat_id = msg.chat.id.0,
            file = %file_name,
            bytes = bytes.len(),
            "document received"
        );
        let request = DigestRequest::document(
            msg.chat.id,
            msg.from.as_ref().map(user_to_i64),
            file_name,
            bytes,
        );
        if !state
            .queue
            .push_capped(Priority::High, request, same_chat, MAX_QUEUED_DOCUMENTS_PER_CHAT)
        {
            bot.send_message(chat_id, QUEUE_FULL_REPLY).await?;
            return Ok(());
        }
        bot.send_message(
            msg.chat.id,
            "📄 Newspaper received!\n🔍 Extracting UPSC-relevant content...\nThis may take several minutes...",
        )
        .await?;
        Ok(())
    }

    async fn download(bot: &Bot, document: &Document) -> Result<Vec<u8>> {
        let file = bot.get_file(document.file.id.clone()).await?;
        let mut bytes = Vec::with_capacity(document.file.size as usize);
        bot.download_file(&file.path, &mut bytes).await?;
        Ok(bytes)
    }
}
