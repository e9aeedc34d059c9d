use teloxide::{prelude::*, types::ParseMode};

/// Send an HTML notice to the admin group, if one is configured. Failures
/// are logged and swallowed.
pub async fn notify_admin_group(bot: &Bot, admin_group_id: Option<i64>, text: &str) {
    let Some(admin_group_id) = admin_group_id.filter(|id| *id != 0) else {
        return;
    };
    if let Err(err) = bot
        .send_message(ChatId(admin_group_id), text)
        .parse_mode(ParseMode::Html)
        .await
    {
        tracing::warn!(
            target: "telegram",
            error = %err,
            admin_group_id,
            "failed to send admin notification"
        );
    }
}
