//! Transport-independent bot behaviour: quotas, routing and replies.
//!
//! The Telegram adapter turns updates into calls on [`MediaBot`]; everything
//! outbound goes through the [`MessagingPort`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    callbacks::CallbackAction,
    config::Config,
    domain::{ChatId, MediaFormat, MessageRef, Plan, UserId},
    errors::Error,
    formatting::clamp_html,
    media::{DownloadedMedia, MediaDownloader},
    messages,
    messaging::{port::MessagingPort, types::InlineKeyboard},
    summarize::ArticleSummarizer,
    urls::{extract_url, is_youtube_url, route, LinkEntity, Route},
    users::{Quota, UserStore},
    Result,
};

const REFERRAL_PREFIX: &str = "ref_";
/// Referrals waiting for their user to press subscribe.
const MAX_PENDING_REFERRALS: usize = 10_000;

/// Who sent an update.
#[derive(Clone, Debug)]
pub struct Sender {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub first_name: String,
}

/// A pressed inline button.
#[derive(Clone, Debug)]
pub struct CallbackContext {
    pub callback_id: String,
    pub from: Sender,
    /// The message carrying the keyboard, edited in place when present.
    pub message: Option<MessageRef>,
    pub data: String,
}

/// Serializes quota-consuming work per user so a check and its increment
/// cannot interleave with another request from the same user.
#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub async fn lock_user(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(user_id.0)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub struct MediaBot {
    cfg: Arc<Config>,
    users: Arc<UserStore>,
    downloader: MediaDownloader,
    summarizer: ArticleSummarizer,
    messenger: Arc<dyn MessagingPort>,
    user_locks: UserLocks,
    pending_referrals: StdMutex<HashMap<i64, String>>,
}

impl MediaBot {
    pub fn new(
        cfg: Arc<Config>,
        users: Arc<UserStore>,
        downloader: MediaDownloader,
        summarizer: ArticleSummarizer,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            cfg,
            users,
            downloader,
            summarizer,
            messenger,
            user_locks: UserLocks::default(),
            pending_referrals: StdMutex::new(HashMap::new()),
        }
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    /// `/start [payload]`. A `ref_<code>` payload is kept for the subscribe button.
    pub async fn start(&self, from: &Sender, payload: &str) -> Result<()> {
        let code = payload
            .trim()
            .strip_prefix(REFERRAL_PREFIX)
            .filter(|c| !c.is_empty());
        {
            let mut pending = self
                .pending_referrals
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            match code {
                Some(code) if !self.users.is_subscribed(from.user_id) => {
                    if pending.len() < MAX_PENDING_REFERRALS
                        || pending.contains_key(&from.user_id.0)
                    {
                        pending.insert(from.user_id.0, code.to_string());
                    } else {
                        tracing::debug!(user_id = from.user_id.0, "pending referrals full");
                    }
                }
                _ => {
                    pending.remove(&from.user_id.0);
                }
            }
        }
        self.show_start(from, None).await
    }

    pub async fn help(&self, chat_id: ChatId) -> Result<()> {
        self.messenger
            .send_html(chat_id, &messages::help(), None)
            .await?;
        Ok(())
    }

    /// `/audio <url>`.
    pub async fn audio(&self, from: &Sender, args: &str) -> Result<()> {
        if !self.users.is_subscribed(from.user_id) {
            return self.send_subscribe_first(from.chat_id).await;
        }
        let url = args.trim();
        if url.is_empty() || !is_youtube_url(url) {
            self.messenger
                .send_html(from.chat_id, &messages::audio_usage(), None)
                .await?;
            return Ok(());
        }
        self.download(from, url, MediaFormat::Audio).await
    }

    /// Plain text: expected to carry a URL.
    pub async fn handle_text(
        &self,
        from: &Sender,
        text: &str,
        entities: &[LinkEntity],
    ) -> Result<()> {
        if !self.users.is_subscribed(from.user_id) {
            return self.send_subscribe_first(from.chat_id).await;
        }

        let url = extract_url(text, entities);
        if url.is_empty() {
            return Ok(());
        }

        match route(url) {
            Route::Download(url) => self.download(from, &url, MediaFormat::Video).await,
            Route::Summarize(url) => self.summarize(from, &url).await,
        }
    }

    pub async fn callback(&self, ctx: &CallbackContext) -> Result<()> {
        let action = CallbackAction::parse(&ctx.data);
        let answer = match action {
            CallbackAction::SubscribePremium | CallbackAction::Unknown => {
                Some(messages::COMING_SOON)
            }
            _ => None,
        };
        if let Err(e) = self
            .messenger
            .answer_callback_query(&ctx.callback_id, answer)
            .await
        {
            tracing::debug!("answer callback failed: {e}");
        }

        let from = &ctx.from;
        match action {
            CallbackAction::SubscribeFree => {
                let referral = self
                    .pending_referrals
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&from.user_id.0);
                self.users.subscribe(from.user_id, referral.as_deref());
                self.replace(ctx, messages::subscribed(&self.cfg)).await
            }
            CallbackAction::UpgradePremium | CallbackAction::ViewPremium => {
                self.replace(ctx, messages::premium_info(&self.cfg)).await
            }
            CallbackAction::ViewStats => {
                let snapshot = self.users.usage(from.user_id);
                self.replace(ctx, messages::stats(from.user_id.0, &snapshot))
                    .await
            }
            CallbackAction::BackStart | CallbackAction::StartUsing => {
                self.show_start(from, ctx.message).await
            }
            CallbackAction::FreeTrial if !self.users.is_subscribed(from.user_id) => {
                self.replace(ctx, messages::subscribe_first()).await
            }
            CallbackAction::FreeTrial => {
                let reply = if self.users.start_trial(from.user_id, self.cfg.trial_days) {
                    messages::trial_started(self.cfg.trial_days)
                } else {
                    messages::trial_unavailable()
                };
                self.replace(ctx, reply).await
            }
            CallbackAction::LearnMore => self.replace(ctx, messages::learn_more()).await,
            CallbackAction::HelpDownload => {
                self.replace(ctx, messages::how_to_download(&self.cfg)).await
            }
            CallbackAction::HelpSummarize => {
                self.replace(ctx, messages::how_to_summarize(&self.cfg))
                    .await
            }
            CallbackAction::SubscribePremium | CallbackAction::Unknown => Ok(()),
        }
    }

    async fn show_start(&self, from: &Sender, edit: Option<MessageRef>) -> Result<()> {
        let reply = if self.users.is_subscribed(from.user_id) {
            let snapshot = self.users.usage(from.user_id);
            messages::welcome_back(&from.first_name, &snapshot)
        } else {
            messages::welcome_new(&self.cfg, &from.first_name)
        };
        self.send_or_edit(from.chat_id, edit, reply).await
    }

    async fn replace(&self, ctx: &CallbackContext, reply: messages::Reply) -> Result<()> {
        self.send_or_edit(ctx.from.chat_id, ctx.message, reply)
            .await
    }

    async fn send_or_edit(
        &self,
        chat_id: ChatId,
        edit: Option<MessageRef>,
        (html, kb): (String, InlineKeyboard),
    ) -> Result<()> {
        match edit {
            Some(msg) => {
                // Editing to identical content (e.g. refreshing stats) is rejected by Telegram.
                if let Err(e) = self.messenger.edit_html(msg, &html, Some(kb)).await {
                    tracing::debug!("edit failed: {e}");
                }
            }
            None => {
                self.messenger.send_html(chat_id, &html, Some(kb)).await?;
            }
        }
        Ok(())
    }

    async fn send_subscribe_first(&self, chat_id: ChatId) -> Result<()> {
        let (html, kb) = messages::subscribe_first();
        self.messenger.send_html(chat_id, &html, Some(kb)).await?;
        Ok(())
    }

    /// Check the user's quota; on exhaustion tell them and return `false`.
    async fn ensure_quota(&self, from: &Sender, quota: Quota) -> Result<bool> {
        let snapshot = self.users.usage(from.user_id);
        if snapshot.used(quota) < snapshot.limit(quota) {
            return Ok(true);
        }
        let (html, kb) = messages::limit_reached(quota, snapshot.limit(quota));
        self.messenger.send_html(from.chat_id, &html, Some(kb)).await?;
        Ok(false)
    }

    async fn download(&self, from: &Sender, url: &str, format: MediaFormat) -> Result<()> {
        let _guard = self.user_locks.lock_user(from.user_id).await;
        if !self.ensure_quota(from, Quota::Downloads).await? {
            return Ok(());
        }

        let processing = self
            .messenger
            .send_html(from.chat_id, &messages::processing_download(format), None)
            .await?;

        let plan = self.users.plan(from.user_id);
        let limits = self.cfg.limits(plan);
        let result = self.downloader.download(url, format, &limits).await;

        let outcome = match result {
            Ok(media) => {
                self.users.increment_download(from.user_id);
                self.deliver(from.chat_id, &media, plan).await
            }
            Err(e) => {
                tracing::warn!(user_id = from.user_id.0, url, "download failed: {e}");
                self.messenger
                    .send_html(from.chat_id, &messages::download_failed(&e.to_string()), None)
                    .await
                    .map(|_| ())
            }
        };

        self.drop_notice(processing).await;
        outcome
    }

    async fn deliver(
        &self,
        chat_id: ChatId,
        media: &DownloadedMedia,
        plan: Plan,
    ) -> Result<()> {
        let caption = clamp_html(
            &messages::download_caption(media, plan),
            self.messenger.capabilities().max_caption_len,
        );
        let sent = match media.format {
            MediaFormat::Video => {
                self.messenger
                    .send_video(chat_id, &media.path, &caption)
                    .await
            }
            MediaFormat::Audio => {
                self.messenger
                    .send_audio(chat_id, &media.path, &caption)
                    .await
            }
        };
        self.downloader.discard(&media.path).await;

        if let Err(e) = sent {
            tracing::warn!(path = %media.path.display(), "send media failed: {e}");
            self.messenger
                .send_html(chat_id, &messages::send_failed(), None)
                .await?;
        }
        Ok(())
    }

    async fn summarize(&self, from: &Sender, url: &str) -> Result<()> {
        let _guard = self.user_locks.lock_user(from.user_id).await;
        if !self.ensure_quota(from, Quota::Summaries).await? {
            return Ok(());
        }

        let processing = self
            .messenger
            .send_html(from.chat_id, &messages::processing_summary(), None)
            .await?;

        let plan = self.users.plan(from.user_id);
        let limits = self.cfg.limits(plan);
        let reply = match self.summarizer.summarize_url(url, &limits).await {
            Ok(summary) => {
                self.users.increment_summary(from.user_id);
                messages::summary_reply(url, &summary, plan)
            }
            Err(e) => {
                tracing::warn!(user_id = from.user_id.0, url, "summarization failed: {e}");
                messages::summary_failed(&user_facing_summary_error(&e))
            }
        };

        let outcome = self
            .messenger
            .send_html(from.chat_id, &reply, None)
            .await
            .map(|_| ());
        self.drop_notice(processing).await;
        outcome
    }

    async fn drop_notice(&self, msg: MessageRef) {
        if let Err(e) = self.messenger.delete_message(msg).await {
            tracing::debug!("could not delete processing notice: {e}");
        }
    }
}

fn user_facing_summary_error(e: &Error) -> String {
    match e {
        Error::Http { .. } | Error::NotEnoughContent | Error::Summarization => e.to_string(),
        _ => "Could not process this URL. Please try a different article.".to_string(),
    }
}
