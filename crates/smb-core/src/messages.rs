//! Reply texts (Telegram HTML) and their keyboards.
//!
//! Anything that came from a user or a remote site is escaped here; callers
//! pass raw strings.

use crate::{
    callbacks::CallbackAction as Cb,
    config::Config,
    domain::{MediaFormat, Plan},
    formatting::{escape_html, format_duration, preview},
    media::DownloadedMedia,
    messaging::types::InlineKeyboard,
    users::{Quota, UsageSnapshot},
};

pub const COMING_SOON: &str = "Coming soon";

pub type Reply = (String, InlineKeyboard);

fn keyboard(buttons: &[(&str, Cb)]) -> InlineKeyboard {
    let mut kb = InlineKeyboard::default();
    for (label, action) in buttons {
        kb.push(*label, action.as_str());
    }
    kb
}

fn back_keyboard() -> InlineKeyboard {
    keyboard(&[("🔙 Back", Cb::BackStart)])
}

fn usage_line(snapshot: &UsageSnapshot, quota: Quota) -> String {
    let limit = if snapshot.plan.is_premium() {
        "∞".to_string()
    } else {
        snapshot.limit(quota).to_string()
    };
    format!("{}/{}", snapshot.used(quota), limit)
}

fn plan_badge(plan: Plan) -> &'static str {
    match plan {
        Plan::Free => "🆓",
        Plan::Premium => "💎",
    }
}

pub fn welcome_new(cfg: &Config, first_name: &str) -> Reply {
    let html = format!(
        "🎉 <b>Welcome to Smart Media Bot!</b> 🎉\n\
         Hello {name}!\n\n\
         <b>🚀 Get FREE Access to:</b>\n\
         📹 <b>YouTube Downloads</b> ({downloads} per day)\n\
         📄 <b>Article Summaries</b> ({summaries} per day)\n\
         🎵 <b>Audio Extraction</b>\n\
         🤖 <b>Smart Summaries</b>\n\n\
         <b>✨ COMPLETELY FREE, just subscribe!</b>\n\n\
         👇 <b>Tap below to get FREE access:</b>",
        name = escape_html(first_name),
        downloads = cfg.max_free_downloads,
        summaries = cfg.max_free_summaries,
    );
    let kb = keyboard(&[
        ("🎯 Get FREE Access Now!", Cb::SubscribeFree),
        ("💎 View Premium Features", Cb::ViewPremium),
        ("ℹ️ Learn More", Cb::LearnMore),
    ]);
    (html, kb)
}

pub fn welcome_back(first_name: &str, snapshot: &UsageSnapshot) -> Reply {
    let badge = plan_badge(snapshot.plan);
    let html = format!(
        "{badge} <b>Smart Media Bot - {plan} Plan</b> {badge}\n\
         Welcome back {name}!\n\n\
         📹 <b>YouTube Downloads</b>, send any YouTube URL\n\
         📄 <b>Article Summaries</b>, send any article URL\n\
         🎵 <b>Audio Extraction</b>, use /audio with a YouTube URL\n\n\
         📊 <b>Today's Usage:</b>\n\
         • Downloads: {downloads}\n\
         • Summaries: {summaries}\n\n\
         💡 <b>Quick Start:</b>\n\
         • Send a YouTube URL to download\n\
         • Send an article URL for a summary\n\
         • Use /help for all commands",
        plan = snapshot.plan.label(),
        name = escape_html(first_name),
        downloads = usage_line(snapshot, Quota::Downloads),
        summaries = usage_line(snapshot, Quota::Summaries),
    );

    let mut kb = InlineKeyboard::default();
    if !snapshot.plan.is_premium() {
        kb.push("⭐ Upgrade to Premium", Cb::UpgradePremium.as_str());
    }
    kb.push("📹 How to Download", Cb::HelpDownload.as_str());
    kb.push("📄 How to Summarize", Cb::HelpSummarize.as_str());
    kb.push("📊 View Stats", Cb::ViewStats.as_str());
    (html, kb)
}

pub fn help() -> String {
    "<b>Commands:</b>\n\
     /start, main menu\n\
     /help, this help\n\
     /audio &lt;YouTube URL&gt;, extract the audio track as mp3\n\n\
     Send a YouTube URL to download the video. Send an article URL to get a summary."
        .to_string()
}

pub fn audio_usage() -> String {
    "🎵 Send <code>/audio</code> followed by a YouTube URL, e.g.\n\
     <code>/audio https://youtu.be/dQw4w9WgXcQ</code>"
        .to_string()
}

pub fn subscribe_first() -> Reply {
    (
        "🚫 <b>Please subscribe first to use this feature!</b>\n\n\
         Click /start to get FREE access to all features! 🎯"
            .to_string(),
        keyboard(&[("🎯 Get FREE Access", Cb::SubscribeFree)]),
    )
}

pub fn limit_reached(quota: Quota, limit: u32) -> Reply {
    let (what, plural) = match quota {
        Quota::Downloads => ("download", "downloads"),
        Quota::Summaries => ("summary", "summaries"),
    };
    (
        format!(
            "🚫 Daily {what} limit reached! ({limit} per day)\n\n\
             ⭐ Upgrade to Premium for more {plural}!"
        ),
        keyboard(&[("💎 Upgrade to Premium", Cb::UpgradePremium)]),
    )
}

pub fn processing_download(format: MediaFormat) -> String {
    match format {
        MediaFormat::Video => "🔄 Processing your video...".to_string(),
        MediaFormat::Audio => "🔄 Extracting audio...".to_string(),
    }
}

pub fn processing_summary() -> String {
    "🧠 Analyzing and summarizing article...".to_string()
}

pub fn download_caption(media: &DownloadedMedia, plan: Plan) -> String {
    let badge = if plan.is_premium() { "🎬 HD" } else { "📹 SD" };
    let quality = if plan.is_premium() {
        "💎 Premium Quality"
    } else {
        "🆓 Free Quality"
    };
    let title = if media.title.chars().count() > 200 {
        preview(&media.title, 200)
    } else {
        media.title.clone()
    };
    format!(
        "✅ <b>Download Complete!</b> {badge}\n\n\
         📹 <b>{title}</b>\n\
         👤 Channel: {uploader}\n\
         ⏱️ Duration: {duration}\n\n\
         {quality}",
        title = escape_html(&title),
        uploader = escape_html(&media.uploader),
        duration = format_duration(media.duration_secs),
    )
}

pub fn send_failed() -> String {
    "✅ Download completed, but the file is too large to send directly here.\n\
     Try shorter videos or use premium 1080p with smaller file sizes."
        .to_string()
}

pub fn download_failed(reason: &str) -> String {
    format!("❌ Download failed: {}", escape_html(reason))
}

pub fn summary_reply(url: &str, summary: &str, plan: Plan) -> String {
    let (badge, footer) = if plan.is_premium() {
        ("🧠 Enhanced", "Premium analysis")
    } else {
        ("🤖 Standard", "Standard summary")
    };
    format!(
        "🧠 <b>Article Summary</b> {badge}\n\n\
         🔗 <b>Source:</b> {source}\n\n\
         📋 <b>Summary:</b>\n{summary}\n\n\
         ---\n\
         💡 <i>{footer}, for full details read the original article.</i>",
        source = escape_html(&preview(url, 50)),
        summary = escape_html(summary),
    )
}

pub fn summary_failed(reason: &str) -> String {
    format!("❌ Summarization failed: {}", escape_html(reason))
}

pub fn premium_info(cfg: &Config) -> Reply {
    let free = cfg.limits(Plan::Free);
    let premium = cfg.limits(Plan::Premium);
    let html = format!(
        "⭐ <b>Premium Subscription</b> ⭐\n\n\
         🚀 <b>Unlock Ultimate Power!</b>\n\n\
         <b>🆓 Free vs 💎 Premium:</b>\n\n\
         <b>Downloads:</b>\n\
         • Free: {fd}/day ➡️ Premium: {pd}/day\n\
         • Free: 480p quality ➡️ Premium: 1080p HD quality\n\
         • Free: {fs}MB files ➡️ Premium: {ps}MB files\n\n\
         <b>Summaries:</b>\n\
         • Free: {fsum}/day ➡️ Premium: {psum}/day\n\
         • Free: {fc} chars ➡️ Premium: {pc} chars\n\n\
         <b>Premium Exclusive:</b>\n\
         🎵 <b>{pa}kbps Audio Quality</b>\n\
         ⚡ <b>Priority Processing</b>\n\
         💬 <b>Priority Support</b>\n\n\
         💰 <b>Just ${price:.2}/month</b> ({period} days of Premium)\n\n\
         🎁 <b>{trial}-Day Free Trial Available!</b>",
        fd = free.downloads_per_day,
        pd = premium.downloads_per_day,
        fs = free.max_file_size / 1024 / 1024,
        ps = premium.max_file_size / 1024 / 1024,
        fsum = free.summaries_per_day,
        psum = premium.summaries_per_day,
        fc = free.summary_max_chars,
        pc = premium.summary_max_chars,
        pa = premium.audio_quality_kbps,
        price = cfg.premium_price,
        period = cfg.premium_days,
        trial = cfg.trial_days,
    );
    let kb = keyboard(&[
        ("🎁 Start Free Trial", Cb::FreeTrial),
        ("💳 Subscribe Now", Cb::SubscribePremium),
        ("🔙 Back", Cb::BackStart),
    ]);
    (html, kb)
}

pub fn stats(user_id: i64, snapshot: &UsageSnapshot) -> Reply {
    let user = &snapshot.user;
    let yes_no = |v: bool, yes: &str, no: &str| if v { yes.to_string() } else { no.to_string() };
    let member_since = user
        .subscription_date
        .as_deref()
        .map(|d| d.chars().take(10).collect::<String>())
        .unwrap_or_else(|| "Unknown".to_string());
    let minutes_saved = user.total_summaries * 5 + user.total_downloads * 2;

    let mut html = format!(
        "{badge} <b>Your Statistics - {plan} Plan</b>\n\n\
         👤 <b>Account Info:</b>\n\
         • User ID: {user_id}\n\
         • Subscribed: {subscribed}\n\
         • Premium: {premium}\n\n\
         📈 <b>Today's Usage:</b>\n\
         • Downloads: {downloads}\n\
         • Summaries: {summaries}\n\n\
         📊 <b>All-Time Stats:</b>\n\
         • Total downloads: {total_downloads}\n\
         • Total summaries: {total_summaries}\n\
         • Member since: {member_since}\n\n\
         💡 <b>Time saved: ~{minutes_saved} minutes!</b>",
        badge = plan_badge(snapshot.plan),
        plan = snapshot.plan.label(),
        subscribed = yes_no(user.is_subscribed, "✅ Yes", "❌ No"),
        premium = yes_no(snapshot.plan.is_premium(), "✅ Active", "❌ Not Active"),
        downloads = usage_line(snapshot, Quota::Downloads),
        summaries = usage_line(snapshot, Quota::Summaries),
        total_downloads = user.total_downloads,
        total_summaries = user.total_summaries,
    );
    if let Some(code) = &user.referral_code {
        html.push_str(&format!(
            "\n\n🔗 <b>Your referral code:</b> <code>ref_{}</code>",
            escape_html(code)
        ));
    }

    let mut kb = InlineKeyboard::default();
    if !snapshot.plan.is_premium() {
        kb.push("⭐ Upgrade to Premium", Cb::UpgradePremium.as_str());
    }
    kb.push("🔄 Refresh Stats", Cb::ViewStats.as_str());
    kb.push("🔙 Back to Menu", Cb::BackStart.as_str());
    (html, kb)
}

pub fn subscribed(cfg: &Config) -> Reply {
    let html = format!(
        "🎉 <b>Welcome to Smart Media Bot!</b> 🎉\n\n\
         ✅ <b>FREE Subscription Activated!</b>\n\n\
         🎯 <b>You now have access to:</b>\n\
         📹 <b>{downloads} YouTube downloads per day</b>\n\
         📄 <b>{summaries} article summaries per day</b>\n\
         🎵 <b>Audio extraction</b>\n\n\
         🚀 <b>Get Started:</b>\n\
         • Send any YouTube URL to download\n\
         • Send any article link for a summary\n\
         • Use /help for all features\n\n\
         💡 <b>Ready to unlock more?</b>",
        downloads = cfg.max_free_downloads,
        summaries = cfg.max_free_summaries,
    );
    let kb = keyboard(&[
        ("💎 Upgrade to Premium", Cb::UpgradePremium),
        ("🚀 Start Using Bot", Cb::StartUsing),
    ]);
    (html, kb)
}

pub fn trial_started(days: i64) -> Reply {
    (
        format!(
            "🎁 <b>Premium trial activated!</b>\n\n\
             Enjoy {days} days of HD downloads, higher limits and richer summaries."
        ),
        keyboard(&[("🚀 Start Using Bot", Cb::StartUsing)]),
    )
}

pub fn trial_unavailable() -> Reply {
    (
        "ℹ️ Your free trial has already been used.".to_string(),
        back_keyboard(),
    )
}

pub fn how_to_download(cfg: &Config) -> Reply {
    (
        format!(
            "📹 <b>How to Download</b>\n\n\
             1. Copy a YouTube link (youtube.com or youtu.be)\n\
             2. Paste it here as a message\n\
             3. Wait a moment, the video arrives in this chat\n\n\
             Want just the sound? Use <code>/audio &lt;URL&gt;</code>.\n\
             Free plan: up to {} downloads per day, files up to 50MB.",
            cfg.max_free_downloads
        ),
        back_keyboard(),
    )
}

pub fn how_to_summarize(cfg: &Config) -> Reply {
    (
        format!(
            "📄 <b>How to Summarize</b>\n\n\
             1. Copy the link of any news story or blog post\n\
             2. Paste it here as a message\n\
             3. Get the key sentences back in seconds\n\n\
             Free plan: up to {} summaries per day.",
            cfg.max_free_summaries
        ),
        back_keyboard(),
    )
}

pub fn learn_more() -> Reply {
    (
        "ℹ️ <b>About Smart Media Bot</b>\n\n\
         Send a YouTube link and get the video (or its audio) right here in Telegram.\n\
         Send an article link and get a short summary of its key points.\n\n\
         Everything runs on free, local processing. Subscribe with one tap to start."
            .to_string(),
        keyboard(&[
            ("🎯 Get FREE Access Now!", Cb::SubscribeFree),
            ("🔙 Back", Cb::BackStart),
        ]),
    )
}
