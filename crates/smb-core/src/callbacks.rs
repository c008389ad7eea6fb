/// Inline button actions, encoded as Telegram callback data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    SubscribeFree,
    ViewPremium,
    UpgradePremium,
    LearnMore,
    HelpDownload,
    HelpSummarize,
    ViewStats,
    BackStart,
    StartUsing,
    FreeTrial,
    SubscribePremium,
    Unknown,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Self {
        match data {
            "subscribe_free" => Self::SubscribeFree,
            "view_premium" => Self::ViewPremium,
            "upgrade_premium" => Self::UpgradePremium,
            "learn_more" => Self::LearnMore,
            "help_download" => Self::HelpDownload,
            "help_summarize" => Self::HelpSummarize,
            "view_stats" => Self::ViewStats,
            "back_start" => Self::BackStart,
            "start_using" => Self::StartUsing,
            "free_trial" => Self::FreeTrial,
            "subscribe_premium" => Self::SubscribePremium,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SubscribeFree => "subscribe_free",
            Self::ViewPremium => "view_premium",
            Self::UpgradePremium => "upgrade_premium",
            Self::LearnMore => "learn_more",
            Self::HelpDownload => "help_download",
            Self::HelpSummarize => "help_summarize",
            Self::ViewStats => "view_stats",
            Self::BackStart => "back_start",
            Self::StartUsing => "start_using",
            Self::FreeTrial => "free_trial",
            Self::SubscribePremium => "subscribe_premium",
            Self::Unknown => "unknown",
        }
    }
}
