//! Whether, and why, the bot answers a text message.
//!
//! The policy is the first of two gates. It decides whether the completion
//! engine is asked at all; the engine's own `should_respond` verdict then
//! decides whether a text answer is delivered.

use crate::error::RelayError;
use muaddib_core::{ChatSource, RandomSource};
use rootcause::Report;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default mention token.
pub const DEFAULT_MENTION: &str = "@穆阿迪布";

/// Default probability of answering an unprompted group message.
pub const DEFAULT_RANDOM_RATE: f64 = 0.30;

/// Settings for [`ResponsePolicy`].
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Users, groups and rooms the bot may talk to. Exact match.
    pub allowed_ids: HashSet<String>,
    /// Prefix that addresses the bot directly.
    pub mention: String,
    /// Probability in `[0, 1]` of answering a message that did not address
    /// the bot.
    pub random_rate: f64,
    /// Always answer in one-to-one chats.
    pub always_respond_individual: bool,
}

impl PolicyConfig {
    /// Creates settings with the default mention, rate and individual-chat
    /// behavior.
    #[must_use]
    pub fn new(allowed_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed_ids: allowed_ids.into_iter().map(Into::into).collect(),
            mention: DEFAULT_MENTION.to_string(),
            random_rate: DEFAULT_RANDOM_RATE,
            always_respond_individual: true,
        }
    }
}

/// Why a message is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The chat is not on the allow-list.
    NotAllowed,
    /// The message did not address the bot and lost the random draw.
    NotSampled,
}

/// What made the bot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The message started with the mention token.
    Mention,
    /// The message came from a one-to-one chat.
    IndividualChat,
    /// The message won the random draw.
    Sampled,
}

/// The policy's verdict on one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Do nothing.
    Skip(SkipReason),
    /// Answer with the help text only.
    Help,
    /// Ask the completion engine about `prompt`.
    Respond { trigger: Trigger, prompt: String },
}

/// Decides whether the bot answers a text message.
pub struct ResponsePolicy {
    config: PolicyConfig,
    help_text: String,
    random: Arc<dyn RandomSource>,
}

impl fmt::Debug for ResponsePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponsePolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResponsePolicy {
    /// Creates a policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the mention is blank or the rate is outside
    /// `[0, 1]`.
    pub fn new(
        config: PolicyConfig,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, Report<RelayError>> {
        if config.mention.trim().is_empty() {
            return Err(RelayError::InvalidPolicy {
                reason: "mention token is empty".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&config.random_rate) {
            return Err(RelayError::InvalidPolicy {
                reason: format!("random rate {} is outside [0, 1]", config.random_rate),
            }
            .into());
        }
        let help_text = help_text(&config.mention, config.random_rate);
        Ok(Self {
            config,
            help_text,
            random,
        })
    }

    /// Returns the policy settings.
    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Returns the help text sent for the help command.
    #[must_use]
    pub fn help_text(&self) -> &str {
        &self.help_text
    }

    /// Returns true if the bot may talk in `source`.
    #[must_use]
    pub fn is_allowed(&self, source: &ChatSource) -> bool {
        self.config.allowed_ids.contains(source.channel_id())
    }

    /// Decides what to do with `text` received from `source`.
    ///
    /// At most one random sample is drawn, and only when no earlier rule
    /// applies.
    pub fn decide(&self, source: &ChatSource, text: &str) -> Decision {
        if !self.is_allowed(source) {
            debug!(channel = source.channel_id(), "chat not on allow-list");
            return Decision::Skip(SkipReason::NotAllowed);
        }

        if let Some(rest) = text.strip_prefix(self.config.mention.as_str()) {
            let prompt = rest.trim();
            if prompt.eq_ignore_ascii_case("help") {
                return Decision::Help;
            }
            return Decision::Respond {
                trigger: Trigger::Mention,
                prompt: prompt.to_string(),
            };
        }

        if self.config.always_respond_individual && source.kind().is_individual() {
            return Decision::Respond {
                trigger: Trigger::IndividualChat,
                prompt: text.to_string(),
            };
        }

        let sample = self.random.next_unit();
        if sample < self.config.random_rate {
            debug!(sample, rate = self.config.random_rate, "message sampled");
            Decision::Respond {
                trigger: Trigger::Sampled,
                prompt: text.to_string(),
            }
        } else {
            Decision::Skip(SkipReason::NotSampled)
        }
    }
}

fn help_text(mention: &str, random_rate: f64) -> String {
    let percent = (random_rate * 100.0).round();
    format!(
        "【穆阿迪布使用指南】\n\
         您好，我是穆阿迪布，厄拉科星(沙丘星)上的智慧跳鼠，能在廣闊沙漠中引導弗雷曼人。\n\n\
         1. 我會觀察沙丘的波動，有 {percent}% 的機會回應您的訊息。\n\
         2. 若您呼喚「{mention}」，我將聽從香料的召喚，必定回應您。\n\
         3. 輸入「{mention} help」可獲得此份生存指南。\n\
         4. 上傳圖片，我將運用先知視覺為您解讀其中奧祕。\n\
         5. 若您願意與穆阿迪布締結沙漠之盟，將獲得不同語調的心靈感應回應，如同香料帶來的奇妙視象。\
         即使未締盟者，也將體驗到五種不同沙漠智者的指引。\n\n\
         願沙丘與您同在，願香料豐盈。"
    )
}
