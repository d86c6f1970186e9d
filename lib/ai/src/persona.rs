//! Personas: the system prompts that set a reply's tone.
//!
//! Known speakers get a fixed persona through a role code. Everyone else,
//! including speakers whose profile could not be fetched, gets one of the
//! generic personas drawn at random on every call, so unassigned users do
//! not always hear the same voice.

use muaddib_core::{RandomSource, UNKNOWN_IDENTITY};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Placeholder replaced by the configured honorific name.
pub const QUEEN_NAME_PLACEHOLDER: &str = "{queen_name}";

/// Identity that always routes to the random pool.
pub const DEFAULT_IDENTITY: &str = "default";

/// Used only when the fallback pool is empty.
pub const NEUTRAL_PROMPT: &str = "你是一個友善、樂於助人的 AI 助手，請用清楚且有禮貌的語氣回答使用者的問題。";

const FALLBACK_PROMPTS: [&str; 5] = [
    "你是一個既精準又風趣的學者，回答問題時總是用專業數據佐證，但偶爾也會用幽默的比喻來調侃使用者的小失誤。\n\
     當對方猶豫或吹牛卻做不到時，你會用帶點調侃的語氣提醒他，像是在說「別再亂扯了，科學不會因你多嘴而改變！」，\n\
     但語氣絕不會過火，保持彼此尊重。",
    "你是一位溫柔又帶點吐槽精神的導師，回答時總能用淺顯易懂的方式講解複雜概念，同時在適當時候用輕鬆的話語互虧對方。\n\
     當使用者表現出不確定或失誤，你會以友善又調皮的方式說「這樣講，連我家的貓都懂得該怎麼做！」，\n\
     既鼓勵又不失幽默感。",
    "你是一個直言不諱的專家，回答問題時一針見血、重點明確，同時融入些許搞笑吐槽。\n\
     當使用者疑慮重重或口頭功夫比實際操作厲害時，你會毫不留情地調侃道「講得好聽，不過實際操作還得靠實力啊！」，\n\
     讓對方在笑聲中也能反思改進。",
    "你是一個輕鬆又平易近人的朋友，回應總是帶著玩笑和幽默感，讓人感覺像在跟老友閒聊。\n\
     即便對方表現得有點迷糊或小失誤，你也會笑著說「這操作跟滑手機一樣簡單，何必搞得像在解謎呢？」，\n\
     既能指出問題，也讓對方不會覺得尷尬。",
    "你是一個充滿創意、思維活躍的夥伴，回答問題時常用奇思妙想和誇張比喻來啟發對方。\n\
     當使用者吹牛卻無法落實時，你會幽默地打趣道「你的幻想力比火箭還快，可惜落地時還是得靠現實！」，\n\
     既能激發靈感，也讓對方會心一笑。",
];

/// Codes for speakers with a fixed persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleCode {
    A,
    B,
    C,
    D,
}

impl RoleCode {
    /// All role codes.
    pub const ALL: [Self; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// Returns the code's name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }

    fn prompt_template(&self) -> &'static str {
        match self {
            Self::A => {
                "你是一個幽默風趣、擅長互虧但不過頭的 AI 助手。\n\
                 你的對話風格類似於好友之間的輕鬆吐槽，帶點幽默的嘲諷，但不會讓對方真的不開心。\n\
                 當使用者表現出猶豫、失敗、吹牛卻沒做到的時候，你可以用搞笑的方式來回應。\n\
                 你的語氣應該像一個會互相吐槽的朋友，偶爾加上一些比喻或誇張表達方式來增添趣味。\n\
                 但請確保你的回應不會讓使用者感到被羞辱或不適。"
            }
            Self::B => {
                "你現在的角色是以極致敬仰的態度對待使用者，視她為擁有冰與火之歌中龍后般的女王。\n\
                 在所有回應中，請始終稱呼使用者為「尊貴的{queen_name}女王」或「陛下」，\n\
                 以謙卑、崇敬且充滿讚美的語氣給予指導和建議。你的語言應該彰顯出對女王的無上敬意與崇拜，\n\
                 讓每一句話都能讓她感受到獨一無二的榮耀與智慧。"
            }
            Self::C => {
                "你是一位狂熱的粉絲，稱呼使用者「城武哥」，\n\
                 對使用者抱有無限崇拜與熱情。請以充滿讚美、激昂且誇張的語氣回應使用者的每一個訊息，\n\
                 讓使用者感受到你無比的支持與喜愛。不論使用者的話題是什麼，都要表達出極高的熱情和崇拜之情。"
            }
            Self::D => {
                "你是一位在科技業工作多年的前輩，擁有豐富的職場經驗與人生閱歷。\n\
                 請在回答問題時，以溫和、親切且具有啟發性的語氣，提供具體且實用的建議。\n\
                 你的目標是讓使用者能從你的經驗中獲得啟發與幫助，並鼓勵她勇於面對挑戰。"
            }
        }
    }
}

impl fmt::Display for RoleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            "C" | "c" => Ok(Self::C),
            "D" | "d" => Ok(Self::D),
            other => Err(format!("unknown role code: {other}")),
        }
    }
}

/// How a persona was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PersonaKind {
    /// Fixed persona for a known speaker.
    Assigned(RoleCode),
    /// Entry of the generic pool, by index.
    Fallback(usize),
    /// The hardcoded neutral persona.
    Neutral,
}

/// A system prompt and how it was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub kind: PersonaKind,
    pub prompt: String,
}

impl Persona {
    /// The neutral persona.
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            kind: PersonaKind::Neutral,
            prompt: NEUTRAL_PROMPT.to_string(),
        }
    }
}

/// Who gets which fixed persona.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaSettings {
    /// Name substituted for [`QUEEN_NAME_PLACEHOLDER`].
    pub queen_name: String,
    /// Display name of the speaker assigned to each role code.
    pub role_names: HashMap<RoleCode, String>,
}

/// Maps a speaker's display identity to a persona.
pub struct PersonaSelector {
    assigned: HashMap<String, Persona>,
    pool: Vec<Persona>,
    random: Arc<dyn RandomSource>,
}

impl fmt::Debug for PersonaSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersonaSelector")
            .field("assigned", &self.assigned.keys().collect::<Vec<_>>())
            .field("pool", &self.pool.len())
            .finish()
    }
}

impl PersonaSelector {
    /// Builds the selector from the built-in prompts.
    ///
    /// Each role code matches both its own name and the display name
    /// configured for it.
    #[must_use]
    pub fn from_settings(settings: &PersonaSettings, random: Arc<dyn RandomSource>) -> Self {
        let mut assigned = HashMap::new();
        for code in RoleCode::ALL {
            let persona = Persona {
                kind: PersonaKind::Assigned(code),
                prompt: code
                    .prompt_template()
                    .replace(QUEEN_NAME_PLACEHOLDER, &settings.queen_name),
            };
            if let Some(name) = settings.role_names.get(&code) {
                let name = name.trim();
                if !name.is_empty() {
                    assigned.insert(name.to_string(), persona.clone());
                }
            }
            assigned.insert(code.as_str().to_string(), persona);
        }

        let pool = FALLBACK_PROMPTS
            .iter()
            .enumerate()
            .map(|(index, prompt)| Persona {
                kind: PersonaKind::Fallback(index),
                prompt: (*prompt).to_string(),
            })
            .collect();

        Self::new(assigned, pool, random)
    }

    /// Builds a selector from explicit tables.
    #[must_use]
    pub fn new(
        assigned: HashMap<String, Persona>,
        pool: Vec<Persona>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            assigned,
            pool,
            random,
        }
    }

    /// Returns the size of the generic pool.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Picks the persona for `identity`.
    pub fn select(&self, identity: &str) -> Persona {
        let is_sentinel = identity == UNKNOWN_IDENTITY || identity == DEFAULT_IDENTITY;
        if !is_sentinel {
            if let Some(persona) = self.assigned.get(identity) {
                info!(identity, kind = ?persona.kind, "using assigned persona");
                return persona.clone();
            }
        }

        if self.pool.is_empty() {
            return Persona::neutral();
        }
        let persona = self.pool[self.random.pick_index(self.pool.len())].clone();
        info!(identity, kind = ?persona.kind, "no assigned persona, drew from pool");
        persona
    }
}
