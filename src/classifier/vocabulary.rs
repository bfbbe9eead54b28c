//! Game text the classifier matches against.
//!
//! The game speaks Korean; an English rendering is kept for translated
//! clients and for readable test fixtures.

use serde::{Deserialize, Serialize};

/// Which rendering of the game text to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    Korean,
    English,
}

impl Locale {
    pub fn vocabulary(&self) -> Vocabulary {
        match self {
            Locale::Korean => Vocabulary::korean(),
            Locale::English => Vocabulary::english(),
        }
    }
}

/// Commands and message markers for one game locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    pub enhance_command: String,
    pub sell_command: String,
    /// Regex with one capture group: the gold amount with `,` separators.
    pub gold_pattern: String,
    /// Any of these means the sale was refused.
    pub sale_blocked: Vec<String>,
    /// Prefix of the drop message; the sword name follows it.
    pub item_marker: String,
    pub insufficient_funds: String,
    pub success: String,
    pub hold: String,
    pub destroy: String,
    /// Low-value drops that are sold straight back.
    pub trash_items: Vec<String>,
    /// Qualifier that marks any drop as trash.
    pub worn_qualifier: String,
}

impl Vocabulary {
    pub fn korean() -> Self {
        Self {
            enhance_command: "/강화".into(),
            sell_command: "/판매".into(),
            gold_pattern: r"(?:남은 골드|현재 보유 골드):\s*([\d,]+)G".into(),
            sale_blocked: vec!["판매할 수 없다".into(), "가치가 없어서".into()],
            item_marker: "새로운 검 획득:".into(),
            insufficient_funds: "골드가 부족해".into(),
            success: "강화 성공".into(),
            hold: "강화 유지".into(),
            destroy: "강화 파괴".into(),
            trash_items: vec![
                "낡은 검".into(),
                "낡은 몽둥이".into(),
                "낡은 도끼".into(),
                "낡은 망치".into(),
            ],
            worn_qualifier: "낡은".into(),
        }
    }

    pub fn english() -> Self {
        Self {
            enhance_command: "/enhance".into(),
            sell_command: "/sell".into(),
            gold_pattern: r"(?:Remaining gold|Current gold):\s*([\d,]+)G".into(),
            sale_blocked: vec!["cannot be sold".into(), "has no value".into()],
            item_marker: "New sword acquired:".into(),
            insufficient_funds: "Not enough gold".into(),
            success: "Enhance success".into(),
            hold: "Enhance hold".into(),
            destroy: "Enhance destroyed".into(),
            trash_items: vec![
                "Old Sword".into(),
                "Old Club".into(),
                "Old Axe".into(),
                "Old Hammer".into(),
            ],
            worn_qualifier: "Old".into(),
        }
    }

    /// Literal substring rule: a denylisted name or the worn qualifier.
    pub fn is_trash(&self, name: &str) -> bool {
        self.trash_items.iter().any(|t| name.contains(t.as_str()))
            || name.contains(self.worn_qualifier.as_str())
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::korean()
    }
}
