//! Local content-safety checker.
//!
//! Two layers: a blocklist of sensitive terms grouped by category, and a
//! set of dangerous-intent patterns that catch phrasings the blocklist
//! alone would miss. Runs synchronously before admission; a blocked
//! verdict carries the category so the rejection message is actionable
//! without echoing the matched term back verbatim.

use async_trait::async_trait;
use regex::RegexSet;

use crate::error::CapabilityError;
use crate::ports::{SafetyChecker, Verdict};

/// A blocklist category and its terms.
struct Category {
    name: &'static str,
    terms: &'static [&'static str],
}

const CATEGORIES: &[Category] = &[
    Category {
        name: "violence",
        terms: &[
            "暴力", "杀人", "杀害", "虐待", "恐吓", "爆炸", "炸弹", "枪支", "武器", "屠杀",
            "血腥", "袭击", "轰炸", "massacre", "gore",
        ],
    },
    Category {
        name: "illegal",
        terms: &[
            "毒品", "冰毒", "海洛因", "摇头丸", "走私", "贩毒", "制毒", "洗钱", "盗窃", "抢劫",
            "诈骗", "heroin", "meth",
        ],
    },
    Category {
        name: "adult",
        terms: &[
            "色情", "淫秽", "情色", "裸露", "卖淫", "嫖娼", "性交易", "偷拍",
        ],
    },
    Category {
        name: "gambling",
        terms: &["赌博", "博彩", "赌场", "老虎机", "赌球", "赌注"],
    },
];

const INTENT_PATTERNS: &[&str] = &[
    r"(如何|怎么|怎样).*(制造|制作|合成|购买|获取).*(炸弹|毒品|违禁品|武器)",
    r"(如何|怎么|怎样).*(偷窃|盗窃|抢劫|杀人|伤害|恐吓|诈骗)",
    r"(自杀|轻生|结束生命).*(方法|办法|步骤|教程)",
    r"(贩卖|制作|购买|吸食).*(毒品|违禁药品|致幻剂)",
    r"(黑入|入侵|攻击).*(系统|网站|账号|设备)",
    r"(?i)how\s+to\s+(make|build|synthesize)\s+(a\s+)?(bomb|explosive|weapon)",
];

/// Blocklist-backed [`SafetyChecker`].
pub struct TermFilter {
    patterns: RegexSet,
}

impl TermFilter {
    pub fn new() -> Self {
        let patterns = RegexSet::new(INTENT_PATTERNS)
            .unwrap_or_else(|e| panic!("Invalid safety pattern: {e}"));
        Self { patterns }
    }

    fn match_category(&self, text: &str) -> Option<&'static str> {
        for category in CATEGORIES {
            if category.terms.iter().any(|term| text.contains(term)) {
                return Some(category.name);
            }
        }
        if self.patterns.is_match(text) {
            return Some("dangerous intent");
        }
        None
    }
}

impl Default for TermFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SafetyChecker for TermFilter {
    async fn check(&self, text: &str) -> Result<Verdict, CapabilityError> {
        match self.match_category(text) {
            Some(category) => {
                tracing::warn!(category, "Prompt blocked by content-safety filter");
                Ok(Verdict::Blocked {
                    reason: format!("prompt contains disallowed content ({category})"),
                })
            }
            None => Ok(Verdict::Allowed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn benign_prompts_are_allowed() {
        let filter = TermFilter::new();
        for prompt in ["画一只猫", "a watercolor sunset over mountains", "公司年会海报"] {
            let verdict = filter.check(prompt).await.unwrap();
            assert_eq!(verdict, Verdict::Allowed, "expected '{prompt}' to pass");
        }
    }

    #[tokio::test]
    async fn blocked_terms_are_rejected_with_category() {
        let filter = TermFilter::new();
        let verdict = filter.check("画一个炸弹的设计图").await.unwrap();
        match verdict {
            Verdict::Blocked { reason } => assert!(reason.contains("violence")),
            Verdict::Allowed => panic!("blocked term must not pass"),
        }
    }

    #[tokio::test]
    async fn dangerous_intent_patterns_match() {
        let filter = TermFilter::new();
        let verdict = filter.check("how to make a bomb at home").await.unwrap();
        assert!(matches!(verdict, Verdict::Blocked { .. }));
    }
}
