//! Keyword-bucket categorisation shared by the trending tracker and the
//! suggestion generator.
//!
//! A term is assigned the first [`Category`] in [`CategoryTable::buckets`]
//! order whose keyword list contains a case-insensitive substring of the
//! term. Terms matching no bucket fall into [`Category::General`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::ResultType;

/// Topic bucket for a search term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Wine,
    #[serde(alias = "whisky")]
    Whiskey,
    Sake,
    Beer,
    Course,
    Certification,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Wine => "wine",
            Category::Whiskey => "whiskey",
            Category::Sake => "sake",
            Category::Beer => "beer",
            Category::Course => "course",
            Category::Certification => "certification",
            Category::General => "general",
        }
    }

    /// The result type a suggestion in this bucket most likely leads to.
    pub fn type_hint(&self) -> Option<ResultType> {
        match self {
            Category::Wine | Category::Whiskey | Category::Sake | Category::Beer => {
                Some(ResultType::Wine)
            }
            Category::Course | Category::Certification => Some(ResultType::Course),
            Category::General => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "wine" => Ok(Category::Wine),
            "whiskey" | "whisky" => Ok(Category::Whiskey),
            "sake" => Ok(Category::Sake),
            "beer" => Ok(Category::Beer),
            "course" => Ok(Category::Course),
            "certification" => Ok(Category::Certification),
            "general" => Ok(Category::General),
            other => anyhow::bail!(
                "Unknown category: '{}'. Use wine, whiskey, sake, beer, course, certification, or general.",
                other
            ),
        }
    }
}

/// One bucket: a category and the lowercase keywords that select it.
#[derive(Debug, Clone)]
pub struct CategoryBucket {
    pub category: Category,
    pub keywords: Vec<String>,
}

/// Ordered list of buckets. Earlier buckets win when several match.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    buckets: Vec<CategoryBucket>,
}

impl CategoryTable {
    pub fn new(buckets: Vec<CategoryBucket>) -> Self {
        let buckets = buckets
            .into_iter()
            .map(|b| CategoryBucket {
                category: b.category,
                keywords: b.keywords.into_iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();
        Self { buckets }
    }

    pub fn buckets(&self) -> &[CategoryBucket] {
        &self.buckets
    }

    /// Classify a term. Falls back to [`Category::General`].
    pub fn categorize(&self, term: &str) -> Category {
        let lower = term.to_lowercase();
        self.buckets
            .iter()
            .find(|b| b.keywords.iter().any(|k| lower.contains(k.as_str())))
            .map(|b| b.category)
            .unwrap_or(Category::General)
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        fn bucket(category: Category, keywords: &[&str]) -> CategoryBucket {
            CategoryBucket {
                category,
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            }
        }

        Self::new(vec![
            bucket(
                Category::Wine,
                &[
                    "wine",
                    "ワイン",
                    "vino",
                    "cabernet",
                    "merlot",
                    "pinot",
                    "chardonnay",
                    "sauvignon",
                    "riesling",
                    "syrah",
                    "champagne",
                    "シャンパン",
                    "bordeaux",
                    "ボルドー",
                    "burgundy",
                    "ブルゴーニュ",
                ],
            ),
            bucket(
                Category::Whiskey,
                &[
                    "whiskey",
                    "whisky",
                    "ウイスキー",
                    "ウィスキー",
                    "bourbon",
                    "scotch",
                    "single malt",
                ],
            ),
            bucket(
                Category::Sake,
                &["sake", "日本酒", "清酒", "純米", "吟醸", "焼酎", "shochu"],
            ),
            bucket(
                Category::Beer,
                &["beer", "ビール", "lager", "ipa", "stout", "pilsner", "クラフト"],
            ),
            bucket(
                Category::Course,
                &["course", "コース", "講座", "lesson", "レッスン", "入門"],
            ),
            bucket(
                Category::Certification,
                &[
                    "certification",
                    "資格",
                    "検定",
                    "sommelier",
                    "ソムリエ",
                    "exam",
                    "試験",
                    "wset",
                ],
            ),
        ])
    }
}
