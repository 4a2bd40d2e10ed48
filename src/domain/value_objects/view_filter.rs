use crate::domain::constants::ALL_CATEGORIES;

/// 検索文字列とカテゴリによる絞り込み条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewFilter {
    search_text: String,
    category: String,
    search_lower: String,
}

impl ViewFilter {
    pub fn new(search_text: impl Into<String>, category: impl Into<String>) -> Self {
        let search_text = search_text.into();
        let search_lower = search_text.to_lowercase();
        Self {
            search_text,
            category: category.into(),
            search_lower,
        }
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn with_search_text(&self, search_text: impl Into<String>) -> Self {
        Self::new(search_text, self.category.clone())
    }

    pub fn with_category(&self, category: impl Into<String>) -> Self {
        Self::new(self.search_text.clone(), category)
    }

    /// 小文字化済みの検索文字列（空なら検索条件なし）
    pub fn search_needle(&self) -> Option<&str> {
        if self.search_lower.is_empty() {
            None
        } else {
            Some(&self.search_lower)
        }
    }

    pub fn is_all_categories(&self) -> bool {
        self.category == ALL_CATEGORIES
    }

    pub fn matches_category(&self, item_category: Option<&str>) -> bool {
        if self.is_all_categories() {
            return true;
        }
        item_category.is_some_and(|c| c.to_lowercase() == self.category.to_lowercase())
    }
}

impl Default for ViewFilter {
    fn default() -> Self {
        Self::new("", ALL_CATEGORIES)
    }
}
