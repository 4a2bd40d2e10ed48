//! 生コレクションから絞り込み・整列済みのビューを導出する。

use crate::domain::value_objects::ViewFilter;
use std::cmp::Ordering;

/// ビューに載せられる項目（質問・回答）
pub trait Projectable: Clone + PartialEq + Send + Sync + 'static {
    fn item_id(&self) -> &str;

    /// 並び順のキー（ミリ秒）
    fn timestamp(&self) -> i64;

    /// 小文字化済みの検索文字列を含むか
    fn matches_text(&self, needle_lower: &str) -> bool;

    fn category(&self) -> Option<&str>;
}

pub fn matches<T: Projectable>(item: &T, filter: &ViewFilter) -> bool {
    let matches_search = filter
        .search_needle()
        .is_none_or(|needle| item.matches_text(needle));
    matches_search && filter.matches_category(item.category())
}

/// 新しい順、同時刻は ID 昇順
pub fn view_order<T: Projectable>(a: &T, b: &T) -> Ordering {
    b.timestamp()
        .cmp(&a.timestamp())
        .then_with(|| a.item_id().cmp(b.item_id()))
}

pub fn derive_view<T: Projectable>(items: &[T], filter: &ViewFilter) -> Vec<T> {
    let mut view: Vec<T> = items
        .iter()
        .filter(|item| matches(*item, filter))
        .cloned()
        .collect();
    view.sort_by(view_order);
    view
}
