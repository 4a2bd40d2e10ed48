/// カテゴリ絞り込みを行わないことを表す選択肢
pub const ALL_CATEGORIES: &str = "All";
