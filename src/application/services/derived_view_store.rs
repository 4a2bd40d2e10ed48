use crate::domain::projection::{Projectable, derive_view};
use crate::domain::value_objects::{CollectionKey, ViewFilter};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

struct CollectionState<T> {
    raw: Vec<T>,
    /// `update_raw` のたびに進む。楽観的更新の巻き戻し可否判定に使う。
    revision: u64,
    filter: ViewFilter,
    view: watch::Sender<Vec<T>>,
}

impl<T: Projectable> CollectionState<T> {
    fn empty(filter: ViewFilter) -> Self {
        let (view, _) = watch::channel(Vec::new());
        Self {
            raw: Vec::new(),
            revision: 0,
            filter,
            view,
        }
    }

    /// 再計算結果が変わったときだけ購読者に通知する
    fn recompute(&self) -> bool {
        let next = derive_view(&self.raw, &self.filter);
        self.view.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        })
    }
}

struct ViewState<T> {
    /// 新しく作られるコレクションが引き継ぐ絞り込み条件
    filter: ViewFilter,
    collections: HashMap<CollectionKey, CollectionState<T>>,
}

impl<T: Projectable> ViewState<T> {
    fn collection(&mut self, key: &CollectionKey) -> &mut CollectionState<T> {
        let filter = &self.filter;
        self.collections
            .entry(key.clone())
            .or_insert_with(|| CollectionState::empty(filter.clone()))
    }
}

/// 楽観的に書き換える前の項目。`rollback` に渡すと元に戻せる。
#[derive(Debug, Clone)]
pub struct OptimisticPatch<T> {
    item_id: String,
    previous: Vec<(CollectionKey, u64, T)>,
}

impl<T> OptimisticPatch<T> {
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn touched_collections(&self) -> impl Iterator<Item = &CollectionKey> {
        self.previous.iter().map(|(key, _, _)| key)
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}

/// 生コレクションを保持し、絞り込み済みビューを `watch` チャネルで公開するストア。
///
/// 内部状態は単一の Mutex で直列化しており、どのメソッドも await しない。
/// 絞り込み条件はコレクションごとに持つ。`set_filter` 系は全コレクションに、
/// `set_filter_for` 系は指定したキーだけに効く。
pub struct DerivedViewStore<T: Projectable> {
    state: Mutex<ViewState<T>>,
}

impl<T: Projectable> Default for DerivedViewStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Projectable> DerivedViewStore<T> {
    pub fn new() -> Self {
        Self::with_filter(ViewFilter::default())
    }

    pub fn with_filter(filter: ViewFilter) -> Self {
        Self {
            state: Mutex::new(ViewState {
                filter,
                collections: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `key` の生データを丸ごと差し替えてビューを再計算する
    pub fn update_raw(&self, key: &CollectionKey, items: Vec<T>) {
        self.update_raw_if(key, items, || true);
    }

    /// `is_current` が真のときだけ `update_raw` と同じ差し替えを行う。
    ///
    /// 判定はストアのロックを保持したまま行うため、`clear` や
    /// `remove_collection` と前後が入れ替わることはない。
    pub fn update_raw_if<F>(&self, key: &CollectionKey, items: Vec<T>, is_current: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        let mut state = self.lock();
        if !is_current() {
            debug!("Discarded stale delivery for {}", key);
            return false;
        }
        let collection = state.collection(key);
        collection.raw = items;
        collection.revision += 1;
        let changed = collection.recompute();
        debug!(
            "Raw collection {} updated ({} items, view changed: {})",
            key,
            collection.raw.len(),
            changed
        );
        true
    }

    pub fn set_filter(&self, search_text: impl Into<String>, category: impl Into<String>) {
        self.apply_filter(ViewFilter::new(search_text, category));
    }

    pub fn set_search_text(&self, search_text: impl Into<String>) {
        let next = self.filter().with_search_text(search_text);
        self.apply_filter(next);
    }

    pub fn set_category(&self, category: impl Into<String>) {
        let next = self.filter().with_category(category);
        self.apply_filter(next);
    }

    fn apply_filter(&self, filter: ViewFilter) {
        let mut state = self.lock();
        state.filter = filter;
        let state = &mut *state;
        for collection in state.collections.values_mut() {
            if collection.filter != state.filter {
                collection.filter = state.filter.clone();
                collection.recompute();
            }
        }
    }

    pub fn filter(&self) -> ViewFilter {
        self.lock().filter.clone()
    }

    /// `key` のビューだけを絞り込み直す。他のコレクションには影響しない。
    pub fn set_filter_for(&self, key: &CollectionKey, filter: ViewFilter) {
        let mut state = self.lock();
        let collection = state.collection(key);
        if collection.filter == filter {
            return;
        }
        collection.filter = filter;
        collection.recompute();
    }

    pub fn set_search_text_for(&self, key: &CollectionKey, search_text: impl Into<String>) {
        let next = self.filter_for(key).with_search_text(search_text);
        self.set_filter_for(key, next);
    }

    pub fn set_category_for(&self, key: &CollectionKey, category: impl Into<String>) {
        let next = self.filter_for(key).with_category(category);
        self.set_filter_for(key, next);
    }

    pub fn filter_for(&self, key: &CollectionKey) -> ViewFilter {
        let state = self.lock();
        state
            .collections
            .get(key)
            .map(|c| c.filter.clone())
            .unwrap_or_else(|| state.filter.clone())
    }

    /// 絞り込み済みビューの購読。未知のキーなら空のビューから始まる。
    pub fn watch(&self, key: &CollectionKey) -> watch::Receiver<Vec<T>> {
        self.lock().collection(key).view.subscribe()
    }

    pub fn snapshot(&self, key: &CollectionKey) -> Vec<T> {
        self.lock()
            .collections
            .get(key)
            .map(|c| c.view.borrow().clone())
            .unwrap_or_default()
    }

    /// 絞り込み前の生データ
    pub fn raw(&self, key: &CollectionKey) -> Vec<T> {
        self.lock()
            .collections
            .get(key)
            .map(|c| c.raw.clone())
            .unwrap_or_default()
    }

    pub fn raw_len(&self, key: &CollectionKey) -> usize {
        self.lock()
            .collections
            .get(key)
            .map(|c| c.raw.len())
            .unwrap_or(0)
    }

    pub fn find(&self, item_id: &str) -> Option<T> {
        let state = self.lock();
        let mut keys: Vec<&CollectionKey> = state.collections.keys().collect();
        keys.sort();
        keys.into_iter().find_map(|key| {
            state.collections[key]
                .raw
                .iter()
                .find(|item| item.item_id() == item_id)
                .cloned()
        })
    }

    /// `item_id` を含むすべてのコレクションで項目を書き換える
    pub fn patch_item<F>(&self, item_id: &str, patch: F) -> OptimisticPatch<T>
    where
        F: Fn(&mut T),
    {
        let mut state = self.lock();
        let mut previous = Vec::new();

        for (key, collection) in state.collections.iter_mut() {
            let Some(item) = collection
                .raw
                .iter_mut()
                .find(|item| item.item_id() == item_id)
            else {
                continue;
            };
            previous.push((key.clone(), collection.revision, item.clone()));
            patch(item);
            collection.recompute();
        }

        OptimisticPatch {
            item_id: item_id.to_string(),
            previous,
        }
    }

    /// 楽観的更新を巻き戻す。
    ///
    /// 書き換え後に新しい生データが届いたコレクションはそちらを正とし、触らない。
    pub fn rollback(&self, patch: OptimisticPatch<T>) -> usize {
        let mut state = self.lock();
        let mut restored = 0;

        for (key, revision, original) in patch.previous {
            let Some(collection) = state.collections.get_mut(&key) else {
                continue;
            };
            if collection.revision != revision {
                debug!("Skip rollback of {} in {}: newer data arrived", patch.item_id, key);
                continue;
            }
            if let Some(item) = collection
                .raw
                .iter_mut()
                .find(|item| item.item_id() == patch.item_id)
            {
                *item = original;
                collection.recompute();
                restored += 1;
            }
        }

        restored
    }

    pub fn remove_collection(&self, key: &CollectionKey) {
        if let Some(collection) = self.lock().collections.remove(key) {
            collection.view.send_replace(Vec::new());
        }
    }

    /// すべての生データとビューを空にする（購読者への通知は行う）
    pub fn clear(&self) {
        let mut state = self.lock();
        for collection in state.collections.values_mut() {
            collection.raw.clear();
            collection.revision += 1;
            collection.view.send_replace(Vec::new());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Answer, Question};

    fn question(id: &str, title: &str, category: &str, ts: i64) -> Question {
        Question {
            id: id.into(),
            title: title.into(),
            category: category.into(),
            timestamp: ts,
            ..Default::default()
        }
    }

    fn answer(id: &str, ts: i64) -> Answer {
        Answer {
            id: id.into(),
            question_id: "q1".into(),
            text: format!("answer {id}"),
            timestamp: ts,
            ..Default::default()
        }
    }

    #[test]
    fn update_raw_publishes_sorted_view() {
        let store = DerivedViewStore::new();
        let key = CollectionKey::AllQuestions;
        let rx = store.watch(&key);

        store.update_raw(
            &key,
            vec![
                question("a", "Rabin-Karp", "Algorithms", 100),
                question("b", "Dijkstra", "Algorithms", 200),
            ],
        );

        let ids: Vec<_> = rx.borrow().iter().map(|q| q.id.clone()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn set_filter_recomputes_every_collection() {
        let store = DerivedViewStore::new();
        let all = CollectionKey::AllQuestions;
        let mine = CollectionKey::UserQuestions("u1".into());
        store.update_raw(&all, vec![question("a", "Rabin-Karp", "Algorithms", 100)]);
        store.update_raw(&mine, vec![question("b", "Dijkstra", "Graphs", 200)]);

        store.set_filter("karp", "All");
        assert_eq!(store.snapshot(&all).len(), 1);
        assert!(store.snapshot(&mine).is_empty());

        store.set_search_text("");
        store.set_category("graphs");
        assert!(store.snapshot(&all).is_empty());
        assert_eq!(store.snapshot(&mine)[0].id, "b");
        assert_eq!(store.raw_len(&all), 1);
    }

    #[test]
    fn identical_recompute_does_not_notify() {
        let store = DerivedViewStore::new();
        let key = CollectionKey::AllQuestions;
        let mut rx = store.watch(&key);
        let items = vec![question("a", "x", "A", 1)];

        store.update_raw(&key, items.clone());
        assert!(rx.has_changed().unwrap());
        rx.mark_unchanged();

        store.update_raw(&key, items);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn patch_and_rollback_restore_original() {
        let store = DerivedViewStore::new();
        let by_question = CollectionKey::QuestionAnswers("q1".into());
        let by_user = CollectionKey::UserAnswers("u9".into());
        store.update_raw(&by_question, vec![answer("a1", 1), answer("a2", 2)]);
        store.update_raw(&by_user, vec![answer("a1", 1)]);

        let patch = store.patch_item("a1", |a| a.toggle_upvote("u2"));
        assert_eq!(patch.touched_collections().count(), 2);
        assert!(store.find("a1").unwrap().is_upvoted_by("u2"));

        assert_eq!(store.rollback(patch), 2);
        assert!(!store.find("a1").unwrap().is_upvoted_by("u2"));
        assert!(store.raw(&by_user).iter().all(|a| a.upvotes.is_empty()));
    }

    #[test]
    fn rollback_skips_collections_with_newer_data() {
        let store = DerivedViewStore::new();
        let key = CollectionKey::QuestionAnswers("q1".into());
        store.update_raw(&key, vec![answer("a1", 1)]);

        let patch = store.patch_item("a1", |a| a.toggle_upvote("u2"));

        let mut confirmed = answer("a1", 1);
        confirmed.toggle_upvote("u3");
        store.update_raw(&key, vec![confirmed.clone()]);

        assert_eq!(store.rollback(patch), 0);
        assert_eq!(store.raw(&key), vec![confirmed]);
    }

    #[test]
    fn patch_of_unknown_item_is_empty() {
        let store: DerivedViewStore<Answer> = DerivedViewStore::new();
        let patch = store.patch_item("missing", |a| a.toggle_upvote("u"));
        assert!(patch.is_empty());
        assert_eq!(store.rollback(patch), 0);
    }

    #[test]
    fn clear_empties_views_and_notifies() {
        let store = DerivedViewStore::new();
        let key = CollectionKey::AllQuestions;
        store.update_raw(&key, vec![question("a", "x", "A", 1)]);
        let mut rx = store.watch(&key);
        rx.mark_unchanged();

        store.clear();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_empty());
        assert_eq!(store.raw_len(&key), 0);
    }

    #[test]
    fn keyed_filter_leaves_other_collections_alone() {
        let store = DerivedViewStore::new();
        let all = CollectionKey::AllQuestions;
        let mine = CollectionKey::UserQuestions("u1".into());
        store.update_raw(&all, vec![question("a", "Rabin-Karp", "Algorithms", 100)]);
        store.update_raw(&mine, vec![question("b", "Dijkstra", "Graphs", 200)]);

        store.set_search_text_for(&all, "karp");
        store.set_category_for(&all, "Algorithms");
        assert_eq!(store.snapshot(&all).len(), 1);
        assert_eq!(store.snapshot(&mine).len(), 1);
        assert_eq!(store.filter_for(&all).category(), "Algorithms");
        assert_eq!(store.filter_for(&mine), ViewFilter::default());

        // 後から作られるコレクションも既定の条件で始まる
        let other = CollectionKey::UserQuestions("u2".into());
        store.update_raw(&other, vec![question("c", "Prim", "Graphs", 300)]);
        assert_eq!(store.snapshot(&other).len(), 1);
    }

    #[test]
    fn keyed_filter_survives_new_deliveries() {
        let store = DerivedViewStore::new();
        let all = CollectionKey::AllQuestions;
        store.set_search_text_for(&all, "karp");

        store.update_raw(
            &all,
            vec![
                question("a", "Rabin-Karp", "Algorithms", 100),
                question("b", "Dijkstra", "Graphs", 200),
            ],
        );

        let ids: Vec<_> = store.snapshot(&all).into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn stale_delivery_after_clear_is_discarded() {
        let store = DerivedViewStore::new();
        let key = CollectionKey::AllQuestions;
        store.update_raw(&key, vec![question("a", "x", "A", 1)]);
        let live = std::sync::atomic::AtomicBool::new(true);

        live.store(false, std::sync::atomic::Ordering::SeqCst);
        store.clear();

        let applied = store.update_raw_if(&key, vec![question("a", "x", "A", 1)], || {
            live.load(std::sync::atomic::Ordering::SeqCst)
        });
        assert!(!applied);
        assert_eq!(store.raw_len(&key), 0);
        assert!(store.snapshot(&key).is_empty());
    }

    #[test]
    fn current_delivery_is_applied() {
        let store = DerivedViewStore::new();
        let key = CollectionKey::UserAnswers("u1".into());

        assert!(store.update_raw_if(&key, vec![answer("a1", 1)], || true));
        assert_eq!(store.raw_len(&key), 1);
    }
}
