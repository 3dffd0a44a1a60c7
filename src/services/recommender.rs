/// Content-based recipe recommendations
///
/// Each recipe is indexed as a TF-IDF vector over a document made of its
/// title, description, cuisine, meal type and ingredients. Queries are
/// projected into the same vocabulary and ranked by cosine similarity.
/// Filters run after ranking; if they reject every candidate the unfiltered
/// ranking is returned instead.
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use tokio::sync::{Mutex, RwLock};

use crate::{
    db::RecipeStore,
    error::AppResult,
    models::{PreferenceProfile, RecipeFilters, StoredRecipe, UserId},
};

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "either",
    "else", "few", "for", "from", "further", "get", "had", "has", "have", "having", "he", "her",
    "here", "hers", "herself", "him", "himself", "his", "how", "however", "i", "if", "in", "into",
    "is", "it", "its", "itself", "just", "less", "made", "many", "may", "me", "might", "more",
    "most", "much", "must", "my", "myself", "no", "nor", "not", "now", "of", "off", "often", "on",
    "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "per",
    "perhaps", "please", "same", "several", "she", "should", "since", "so", "some", "such", "than",
    "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they",
    "this", "those", "through", "thus", "to", "too", "under", "until", "up", "upon", "us", "very",
    "via", "was", "we", "well", "were", "what", "whatever", "when", "where", "whether", "which",
    "while", "who", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet",
    "you", "your", "yours", "yourself", "yourselves",
];

/// Lowercased alphanumeric tokens of two or more characters, stop words removed
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2 && !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

fn recipe_document(recipe: &StoredRecipe) -> String {
    let draft = &recipe.draft;
    format!(
        "{} {} {} {} {}",
        draft.title,
        draft.description,
        draft.cuisine,
        draft.meal_type,
        draft.ingredients.join(" ")
    )
}

/// Sparse, L2-normalised term vector sorted by term id
type SparseVector = Vec<(usize, f64)>;

fn normalize(mut vector: SparseVector) -> SparseVector {
    let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for (_, weight) in vector.iter_mut() {
            *weight /= norm;
        }
    }
    vector
}

fn dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

/// Immutable similarity index over a recipe corpus
#[derive(Debug, Default)]
pub struct RecipeIndex {
    recipes: Vec<StoredRecipe>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    vectors: Vec<SparseVector>,
}

impl RecipeIndex {
    /// Fits the vocabulary and smoothed IDF weights over `corpus`
    pub fn build(corpus: Vec<StoredRecipe>) -> Self {
        let documents: Vec<Vec<String>> = corpus.iter().map(|r| tokenize(&recipe_document(r))).collect();

        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<usize> = Vec::new();
        for tokens in &documents {
            let mut seen: Vec<usize> = Vec::new();
            for token in tokens {
                let next_id = vocabulary.len();
                let id = *vocabulary.entry(token.clone()).or_insert(next_id);
                if id == doc_freq.len() {
                    doc_freq.push(0);
                }
                if !seen.contains(&id) {
                    seen.push(id);
                    doc_freq[id] += 1;
                }
            }
        }

        let n = documents.len() as f64;
        let idf: Vec<f64> = doc_freq
            .iter()
            .map(|df| ((1.0 + n) / (1.0 + *df as f64)).ln() + 1.0)
            .collect();

        let mut index = Self {
            recipes: Vec::new(),
            vocabulary,
            idf,
            vectors: Vec::new(),
        };
        let vectors = documents.iter().map(|tokens| index.vectorize(tokens)).collect();
        index.vectors = vectors;
        index.recipes = corpus;

        tracing::debug!(
            documents = index.recipes.len(),
            vocabulary = index.vocabulary.len(),
            "Built recipe index"
        );
        index
    }

    /// TF-IDF vector for tokens; tokens outside the vocabulary are ignored
    fn vectorize(&self, tokens: &[String]) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokens {
            if let Some(id) = self.vocabulary.get(token) {
                *counts.entry(*id).or_insert(0.0) += 1.0;
            }
        }
        normalize(
            counts
                .into_iter()
                .map(|(id, tf)| (id, tf * self.idf[id]))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Top `top_n` recipes across the whole corpus
    pub fn query(&self, text: &str, filters: &RecipeFilters, top_n: usize) -> Vec<&StoredRecipe> {
        self.rank(text, filters, top_n, |_| true)
    }

    /// Top `top_n` among shared curated recipes only
    pub fn query_curated(
        &self,
        text: &str,
        filters: &RecipeFilters,
        top_n: usize,
    ) -> Vec<&StoredRecipe> {
        self.rank(text, filters, top_n, |r| r.draft.owner.is_none())
    }

    /// Top `top_n` among curated recipes and those owned by `viewer`
    pub fn query_scoped(
        &self,
        text: &str,
        filters: &RecipeFilters,
        top_n: usize,
        viewer: UserId,
    ) -> Vec<&StoredRecipe> {
        self.rank(text, filters, top_n, |r| r.draft.is_visible_to(viewer))
    }

    fn rank(
        &self,
        text: &str,
        filters: &RecipeFilters,
        top_n: usize,
        visible: impl Fn(&StoredRecipe) -> bool,
    ) -> Vec<&StoredRecipe> {
        let query = self.vectorize(&tokenize(text));

        let mut ranked: Vec<(usize, f64)> = self
            .recipes
            .iter()
            .enumerate()
            .filter(|(_, r)| visible(*r))
            .map(|(i, _)| (i, dot(&query, &self.vectors[i])))
            .collect();
        // sort_by is stable, so equal scores keep corpus order
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let filtered: Vec<&StoredRecipe> = ranked
            .iter()
            .map(|(i, _)| &self.recipes[*i])
            .filter(|r| filters.matches(&r.draft))
            .take(top_n)
            .collect();

        if !filtered.is_empty() || ranked.is_empty() {
            return filtered;
        }

        tracing::debug!(query = %text, "Filters matched nothing, returning unfiltered ranking");
        ranked
            .iter()
            .take(top_n)
            .map(|(i, _)| &self.recipes[*i])
            .collect()
    }
}

/// Owns the live index and rebuilds it from the recipe store
#[derive(Clone)]
pub struct Recommender {
    recipes: Arc<dyn RecipeStore>,
    index: Arc<RwLock<Arc<RecipeIndex>>>,
    /// Serialises list, build and swap so a stale corpus never replaces a newer index
    rebuild: Arc<Mutex<()>>,
}

impl Recommender {
    pub fn new(recipes: Arc<dyn RecipeStore>) -> Self {
        Self {
            recipes,
            index: Arc::new(RwLock::new(Arc::new(RecipeIndex::default()))),
            rebuild: Arc::new(Mutex::new(())),
        }
    }

    /// Rebuilds the index off the async runtime and swaps it in
    pub async fn refresh(&self) -> AppResult<usize> {
        let _rebuilding = self.rebuild.lock().await;
        let corpus = self.recipes.list_all().await?;
        let index = tokio::task::spawn_blocking(move || RecipeIndex::build(corpus)).await?;

        let size = index.len();
        *self.index.write().await = Arc::new(index);

        tracing::info!(recipes = size, "Recipe index refreshed");
        Ok(size)
    }

    /// Current index; queries on it are unaffected by later refreshes
    pub async fn snapshot(&self) -> Arc<RecipeIndex> {
        self.index.read().await.clone()
    }

    /// Ranks recipes visible to `viewer`; anonymous callers see curated recipes only
    pub async fn recommend(
        &self,
        text: &str,
        filters: &RecipeFilters,
        top_n: usize,
        viewer: Option<UserId>,
    ) -> Vec<StoredRecipe> {
        let index = self.snapshot().await;
        let results = match viewer {
            Some(user) => index.query_scoped(text, filters, top_n, user),
            None => index.query_curated(text, filters, top_n),
        };
        results.into_iter().cloned().collect()
    }

    /// Recommendations from the query and filters derived from a profile
    pub async fn recommend_for_user(
        &self,
        user_id: UserId,
        profile: &PreferenceProfile,
        top_n: usize,
    ) -> Vec<StoredRecipe> {
        let query = profile.derive_query();
        tracing::debug!(user_id = %user_id, query = %query.text, "Recommending for user");
        self.recommend(&query.text, &query.filters, top_n, Some(user_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::memory::InMemoryRecipeStore,
        models::{DietaryFlags, Difficulty, MealType, Provenance, RecipeDraft},
    };
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn recipe(
        title: &str,
        description: &str,
        cuisine: &str,
        ingredients: &[&str],
        dietary: DietaryFlags,
    ) -> StoredRecipe {
        StoredRecipe::new(RecipeDraft {
            title: title.to_string(),
            description: description.to_string(),
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            instructions: vec!["Cook".to_string()],
            cuisine: cuisine.to_string(),
            meal_type: MealType::Dinner,
            prep_time: 15,
            cook_time: 25,
            total_time: 40,
            difficulty: Difficulty::Medium,
            dietary,
            spicy_level: 0,
            tags: BTreeSet::new(),
            provenance: Provenance::Curated,
            owner: None,
        })
    }

    fn corpus() -> Vec<StoredRecipe> {
        vec![
            recipe(
                "Mushroom Risotto",
                "Creamy arborio rice slowly cooked with mushrooms",
                "Italian",
                &["arborio rice", "mushrooms", "parmesan", "butter"],
                DietaryFlags {
                    vegetarian: true,
                    ..Default::default()
                },
            ),
            recipe(
                "Beef Tacos",
                "Street-style tacos with seasoned beef",
                "Mexican",
                &["beef", "tortillas", "salsa", "cheese"],
                DietaryFlags::default(),
            ),
            recipe(
                "Thai Green Curry",
                "Spicy coconut curry with vegetables",
                "Thai",
                &["green curry paste", "coconut milk", "thai basil", "chicken"],
                DietaryFlags {
                    dairy_free: true,
                    ..Default::default()
                },
            ),
        ]
    }

    fn titles(results: &[&StoredRecipe]) -> Vec<String> {
        results.iter().map(|r| r.draft.title.clone()).collect()
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        assert_eq!(
            tokenize("A bowl of Thai-style noodles, with 2 eggs!"),
            vec!["bowl", "thai", "style", "noodles", "eggs"]
        );
    }

    #[test]
    fn test_spicy_thai_dinner_with_dairy_free_filter() {
        let index = RecipeIndex::build(corpus());
        let filters = RecipeFilters {
            dairy_free: Some(true),
            ..Default::default()
        };

        let results = index.query("spicy Thai dinner", &filters, 5);
        assert_eq!(titles(&results), vec!["Thai Green Curry"]);
    }

    #[test]
    fn test_ranking_without_filters_puts_best_match_first() {
        let index = RecipeIndex::build(corpus());
        let results = index.query("creamy mushroom rice", &RecipeFilters::default(), 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].draft.title, "Mushroom Risotto");
    }

    #[test]
    fn test_query_is_stable() {
        let index = RecipeIndex::build(corpus());
        let filters = RecipeFilters::default();
        let first = titles(&index.query("dinner", &filters, 3));
        let second = titles(&index.query("dinner", &filters, 3));
        assert_eq!(first, second);
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let index = RecipeIndex::build(corpus());
        let results = index.query("unknownword", &RecipeFilters::default(), 3);
        assert_eq!(
            titles(&results),
            vec!["Mushroom Risotto", "Beef Tacos", "Thai Green Curry"]
        );
    }

    #[test]
    fn test_filters_matching_nothing_fall_back_to_ranking() {
        let index = RecipeIndex::build(corpus());
        let filters = RecipeFilters {
            vegan: Some(true),
            ..Default::default()
        };
        let results = index.query("thai curry", &filters, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].draft.title, "Thai Green Curry");
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = RecipeIndex::build(Vec::new());
        assert!(index.is_empty());
        assert!(index.query("anything", &RecipeFilters::default(), 5).is_empty());
    }

    #[test]
    fn test_scoped_query_hides_other_users_recipes() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let mut recipes = corpus();
        let mut private = recipe(
            "Thai Basil Chicken",
            "Spicy stir fry",
            "Thai",
            &["chicken", "thai basil"],
            DietaryFlags::default(),
        );
        private.draft.provenance = Provenance::LlmGenerated;
        private.draft.owner = Some(owner);
        recipes.push(private);

        let index = RecipeIndex::build(recipes);
        let filters = RecipeFilters::default();

        let mine = titles(&index.query_scoped("thai basil", &filters, 10, owner));
        let theirs = titles(&index.query_scoped("thai basil", &filters, 10, stranger));
        assert!(mine.contains(&"Thai Basil Chicken".to_string()));
        assert!(!theirs.contains(&"Thai Basil Chicken".to_string()));
        assert_eq!(theirs.len(), 3);

        let anonymous = titles(&index.query_curated("thai basil", &filters, 10));
        assert_eq!(anonymous, theirs);
    }

    /// Store whose first listing returns its snapshot only after a pause
    struct SlowFirstListing {
        inner: InMemoryRecipeStore,
        listed: tokio::sync::Notify,
        slowed: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl RecipeStore for SlowFirstListing {
        async fn insert(&self, draft: RecipeDraft) -> AppResult<StoredRecipe> {
            self.inner.insert(draft).await
        }

        async fn delete_generated(&self, owner: UserId) -> AppResult<u64> {
            self.inner.delete_generated(owner).await
        }

        async fn list_all(&self) -> AppResult<Vec<StoredRecipe>> {
            let corpus = self.inner.list_all().await?;
            if !self.slowed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                self.listed.notify_one();
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
            Ok(corpus)
        }

        async fn count_generated(&self, owner: UserId) -> AppResult<u64> {
            self.inner.count_generated(owner).await
        }

        async fn count_curated(&self) -> AppResult<u64> {
            self.inner.count_curated().await
        }
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_keep_newest_corpus() {
        let store = Arc::new(SlowFirstListing {
            inner: InMemoryRecipeStore::new(),
            listed: tokio::sync::Notify::new(),
            slowed: std::sync::atomic::AtomicBool::new(false),
        });
        let recommender = Recommender::new(store.clone());

        let stale = {
            let recommender = recommender.clone();
            tokio::spawn(async move { recommender.refresh().await })
        };
        store.listed.notified().await;

        for recipe in corpus() {
            store.insert(recipe.draft).await.unwrap();
        }
        assert_eq!(recommender.refresh().await.unwrap(), 3);
        assert_eq!(stale.await.unwrap().unwrap(), 0);

        assert_eq!(recommender.snapshot().await.len(), 3);
    }

    #[tokio::test]
    async fn test_refresh_swaps_in_new_index() {
        let store = Arc::new(InMemoryRecipeStore::new());
        let recommender = Recommender::new(store.clone());
        assert!(recommender.snapshot().await.is_empty());

        for recipe in corpus() {
            store.insert(recipe.draft).await.unwrap();
        }
        let before = recommender.snapshot().await;
        assert_eq!(recommender.refresh().await.unwrap(), 3);

        assert!(before.is_empty());
        let results = recommender
            .recommend("tacos", &RecipeFilters::default(), 1, None)
            .await;
        assert_eq!(results[0].draft.title, "Beef Tacos");
    }
}
