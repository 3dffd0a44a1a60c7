/// Per-user recipe generation
///
/// A job purges the user's previous generated drafts, then fills `count`
/// slots one at a time. Each slot tries the model once; the fallback
/// synthesizer takes over for a slot when the service is missing or slow,
/// and for every remaining slot once failures and duplicate titles together
/// reach the threshold. Each draft is committed as soon as it exists.
use serde::Serialize;
use std::{collections::HashSet, sync::Arc, time::Duration};
use uuid::Uuid;

use crate::{
    db::{PreferenceStore, RecipeStore},
    error::{AppError, AppResult},
    models::{MealType, PreferenceProfile, Provenance, RecipeDraft, UserId},
    services::{
        draft::{decorate_repeated_dish, draft_from_value, DraftContext, DraftError},
        fallback,
        llm::{GenerationClient, TransportError},
        parser::{self, ParseFailure},
        prompt::{self, PromptKind},
        recommender::Recommender,
    },
};

pub mod lock;

pub use lock::{GenerationGuard, GenerationLocks};

/// Attempts at drawing a fresh fallback title before the slot is dropped
const FALLBACK_TITLE_DRAWS: usize = 3;

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub initial_count: usize,
    pub failure_threshold: u32,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            initial_count: 6,
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Tally of one generation job
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationReport {
    pub requested: usize,
    pub persisted: Vec<Uuid>,
    pub llm_count: usize,
    pub fallback_count: usize,
    pub duplicates: usize,
    pub failures: u32,
    pub purged: u64,
    pub fallback_latched: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationStart {
    Completed(GenerationReport),
    /// Another job for the same user holds the lock; nothing was done
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationStatus {
    pub is_generating: bool,
    pub recipes_count: u64,
    pub has_preferences: bool,
    pub generation_complete: bool,
}

#[derive(thiserror::Error, Debug)]
enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error("recipe contains allergens: {0}")]
    Allergen(String),
}

/// State of one running job; never persisted
struct GenerationJob {
    user_id: UserId,
    titles: HashSet<String>,
    failure_threshold: u32,
    /// Failures plus duplicate titles; drives the fallback latch
    strikes: u32,
    report: GenerationReport,
}

impl GenerationJob {
    fn new(user_id: UserId, requested: usize, failure_threshold: u32) -> Self {
        Self {
            user_id,
            titles: HashSet::new(),
            failure_threshold,
            strikes: 0,
            report: GenerationReport {
                requested,
                ..Default::default()
            },
        }
    }

    fn record_failure(&mut self) {
        self.report.failures += 1;
        self.strike();
    }

    /// A model that keeps repeating a title trips the latch like one that keeps failing
    fn record_duplicate(&mut self) {
        self.report.duplicates += 1;
        self.strike();
    }

    fn strike(&mut self) {
        self.strikes += 1;
        if !self.report.fallback_latched && self.strikes >= self.failure_threshold {
            self.report.fallback_latched = true;
            tracing::warn!(
                user_id = %self.user_id,
                failures = self.report.failures,
                duplicates = self.report.duplicates,
                "Failure threshold reached, using fallback for the rest of the job"
            );
        }
    }
}

#[derive(Clone)]
pub struct GenerationOrchestrator {
    client: Arc<dyn GenerationClient>,
    recipes: Arc<dyn RecipeStore>,
    preferences: Arc<dyn PreferenceStore>,
    recommender: Recommender,
    locks: GenerationLocks,
    settings: GenerationSettings,
}

impl GenerationOrchestrator {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        recipes: Arc<dyn RecipeStore>,
        preferences: Arc<dyn PreferenceStore>,
        recommender: Recommender,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            client,
            recipes,
            preferences,
            recommender,
            locks: GenerationLocks::new(),
            settings,
        }
    }

    pub fn locks(&self) -> &GenerationLocks {
        &self.locks
    }

    pub fn is_generating(&self, user_id: UserId) -> bool {
        self.locks.is_locked(user_id)
    }

    /// Runs a job to completion unless one is already running for the user.
    ///
    /// `count` defaults to the configured initial count.
    pub async fn generate_for_user(
        &self,
        user_id: UserId,
        count: Option<usize>,
    ) -> AppResult<GenerationStart> {
        let Some(guard) = self.locks.try_acquire(user_id) else {
            tracing::info!(user_id = %user_id, "Generation already in progress, ignoring request");
            return Ok(GenerationStart::AlreadyRunning);
        };

        let report = self.run_locked(guard, count).await?;
        Ok(GenerationStart::Completed(report))
    }

    /// Acquires the lock and runs the job on a background task.
    ///
    /// Returns false without spawning when a job already holds the lock.
    pub fn spawn_for_user(&self, user_id: UserId, count: Option<usize>) -> bool {
        let Some(guard) = self.locks.try_acquire(user_id) else {
            tracing::info!(user_id = %user_id, "Generation already in progress, ignoring request");
            return false;
        };

        let orchestrator = self.clone();
        tokio::spawn(async move {
            match orchestrator.run_locked(guard, count).await {
                Ok(report) => tracing::info!(
                    user_id = %user_id,
                    persisted = report.persisted.len(),
                    requested = report.requested,
                    "Background generation finished"
                ),
                Err(e) => tracing::error!(user_id = %user_id, error = %e, "Background generation failed"),
            }
        });
        true
    }

    pub async fn status(&self, user_id: UserId) -> AppResult<GenerationStatus> {
        let is_generating = self.locks.is_locked(user_id);
        let recipes_count = self.recipes.count_generated(user_id).await?;
        let has_preferences = self.preferences.get(user_id).await?.is_some();

        Ok(GenerationStatus {
            is_generating,
            recipes_count,
            has_preferences,
            generation_complete: !is_generating
                && (recipes_count >= self.settings.initial_count as u64 || !has_preferences),
        })
    }

    /// The guard is held until this returns, on every path
    async fn run_locked(
        &self,
        guard: GenerationGuard,
        count: Option<usize>,
    ) -> AppResult<GenerationReport> {
        let user_id = guard.user_id();
        let profile = self
            .preferences
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No preferences stored for user {}", user_id)))?;

        let count = count.unwrap_or(self.settings.initial_count);
        let report = self.run_job(user_id, &profile, count).await;

        if report.purged > 0 || !report.persisted.is_empty() {
            if let Err(e) = self.recommender.refresh().await {
                tracing::error!(error = %e, "Failed to refresh recipe index after generation");
            }
        }

        drop(guard);
        Ok(report)
    }

    async fn run_job(
        &self,
        user_id: UserId,
        profile: &PreferenceProfile,
        count: usize,
    ) -> GenerationReport {
        let mut job = GenerationJob::new(user_id, count, self.settings.failure_threshold);

        match self.recipes.delete_generated(user_id).await {
            Ok(purged) => job.report.purged = purged,
            Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Failed to purge previous recipes"),
        }

        let query = profile.derive_query();
        tracing::info!(
            user_id = %user_id,
            count,
            query = %query.text,
            restrictions = ?profile.combined_restrictions(),
            avoid = ?profile.allergy_constraints(),
            "Starting recipe generation"
        );

        let cuisines: Vec<&str> = profile
            .cuisines
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        let mut meal_types = profile.meal_type_rotation();
        if meal_types.is_empty() {
            meal_types.push(MealType::Dinner);
        }

        for slot in 0..count {
            let cuisine = (!cuisines.is_empty()).then(|| cuisines[slot % cuisines.len()]);
            let meal_type = meal_types[slot % meal_types.len()];

            let draft = if job.report.fallback_latched {
                self.fallback_draft(&job, profile, cuisine, meal_type)
            } else {
                match self.attempt_model(user_id, profile, cuisine, meal_type).await {
                    Ok(draft) => draft,
                    Err(AttemptError::Transport(e)) if e.warrants_fallback() => {
                        tracing::warn!(user_id = %user_id, slot, error = %e, "Generation service unusable, using fallback");
                        job.record_failure();
                        self.fallback_draft(&job, profile, cuisine, meal_type)
                    }
                    Err(e) => {
                        tracing::warn!(user_id = %user_id, slot, error = %e, "Generation attempt failed");
                        job.record_failure();
                        continue;
                    }
                }
            };

            if !job.titles.insert(draft.title.clone()) {
                tracing::warn!(user_id = %user_id, title = %draft.title, "Skipping duplicate recipe");
                job.record_duplicate();
                continue;
            }

            let provenance = draft.provenance;
            match self.recipes.insert(draft).await {
                Ok(stored) => {
                    tracing::debug!(user_id = %user_id, slot, title = %stored.draft.title, provenance = %provenance, "Stored recipe");
                    job.report.persisted.push(stored.id);
                    match provenance {
                        Provenance::Fallback => job.report.fallback_count += 1,
                        _ => job.report.llm_count += 1,
                    }
                }
                Err(e) => {
                    tracing::error!(user_id = %user_id, slot, error = %e, "Failed to store recipe");
                    job.record_failure();
                }
            }
        }

        tracing::info!(
            user_id = %user_id,
            requested = count,
            persisted = job.report.persisted.len(),
            llm = job.report.llm_count,
            fallback = job.report.fallback_count,
            duplicates = job.report.duplicates,
            failures = job.report.failures,
            "Recipe generation finished"
        );
        job.report
    }

    async fn attempt_model(
        &self,
        user_id: UserId,
        profile: &PreferenceProfile,
        cuisine: Option<&str>,
        meal_type: MealType,
    ) -> Result<RecipeDraft, AttemptError> {
        let prompt = prompt::build(profile, &PromptKind::Recipe { cuisine, meal_type });
        let raw = self.client.call(&prompt, self.settings.timeout).await?;
        let value = parser::extract(&raw)?;

        let ctx = DraftContext {
            owner: user_id,
            cuisine,
            meal_type,
            profile,
        };
        let mut draft = draft_from_value(&value, &ctx)?;

        let allergens = draft.allergens_present(&profile.allergies);
        if !allergens.is_empty() {
            return Err(AttemptError::Allergen(allergens.join(", ")));
        }

        draft.title = {
            let mut rng = rand::thread_rng();
            decorate_repeated_dish(&draft.title, &draft.cuisine, &mut rng)
        };
        Ok(draft)
    }

    /// Fallback draft whose title is not yet used in this job, when one can be drawn
    fn fallback_draft(
        &self,
        job: &GenerationJob,
        profile: &PreferenceProfile,
        cuisine: Option<&str>,
        meal_type: MealType,
    ) -> RecipeDraft {
        let cuisines: Vec<String> = cuisine.map(str::to_string).into_iter().collect();
        let mut rng = rand::thread_rng();

        let mut draft = fallback::synthesize(
            &cuisines,
            Some(meal_type.as_str()),
            &profile.allergies,
            job.user_id,
            &mut rng,
        );
        for _ in 1..FALLBACK_TITLE_DRAWS {
            if !job.titles.contains(&draft.title) {
                break;
            }
            draft = fallback::synthesize(
                &cuisines,
                Some(meal_type.as_str()),
                &profile.allergies,
                job.user_id,
                &mut rng,
            );
        }
        draft
    }
}
