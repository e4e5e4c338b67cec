//! In-memory store, useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use wordcards_core::curriculum::canonical_order;
use wordcards_core::{
    ActivityStore, Card, CardId, CardStore, CardUpdate, Course, CourseId, Curriculum, Lesson,
    LessonId, LessonProgress, MemoryState, NewCard, NewCourse, NewLesson, NewReview, NewWord,
    ProgressStore, Review, StoreError, UserActivity, UserId, Word, WordId,
};

#[derive(Default)]
struct Inner {
    next_id: i64,
    courses: HashMap<CourseId, Course>,
    lessons: HashMap<LessonId, Lesson>,
    words: HashMap<WordId, Word>,
    cards: HashMap<CardId, Card>,
    reviews: Vec<Review>,
    progress: HashMap<(UserId, LessonId), LessonProgress>,
    activity: HashMap<UserId, UserActivity>,
}

impl Inner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn lesson_owner(&self, lesson: LessonId) -> Option<UserId> {
        let lesson = self.lessons.get(&lesson)?;
        self.courses.get(&lesson.course_id).map(|c| c.user_id)
    }
}

/// A store that keeps everything in process memory behind one lock.
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
    fail_review_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            fail_review_writes: AtomicBool::new(false),
        }
    }

    /// Make the review half of `commit_review` fail, for exercising
    /// rollback paths.
    pub fn fail_review_writes(&self, fail: bool) {
        self.fail_review_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn create_course(&self, user: UserId, course: NewCourse) -> Course {
        let mut inner = self.inner.write().await;
        let id = inner.allocate_id();
        let course = Course {
            id,
            user_id: user,
            title: course.title,
            description: course.description,
            language: course.language,
            native_language: course.native_language,
            created_at: Utc::now(),
        };
        inner.courses.insert(id, course.clone());
        course
    }

    pub async fn create_lesson(
        &self,
        course: CourseId,
        lesson: NewLesson,
    ) -> Result<Lesson, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.courses.contains_key(&course) {
            return Err(StoreError::QueryFailed(format!(
                "course {course} does not exist"
            )));
        }
        let id = inner.allocate_id();
        let lesson = Lesson {
            id,
            course_id: course,
            title: lesson.title,
            description: lesson.description,
            order_index: lesson.order_index,
            created_at: Utc::now(),
        };
        inner.lessons.insert(id, lesson.clone());
        Ok(lesson)
    }

    pub async fn create_word(&self, lesson: LessonId, word: NewWord) -> Result<Word, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.lessons.contains_key(&lesson) {
            return Err(StoreError::QueryFailed(format!(
                "lesson {lesson} does not exist"
            )));
        }
        let id = inner.allocate_id();
        let word = Word {
            id,
            lesson_id: lesson,
            text: word.text,
            translation: word.translation,
            pronunciation: word.pronunciation,
            example_sentence: word.example_sentence,
            difficulty_level: word.difficulty_level,
            order_index: word.order_index,
            created_at: Utc::now(),
        };
        inner.words.insert(id, word.clone());
        Ok(word)
    }

    /// Delete a word together with its cards and their reviews.
    pub async fn delete_word(&self, word: WordId) -> bool {
        let mut inner = self.inner.write().await;
        if inner.words.remove(&word).is_none() {
            return false;
        }
        let doomed: Vec<CardId> = inner
            .cards
            .values()
            .filter(|c| c.word_id == word)
            .map(|c| c.id)
            .collect();
        for id in &doomed {
            inner.cards.remove(id);
        }
        inner.reviews.retain(|r| !doomed.contains(&r.card_id));
        true
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CardStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_card(&self, user: UserId, word: WordId) -> Result<Option<Card>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .cards
            .values()
            .find(|c| c.user_id == user && c.word_id == word)
            .cloned())
    }

    async fn get_card_by_id(&self, id: CardId) -> Result<Option<Card>, StoreError> {
        Ok(self.inner.read().await.cards.get(&id).cloned())
    }

    async fn insert_card(&self, card: NewCard) -> Result<Card, StoreError> {
        let mut inner = self.inner.write().await;
        if inner
            .cards
            .values()
            .any(|c| c.user_id == card.user_id && c.word_id == card.word_id)
        {
            return Err(StoreError::Conflict(format!(
                "card for user {} word {} already exists",
                card.user_id, card.word_id
            )));
        }
        let id = inner.allocate_id();
        let card = Card {
            id,
            user_id: card.user_id,
            word_id: card.word_id,
            memory_state: card.memory_state,
            total_reviews: 0,
            correct_reviews: 0,
            last_reviewed_at: None,
            created_at: card.created_at,
            updated_at: card.created_at,
        };
        inner.cards.insert(id, card.clone());
        Ok(card)
    }

    async fn cards_for_user(&self, user: UserId) -> Result<Vec<Card>, StoreError> {
        let inner = self.inner.read().await;
        let mut cards: Vec<Card> = inner
            .cards
            .values()
            .filter(|c| c.user_id == user)
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.id);
        Ok(cards)
    }

    async fn cards_for_words(
        &self,
        user: UserId,
        words: &[WordId],
    ) -> Result<Vec<Card>, StoreError> {
        let inner = self.inner.read().await;
        let mut cards: Vec<Card> = inner
            .cards
            .values()
            .filter(|c| c.user_id == user && words.contains(&c.word_id))
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.id);
        Ok(cards)
    }

    async fn commit_review(
        &self,
        update: CardUpdate,
        review: NewReview,
    ) -> Result<(Card, Review), StoreError> {
        let mut inner = self.inner.write().await;
        let current = inner
            .cards
            .get(&update.card_id)
            .ok_or_else(|| {
                StoreError::QueryFailed(format!("card {} not found", update.card_id))
            })?;
        if current.total_reviews != update.expected_total_reviews {
            return Err(StoreError::Conflict(format!(
                "card {} moved from version {} to {}",
                update.card_id, update.expected_total_reviews, current.total_reviews
            )));
        }
        if self.fail_review_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("review log write failed".into()));
        }

        let mut card = current.clone();
        card.memory_state = update.memory_state;
        card.total_reviews = update.total_reviews;
        card.correct_reviews = update.correct_reviews;
        card.last_reviewed_at = Some(update.last_reviewed_at);
        card.updated_at = update.last_reviewed_at;

        let review_id = inner.allocate_id();
        let review = Review::from_new(review_id, card.id, review);
        inner.cards.insert(card.id, card.clone());
        inner.reviews.push(review.clone());
        Ok((card, review))
    }

    async fn reviews_for_card(&self, card: CardId) -> Result<Vec<Review>, StoreError> {
        let inner = self.inner.read().await;
        let mut reviews: Vec<Review> = inner
            .reviews
            .iter()
            .filter(|r| r.card_id == card)
            .cloned()
            .collect();
        reviews.sort_by_key(|r| r.id);
        Ok(reviews)
    }

    async fn replace_memory_state(
        &self,
        card: CardId,
        expected_total_reviews: i64,
        state: &MemoryState,
    ) -> Result<Card, StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .cards
            .get_mut(&card)
            .ok_or_else(|| StoreError::QueryFailed(format!("card {card} not found")))?;
        if stored.total_reviews != expected_total_reviews {
            return Err(StoreError::Conflict(format!(
                "card {card} is no longer at version {expected_total_reviews}"
            )));
        }
        stored.memory_state = state.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }
}

/// Merge an incoming progress row into the stored one, keeping completion
/// and the first start time.
pub(crate) fn merge_sticky(
    stored: Option<&LessonProgress>,
    incoming: &LessonProgress,
) -> LessonProgress {
    let mut merged = incoming.clone();
    if let Some(stored) = stored {
        merged.is_started |= stored.is_started;
        merged.started_at = stored.started_at.or(incoming.started_at);
        if stored.is_completed {
            merged.is_completed = true;
            merged.completed_at = stored.completed_at.or(incoming.completed_at);
        }
    }
    merged
}

#[async_trait]
impl ProgressStore for InMemoryStore {
    async fn get_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<LessonProgress>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.progress.get(&(user, lesson)).cloned())
    }

    async fn upsert_progress(
        &self,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StoreError> {
        let mut inner = self.inner.write().await;
        let key = (progress.user_id, progress.lesson_id);
        let merged = merge_sticky(inner.progress.get(&key), progress);
        inner.progress.insert(key, merged.clone());
        Ok(merged)
    }

    async fn progress_for_user(&self, user: UserId) -> Result<Vec<LessonProgress>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<LessonProgress> = inner
            .progress
            .values()
            .filter(|p| p.user_id == user)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.lesson_id);
        Ok(rows)
    }
}

#[async_trait]
impl Curriculum for InMemoryStore {
    async fn lesson(&self, user: UserId, lesson: LessonId) -> Result<Option<Lesson>, StoreError> {
        let inner = self.inner.read().await;
        if inner.lesson_owner(lesson) != Some(user) {
            return Ok(None);
        }
        Ok(inner.lessons.get(&lesson).cloned())
    }

    async fn lesson_words(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<Vec<Word>>, StoreError> {
        let inner = self.inner.read().await;
        if inner.lesson_owner(lesson) != Some(user) {
            return Ok(None);
        }
        let mut words: Vec<Word> = inner
            .words
            .values()
            .filter(|w| w.lesson_id == lesson)
            .cloned()
            .collect();
        canonical_order(&mut words);
        Ok(Some(words))
    }

    async fn word(&self, user: UserId, word: WordId) -> Result<Option<Word>, StoreError> {
        let inner = self.inner.read().await;
        let Some(found) = inner.words.get(&word) else {
            return Ok(None);
        };
        if inner.lesson_owner(found.lesson_id) != Some(user) {
            return Ok(None);
        }
        Ok(Some(found.clone()))
    }
}

#[async_trait]
impl ActivityStore for InMemoryStore {
    async fn get_activity(&self, user: UserId) -> Result<Option<UserActivity>, StoreError> {
        Ok(self.inner.read().await.activity.get(&user).cloned())
    }

    async fn put_activity(&self, activity: &UserActivity) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .activity
            .insert(activity.user_id, activity.clone());
        Ok(())
    }
}
