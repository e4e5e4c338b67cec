//! SQLite store.
//!
//! One database file holds the curriculum (`courses`, `lessons`, `words`),
//! the scheduling data (`cards`, `reviews`), and the derived tables
//! (`lesson_progress`, `user_activity`). Timestamps are stored as RFC 3339
//! text with a fixed nanosecond width so that text order is time order.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};
use wordcards_core::curriculum::canonical_order;
use wordcards_core::{
    ActivityStore, Card, CardId, CardStore, CardUpdate, Course, CourseId, Curriculum, Lesson,
    LessonId, LessonProgress, MemoryState, NewCard, NewCourse, NewLesson, NewReview, NewWord,
    ProgressStore, Rating, Review, StoreError, UserActivity, UserId, Word, WordId,
};

const CARD_COLUMNS: &str = "id, user_id, word_id, memory_state, total_reviews, \
     correct_reviews, last_reviewed_at, created_at, updated_at";

const REVIEW_COLUMNS: &str = "id, card_id, rating, reviewed_at, response_latency_secs, \
     lesson_id, scheduled_days, elapsed_days, lapses";

const PROGRESS_COLUMNS: &str = "user_id, lesson_id, total_words, words_learned, \
     words_to_review, is_started, is_completed, started_at, completed_at, updated_at";

const WORD_COLUMNS: &str = "w.id, w.lesson_id, w.text, w.translation, w.pronunciation, \
     w.example_sentence, w.difficulty_level, w.order_index, w.created_at";

/// SQLite bind limit is 32766 on modern builds; stay well below it.
const IN_LIST_CHUNK: usize = 500;

/// A SQLite-backed implementation of every wordcards persistence trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `url`.
    ///
    /// Accepts `sqlite://path` URLs or plain file paths. The schema is
    /// created automatically.
    pub async fn new(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite url: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {url}");
        Ok(store)
    }

    /// An ephemeral in-process database.
    ///
    /// Each SQLite `:memory:` connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite url: {e}")))?
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        Self::from_pool(pool).await
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements: [(&str, &str); 10] = [
            (
                "courses table",
                r#"
                CREATE TABLE IF NOT EXISTS courses (
                    id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id         INTEGER NOT NULL,
                    title           TEXT NOT NULL,
                    description     TEXT,
                    language        TEXT NOT NULL,
                    native_language TEXT NOT NULL,
                    created_at      TEXT NOT NULL
                )
                "#,
            ),
            (
                "lessons table",
                r#"
                CREATE TABLE IF NOT EXISTS lessons (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    course_id   INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
                    title       TEXT NOT NULL,
                    description TEXT,
                    order_index INTEGER NOT NULL DEFAULT 0,
                    created_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "words table",
                r#"
                CREATE TABLE IF NOT EXISTS words (
                    id               INTEGER PRIMARY KEY AUTOINCREMENT,
                    lesson_id        INTEGER NOT NULL REFERENCES lessons(id) ON DELETE CASCADE,
                    text             TEXT NOT NULL,
                    translation      TEXT NOT NULL,
                    pronunciation    TEXT,
                    example_sentence TEXT,
                    difficulty_level INTEGER NOT NULL DEFAULT 1
                        CHECK (difficulty_level BETWEEN 1 AND 5),
                    order_index      INTEGER NOT NULL DEFAULT 0,
                    created_at       TEXT NOT NULL
                )
                "#,
            ),
            (
                "cards table",
                r#"
                CREATE TABLE IF NOT EXISTS cards (
                    id               INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id          INTEGER NOT NULL,
                    word_id          INTEGER NOT NULL REFERENCES words(id) ON DELETE CASCADE,
                    memory_state     TEXT NOT NULL,
                    total_reviews    INTEGER NOT NULL DEFAULT 0,
                    correct_reviews  INTEGER NOT NULL DEFAULT 0,
                    last_reviewed_at TEXT,
                    created_at       TEXT NOT NULL,
                    updated_at       TEXT NOT NULL,
                    UNIQUE (user_id, word_id)
                )
                "#,
            ),
            (
                "reviews table",
                r#"
                CREATE TABLE IF NOT EXISTS reviews (
                    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
                    card_id               INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                    rating                INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 4),
                    reviewed_at           TEXT NOT NULL,
                    response_latency_secs REAL,
                    lesson_id             INTEGER REFERENCES lessons(id) ON DELETE SET NULL,
                    scheduled_days        INTEGER,
                    elapsed_days          INTEGER,
                    lapses                INTEGER
                )
                "#,
            ),
            (
                "lesson_progress table",
                r#"
                CREATE TABLE IF NOT EXISTS lesson_progress (
                    user_id         INTEGER NOT NULL,
                    lesson_id       INTEGER NOT NULL REFERENCES lessons(id) ON DELETE CASCADE,
                    total_words     INTEGER NOT NULL DEFAULT 0,
                    words_learned   INTEGER NOT NULL DEFAULT 0,
                    words_to_review INTEGER NOT NULL DEFAULT 0,
                    is_started      INTEGER NOT NULL DEFAULT 0,
                    is_completed    INTEGER NOT NULL DEFAULT 0,
                    started_at      TEXT,
                    completed_at    TEXT,
                    updated_at      TEXT NOT NULL,
                    PRIMARY KEY (user_id, lesson_id)
                )
                "#,
            ),
            (
                "user_activity table",
                r#"
                CREATE TABLE IF NOT EXISTS user_activity (
                    user_id          INTEGER PRIMARY KEY,
                    current_streak   INTEGER NOT NULL DEFAULT 0,
                    longest_streak   INTEGER NOT NULL DEFAULT 0,
                    last_active_date TEXT
                )
                "#,
            ),
            (
                "cards user index",
                "CREATE INDEX IF NOT EXISTS idx_cards_user ON cards(user_id)",
            ),
            (
                "reviews card index",
                "CREATE INDEX IF NOT EXISTS idx_reviews_card ON reviews(card_id, reviewed_at)",
            ),
            (
                "words lesson index",
                "CREATE INDEX IF NOT EXISTS idx_words_lesson ON words(lesson_id, order_index)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    pub async fn create_course(
        &self,
        user: UserId,
        course: NewCourse,
    ) -> Result<Course, StoreError> {
        let created_at = Utc::now();
        let id = sqlx::query(
            "INSERT INTO courses (user_id, title, description, language, native_language, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.language)
        .bind(&course.native_language)
        .bind(timestamp(created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Insert course failed: {e}")))?
        .last_insert_rowid();

        Ok(Course {
            id,
            user_id: user,
            title: course.title,
            description: course.description,
            language: course.language,
            native_language: course.native_language,
            created_at,
        })
    }

    pub async fn create_lesson(
        &self,
        course: CourseId,
        lesson: NewLesson,
    ) -> Result<Lesson, StoreError> {
        let created_at = Utc::now();
        let id = sqlx::query(
            "INSERT INTO lessons (course_id, title, description, order_index, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(course)
        .bind(&lesson.title)
        .bind(&lesson.description)
        .bind(lesson.order_index)
        .bind(timestamp(created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Insert lesson failed: {e}")))?
        .last_insert_rowid();

        Ok(Lesson {
            id,
            course_id: course,
            title: lesson.title,
            description: lesson.description,
            order_index: lesson.order_index,
            created_at,
        })
    }

    pub async fn create_word(&self, lesson: LessonId, word: NewWord) -> Result<Word, StoreError> {
        let created_at = Utc::now();
        let id = sqlx::query(
            "INSERT INTO words (lesson_id, text, translation, pronunciation, example_sentence,
                                difficulty_level, order_index, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(lesson)
        .bind(&word.text)
        .bind(&word.translation)
        .bind(&word.pronunciation)
        .bind(&word.example_sentence)
        .bind(word.difficulty_level)
        .bind(word.order_index)
        .bind(timestamp(created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Insert word failed: {e}")))?
        .last_insert_rowid();

        Ok(Word {
            id,
            lesson_id: lesson,
            text: word.text,
            translation: word.translation,
            pronunciation: word.pronunciation,
            example_sentence: word.example_sentence,
            difficulty_level: word.difficulty_level,
            order_index: word.order_index,
            created_at,
        })
    }

    /// Delete a word; its cards and their reviews go with it.
    pub async fn delete_word(&self, word: WordId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM words WHERE id = ?")
            .bind(word)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("Delete word failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_card(row: &SqliteRow) -> Result<Card, StoreError> {
        let id: CardId = column(row, "id")?;
        let raw_state: String = column(row, "memory_state")?;
        // Unparseable payloads are left for the memory model to reject.
        let memory_state = match MemoryState::from_json_str(&raw_state) {
            Ok(state) => state,
            Err(e) => {
                warn!(card_id = id, "Stored memory state is not JSON: {e}");
                MemoryState::new(serde_json::Value::String(raw_state))
            }
        };

        Ok(Card {
            id,
            user_id: column(row, "user_id")?,
            word_id: column(row, "word_id")?,
            memory_state,
            total_reviews: column(row, "total_reviews")?,
            correct_reviews: column(row, "correct_reviews")?,
            last_reviewed_at: optional_time(row, "last_reviewed_at")?,
            created_at: time(row, "created_at")?,
            updated_at: time(row, "updated_at")?,
        })
    }

    fn row_to_review(row: &SqliteRow) -> Result<Review, StoreError> {
        let rating: i64 = column(row, "rating")?;
        let rating = Rating::try_from(rating)
            .map_err(|e| StoreError::QueryFailed(format!("rating column: {e}")))?;

        Ok(Review {
            id: column(row, "id")?,
            card_id: column(row, "card_id")?,
            rating,
            reviewed_at: time(row, "reviewed_at")?,
            response_latency_secs: column(row, "response_latency_secs")?,
            lesson_id: column(row, "lesson_id")?,
            scheduled_days: column(row, "scheduled_days")?,
            elapsed_days: column(row, "elapsed_days")?,
            lapses: column(row, "lapses")?,
        })
    }

    fn row_to_progress(row: &SqliteRow) -> Result<LessonProgress, StoreError> {
        Ok(LessonProgress {
            user_id: column(row, "user_id")?,
            lesson_id: column(row, "lesson_id")?,
            total_words: column(row, "total_words")?,
            words_learned: column(row, "words_learned")?,
            words_to_review: column(row, "words_to_review")?,
            is_started: column(row, "is_started")?,
            is_completed: column(row, "is_completed")?,
            started_at: optional_time(row, "started_at")?,
            completed_at: optional_time(row, "completed_at")?,
            updated_at: time(row, "updated_at")?,
        })
    }

    fn row_to_word(row: &SqliteRow) -> Result<Word, StoreError> {
        Ok(Word {
            id: column(row, "id")?,
            lesson_id: column(row, "lesson_id")?,
            text: column(row, "text")?,
            translation: column(row, "translation")?,
            pronunciation: column(row, "pronunciation")?,
            example_sentence: column(row, "example_sentence")?,
            difficulty_level: column(row, "difficulty_level")?,
            order_index: column(row, "order_index")?,
            created_at: time(row, "created_at")?,
        })
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(name: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn time(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw: String = column(row, name)?;
    parse_timestamp(name, &raw)
}

fn optional_time(row: &SqliteRow, name: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
    let raw: Option<String> = column(row, name)?;
    raw.map(|raw| parse_timestamp(name, &raw)).transpose()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl CardStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_card(&self, user: UserId, word: WordId) -> Result<Option<Card>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE user_id = ? AND word_id = ?"
        ))
        .bind(user)
        .bind(word)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Get card failed: {e}")))?;

        row.as_ref().map(Self::row_to_card).transpose()
    }

    async fn get_card_by_id(&self, id: CardId) -> Result<Option<Card>, StoreError> {
        let row = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Get card failed: {e}")))?;

        row.as_ref().map(Self::row_to_card).transpose()
    }

    async fn insert_card(&self, card: NewCard) -> Result<Card, StoreError> {
        let created_at = timestamp(card.created_at);
        let result = sqlx::query(
            "INSERT INTO cards (user_id, word_id, memory_state, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(card.user_id)
        .bind(card.word_id)
        .bind(card.memory_state.to_json_string())
        .bind(&created_at)
        .bind(&created_at)
        .execute(&self.pool)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::Conflict(format!(
                    "card for user {} word {} already exists",
                    card.user_id, card.word_id
                )));
            }
            Err(e) => return Err(StoreError::Storage(format!("Insert card failed: {e}"))),
        };

        debug!(
            card_id = id,
            user_id = card.user_id,
            word_id = card.word_id,
            "Card created"
        );
        Ok(Card {
            id,
            user_id: card.user_id,
            word_id: card.word_id,
            memory_state: card.memory_state,
            total_reviews: 0,
            correct_reviews: 0,
            last_reviewed_at: None,
            created_at: card.created_at,
            updated_at: card.created_at,
        })
    }

    async fn cards_for_user(&self, user: UserId) -> Result<Vec<Card>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE user_id = ? ORDER BY id"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("List cards failed: {e}")))?;

        rows.iter().map(Self::row_to_card).collect()
    }

    async fn cards_for_words(
        &self,
        user: UserId,
        words: &[WordId],
    ) -> Result<Vec<Card>, StoreError> {
        let mut cards = Vec::with_capacity(words.len());
        for chunk in words.chunks(IN_LIST_CHUNK) {
            let mut query = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {CARD_COLUMNS} FROM cards WHERE user_id = "
            ));
            query.push_bind(user).push(" AND word_id IN (");
            let mut ids = query.separated(", ");
            for word in chunk {
                ids.push_bind(*word);
            }
            ids.push_unseparated(")");

            let rows = query
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::QueryFailed(format!("Batch card lookup failed: {e}")))?;
            for row in &rows {
                cards.push(Self::row_to_card(row)?);
            }
        }
        cards.sort_by_key(|c| c.id);
        Ok(cards)
    }

    async fn commit_review(
        &self,
        update: CardUpdate,
        review: NewReview,
    ) -> Result<(Card, Review), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("Begin transaction failed: {e}")))?;

        let reviewed_at = timestamp(update.last_reviewed_at);
        let updated = sqlx::query(
            "UPDATE cards
             SET memory_state = ?, total_reviews = ?, correct_reviews = ?,
                 last_reviewed_at = ?, updated_at = ?
             WHERE id = ? AND total_reviews = ?",
        )
        .bind(update.memory_state.to_json_string())
        .bind(update.total_reviews)
        .bind(update.correct_reviews)
        .bind(&reviewed_at)
        .bind(&reviewed_at)
        .bind(update.card_id)
        .bind(update.expected_total_reviews)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("Update card failed: {e}")))?
        .rows_affected();

        if updated == 0 {
            let exists = sqlx::query("SELECT 1 FROM cards WHERE id = ?")
                .bind(update.card_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| StoreError::QueryFailed(format!("Card lookup failed: {e}")))?
                .is_some();
            return Err(if exists {
                StoreError::Conflict(format!(
                    "card {} is no longer at version {}",
                    update.card_id, update.expected_total_reviews
                ))
            } else {
                StoreError::QueryFailed(format!("card {} not found", update.card_id))
            });
        }

        let review_id = sqlx::query(
            "INSERT INTO reviews (card_id, rating, reviewed_at, response_latency_secs, lesson_id,
                                  scheduled_days, elapsed_days, lapses)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(update.card_id)
        .bind(review.rating.value())
        .bind(timestamp(review.reviewed_at))
        .bind(review.response_latency_secs)
        .bind(review.lesson_id)
        .bind(review.scheduled_days)
        .bind(review.elapsed_days)
        .bind(review.lapses)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("Insert review failed: {e}")))?
        .last_insert_rowid();

        let row = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?"))
            .bind(update.card_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Card reload failed: {e}")))?;
        let card = Self::row_to_card(&row)?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("Commit failed: {e}")))?;

        Ok((card, Review::from_new(review_id, update.card_id, review)))
    }

    async fn reviews_for_card(&self, card: CardId) -> Result<Vec<Review>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE card_id = ? ORDER BY id"
        ))
        .bind(card)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("List reviews failed: {e}")))?;

        rows.iter().map(Self::row_to_review).collect()
    }

    async fn replace_memory_state(
        &self,
        card: CardId,
        expected_total_reviews: i64,
        state: &MemoryState,
    ) -> Result<Card, StoreError> {
        let updated = sqlx::query(
            "UPDATE cards SET memory_state = ?, updated_at = ?
             WHERE id = ? AND total_reviews = ?",
        )
        .bind(state.to_json_string())
        .bind(timestamp(Utc::now()))
        .bind(card)
        .bind(expected_total_reviews)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Update card failed: {e}")))?
        .rows_affected();
        if updated == 0 {
            return Err(match self.get_card_by_id(card).await? {
                Some(_) => StoreError::Conflict(format!(
                    "card {card} is no longer at version {expected_total_reviews}"
                )),
                None => StoreError::QueryFailed(format!("card {card} not found")),
            });
        }

        self.get_card_by_id(card)
            .await?
            .ok_or_else(|| StoreError::QueryFailed(format!("card {card} not found")))
    }
}

#[async_trait]
impl ProgressStore for SqliteStore {
    async fn get_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<LessonProgress>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM lesson_progress WHERE user_id = ? AND lesson_id = ?"
        ))
        .bind(user)
        .bind(lesson)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Get progress failed: {e}")))?;

        row.as_ref().map(Self::row_to_progress).transpose()
    }

    async fn upsert_progress(
        &self,
        progress: &LessonProgress,
    ) -> Result<LessonProgress, StoreError> {
        // Completion and the first start time survive any later write.
        sqlx::query(
            r#"
            INSERT INTO lesson_progress (user_id, lesson_id, total_words, words_learned,
                words_to_review, is_started, is_completed, started_at, completed_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                total_words = excluded.total_words,
                words_learned = excluded.words_learned,
                words_to_review = excluded.words_to_review,
                is_started = MAX(lesson_progress.is_started, excluded.is_started),
                started_at = COALESCE(lesson_progress.started_at, excluded.started_at),
                completed_at = CASE
                    WHEN lesson_progress.is_completed
                        THEN COALESCE(lesson_progress.completed_at, excluded.completed_at)
                    ELSE excluded.completed_at
                END,
                is_completed = MAX(lesson_progress.is_completed, excluded.is_completed),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(progress.user_id)
        .bind(progress.lesson_id)
        .bind(progress.total_words)
        .bind(progress.words_learned)
        .bind(progress.words_to_review)
        .bind(progress.is_started)
        .bind(progress.is_completed)
        .bind(progress.started_at.map(timestamp))
        .bind(progress.completed_at.map(timestamp))
        .bind(timestamp(progress.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Upsert progress failed: {e}")))?;

        self.get_progress(progress.user_id, progress.lesson_id)
            .await?
            .ok_or_else(|| {
                StoreError::QueryFailed(format!(
                    "progress for user {} lesson {} vanished after upsert",
                    progress.user_id, progress.lesson_id
                ))
            })
    }

    async fn progress_for_user(&self, user: UserId) -> Result<Vec<LessonProgress>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM lesson_progress WHERE user_id = ? ORDER BY lesson_id"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("List progress failed: {e}")))?;

        rows.iter().map(Self::row_to_progress).collect()
    }
}

#[async_trait]
impl Curriculum for SqliteStore {
    async fn lesson(&self, user: UserId, lesson: LessonId) -> Result<Option<Lesson>, StoreError> {
        let row = sqlx::query(
            "SELECT l.id, l.course_id, l.title, l.description, l.order_index, l.created_at
             FROM lessons l JOIN courses c ON c.id = l.course_id
             WHERE l.id = ? AND c.user_id = ?",
        )
        .bind(lesson)
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Get lesson failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Lesson {
            id: column(&row, "id")?,
            course_id: column(&row, "course_id")?,
            title: column(&row, "title")?,
            description: column(&row, "description")?,
            order_index: column(&row, "order_index")?,
            created_at: time(&row, "created_at")?,
        }))
    }

    async fn lesson_words(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<Vec<Word>>, StoreError> {
        if self.lesson(user, lesson).await?.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query(&format!(
            "SELECT {WORD_COLUMNS} FROM words w WHERE w.lesson_id = ? ORDER BY w.order_index, w.id"
        ))
        .bind(lesson)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("List words failed: {e}")))?;

        let mut words = rows
            .iter()
            .map(Self::row_to_word)
            .collect::<Result<Vec<_>, _>>()?;
        canonical_order(&mut words);
        Ok(Some(words))
    }

    async fn word(&self, user: UserId, word: WordId) -> Result<Option<Word>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {WORD_COLUMNS}
             FROM words w
             JOIN lessons l ON l.id = w.lesson_id
             JOIN courses c ON c.id = l.course_id
             WHERE w.id = ? AND c.user_id = ?"
        ))
        .bind(word)
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Get word failed: {e}")))?;

        row.as_ref().map(Self::row_to_word).transpose()
    }
}

#[async_trait]
impl ActivityStore for SqliteStore {
    async fn get_activity(&self, user: UserId) -> Result<Option<UserActivity>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, current_streak, longest_streak, last_active_date
             FROM user_activity WHERE user_id = ?",
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Get activity failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let last_active: Option<String> = column(&row, "last_active_date")?;
        let last_active_date = last_active
            .map(|raw| {
                NaiveDate::from_str(&raw)
                    .map_err(|e| StoreError::QueryFailed(format!("last_active_date column: {e}")))
            })
            .transpose()?;

        Ok(Some(UserActivity {
            user_id: column(&row, "user_id")?,
            current_streak: column(&row, "current_streak")?,
            longest_streak: column(&row, "longest_streak")?,
            last_active_date,
        }))
    }

    async fn put_activity(&self, activity: &UserActivity) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_activity (user_id, current_streak, longest_streak, last_active_date)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                current_streak = excluded.current_streak,
                longest_streak = excluded.longest_streak,
                last_active_date = excluded.last_active_date
            "#,
        )
        .bind(activity.user_id)
        .bind(activity.current_streak)
        .bind(activity.longest_streak)
        .bind(activity.last_active_date.map(|d| d.to_string()))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Put activity failed: {e}")))?;
        Ok(())
    }
}
