//! SQLite Book Store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

use super::DbPool;
use crate::application::ports::{
    BookRecord, BookStorePort, BookTree, ChapterTree, NewBook, NewChapter, NewParagraph,
    ParagraphRecord, ParagraphUpdate, RepositoryError,
};
use crate::domain::book::ParagraphStatus;

/// SQLite Book Store
pub struct SqliteBookStore {
    pool: DbPool,
}

impl SqliteBookStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct BookRow {
    id: String,
    space_id: String,
    title: String,
    abstract_text: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<BookRow> for BookRecord {
    type Error = RepositoryError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        Ok(BookRecord {
            id: parse_uuid(&row.id)?,
            space_id: parse_uuid(&row.space_id)?,
            title: row.title,
            abstract_text: row.abstract_text,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct ChapterRow {
    id: String,
    chapter_index: i64,
    title: String,
    idea: String,
}

#[derive(FromRow)]
struct ParagraphRow {
    id: String,
    chapter_id: String,
    paragraph_index: i64,
    text: String,
    status: String,
}

impl TryFrom<ParagraphRow> for ParagraphRecord {
    type Error = RepositoryError;

    fn try_from(row: ParagraphRow) -> Result<Self, Self::Error> {
        Ok(ParagraphRecord {
            id: parse_uuid(&row.id)?,
            index: row.paragraph_index as usize,
            text: row.text,
            status: ParagraphStatus::from_str(&row.status).unwrap_or_default(),
        })
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(raw).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

#[async_trait]
impl BookStorePort for SqliteBookStore {
    async fn create_book(&self, space_id: Uuid, book: &NewBook) -> Result<Uuid, RepositoryError> {
        let book_id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO books (id, space_id, title, abstract, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(book_id.to_string())
        .bind(space_id.to_string())
        .bind(&book.title)
        .bind(&book.abstract_text)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(book_id)
    }

    async fn add_chapter(
        &self,
        space_id: Uuid,
        book_id: Uuid,
        chapter: &NewChapter,
    ) -> Result<Uuid, RepositoryError> {
        self.require_book(space_id, book_id).await?;

        let chapter_id = Uuid::new_v4();

        // 追加式分配 index，顺序一经确定不再变化
        sqlx::query(
            r#"
            INSERT INTO chapters (id, book_id, chapter_index, title, idea, created_at)
            SELECT ?, ?, COALESCE(MAX(chapter_index) + 1, 0), ?, ?, ?
            FROM chapters WHERE book_id = ?
            "#,
        )
        .bind(chapter_id.to_string())
        .bind(book_id.to_string())
        .bind(&chapter.title)
        .bind(&chapter.idea)
        .bind(Utc::now().to_rfc3339())
        .bind(book_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(chapter_id)
    }

    async fn add_paragraph(
        &self,
        space_id: Uuid,
        book_id: Uuid,
        chapter_id: Uuid,
        paragraph: &NewParagraph,
    ) -> Result<Uuid, RepositoryError> {
        self.require_book(space_id, book_id).await?;

        let paragraph_id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO paragraphs
                (id, book_id, chapter_id, paragraph_index, text, status, created_at, updated_at)
            SELECT ?, ?, ?, COALESCE(MAX(paragraph_index) + 1, 0), ?, ?, ?, ?
            FROM paragraphs WHERE chapter_id = ?
            "#,
        )
        .bind(paragraph_id.to_string())
        .bind(book_id.to_string())
        .bind(chapter_id.to_string())
        .bind(&paragraph.text)
        .bind(paragraph.status.as_str())
        .bind(&now)
        .bind(&now)
        .bind(chapter_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(paragraph_id)
    }

    async fn update_paragraph(
        &self,
        space_id: Uuid,
        book_id: Uuid,
        chapter_id: Uuid,
        paragraph_id: Uuid,
        update: &ParagraphUpdate,
    ) -> Result<(), RepositoryError> {
        self.require_book(space_id, book_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE paragraphs
            SET text = ?, status = ?, updated_at = ?
            WHERE id = ? AND chapter_id = ? AND book_id = ?
            "#,
        )
        .bind(&update.text)
        .bind(update.status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(paragraph_id.to_string())
        .bind(chapter_id.to_string())
        .bind(book_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "paragraph {}",
                paragraph_id
            )));
        }

        Ok(())
    }

    async fn get_book(
        &self,
        space_id: Uuid,
        book_id: Uuid,
    ) -> Result<Option<BookTree>, RepositoryError> {
        let row: Option<BookRow> = sqlx::query_as(
            "SELECT id, space_id, title, abstract AS abstract_text, created_at, updated_at FROM books WHERE id = ? AND space_id = ?",
        )
        .bind(book_id.to_string())
        .bind(space_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let record = BookRecord::try_from(row)?;

        let chapter_rows: Vec<ChapterRow> = sqlx::query_as(
            "SELECT id, chapter_index, title, idea FROM chapters WHERE book_id = ? ORDER BY chapter_index",
        )
        .bind(book_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        let paragraph_rows: Vec<ParagraphRow> = sqlx::query_as(
            "SELECT id, chapter_id, paragraph_index, text, status FROM paragraphs WHERE book_id = ? ORDER BY paragraph_index",
        )
        .bind(book_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        // 按章节分组，组内保持 paragraph_index 升序
        let mut paragraphs_by_chapter: HashMap<String, Vec<ParagraphRow>> = HashMap::new();
        for row in paragraph_rows {
            paragraphs_by_chapter
                .entry(row.chapter_id.clone())
                .or_default()
                .push(row);
        }

        let mut chapters = Vec::with_capacity(chapter_rows.len());
        for chapter_row in chapter_rows {
            let chapter_id = parse_uuid(&chapter_row.id)?;
            let paragraphs = paragraphs_by_chapter
                .remove(&chapter_row.id)
                .unwrap_or_default()
                .into_iter()
                .map(ParagraphRecord::try_from)
                .collect::<Result<Vec<_>, RepositoryError>>()?;

            chapters.push(ChapterTree {
                id: chapter_id,
                index: chapter_row.chapter_index as usize,
                title: chapter_row.title,
                idea: chapter_row.idea,
                paragraphs,
            });
        }

        Ok(Some(BookTree {
            id: record.id,
            space_id: record.space_id,
            title: record.title,
            abstract_text: record.abstract_text,
            chapters,
        }))
    }

    async fn list_books(&self, space_id: Uuid) -> Result<Vec<BookRecord>, RepositoryError> {
        let rows: Vec<BookRow> = sqlx::query_as(
            "SELECT id, space_id, title, abstract AS abstract_text, created_at, updated_at FROM books WHERE space_id = ? ORDER BY created_at DESC",
        )
        .bind(space_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(BookRecord::try_from).collect()
    }

    async fn delete_paragraph(
        &self,
        space_id: Uuid,
        book_id: Uuid,
        chapter_id: Uuid,
        paragraph_id: Uuid,
    ) -> Result<(), RepositoryError> {
        self.require_book(space_id, book_id).await?;

        sqlx::query("DELETE FROM paragraphs WHERE id = ? AND chapter_id = ? AND book_id = ?")
            .bind(paragraph_id.to_string())
            .bind(chapter_id.to_string())
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn delete_book(&self, space_id: Uuid, book_id: Uuid) -> Result<(), RepositoryError> {
        self.require_book(space_id, book_id).await?;

        // 使用事务确保原子性
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM paragraphs WHERE book_id = ?")
            .bind(book_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM chapters WHERE book_id = ?")
            .bind(book_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(book_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}

impl SqliteBookStore {
    /// 校验书籍存在且属于该空间
    async fn require_book(&self, space_id: Uuid, book_id: Uuid) -> Result<(), RepositoryError> {
        let exists: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM books WHERE id = ? AND space_id = ?")
                .bind(book_id.to_string())
                .bind(space_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if exists.is_none() {
            return Err(RepositoryError::NotFound(format!("book {}", book_id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};

    async fn store() -> SqliteBookStore {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteBookStore::new(pool)
    }

    fn new_book(title: &str) -> NewBook {
        NewBook {
            title: title.to_string(),
            abstract_text: r#"{"title":"t","informative_text":"i","instructions":"p"}"#
                .to_string(),
        }
    }

    #[tokio::test]
    async fn test_tree_round_trip_preserves_order() {
        let store = store().await;
        let space_id = Uuid::new_v4();

        let book_id = store.create_book(space_id, &new_book("book_t")).await.unwrap();

        let mut chapter_ids = Vec::new();
        for i in 0..3 {
            let chapter_id = store
                .add_chapter(
                    space_id,
                    book_id,
                    &NewChapter {
                        title: format!("chapter {}", i),
                        idea: format!("idea {}", i),
                    },
                )
                .await
                .unwrap();
            chapter_ids.push(chapter_id);

            for j in 0..2 {
                store
                    .add_paragraph(
                        space_id,
                        book_id,
                        chapter_id,
                        &NewParagraph {
                            text: format!("seed {}-{}", i, j),
                            status: ParagraphStatus::Seed,
                        },
                    )
                    .await
                    .unwrap();
            }
        }

        let tree = store.get_book(space_id, book_id).await.unwrap().unwrap();
        assert_eq!(tree.chapters.len(), 3);
        for (i, chapter) in tree.chapters.iter().enumerate() {
            assert_eq!(chapter.index, i);
            assert_eq!(chapter.id, chapter_ids[i]);
            assert_eq!(chapter.paragraphs.len(), 2);
            for (j, paragraph) in chapter.paragraphs.iter().enumerate() {
                assert_eq!(paragraph.index, j);
                assert_eq!(paragraph.text, format!("seed {}-{}", i, j));
                assert_eq!(paragraph.status, ParagraphStatus::Seed);
            }
        }
    }

    #[tokio::test]
    async fn test_update_paragraph_in_place() {
        let store = store().await;
        let space_id = Uuid::new_v4();

        let book_id = store.create_book(space_id, &new_book("book_t")).await.unwrap();
        let chapter_id = store
            .add_chapter(
                space_id,
                book_id,
                &NewChapter {
                    title: "c".to_string(),
                    idea: "i".to_string(),
                },
            )
            .await
            .unwrap();
        let paragraph_id = store
            .add_paragraph(
                space_id,
                book_id,
                chapter_id,
                &NewParagraph {
                    text: "seed".to_string(),
                    status: ParagraphStatus::Seed,
                },
            )
            .await
            .unwrap();

        store
            .update_paragraph(
                space_id,
                book_id,
                chapter_id,
                paragraph_id,
                &ParagraphUpdate {
                    text: "generated text".to_string(),
                    status: ParagraphStatus::Generated,
                },
            )
            .await
            .unwrap();

        let tree = store.get_book(space_id, book_id).await.unwrap().unwrap();
        let paragraph = &tree.chapters[0].paragraphs[0];
        assert_eq!(paragraph.id, paragraph_id);
        assert_eq!(paragraph.text, "generated text");
        assert_eq!(paragraph.status, ParagraphStatus::Generated);
    }

    #[tokio::test]
    async fn test_delete_paragraph_for_rollback() {
        let store = store().await;
        let space_id = Uuid::new_v4();

        let book_id = store.create_book(space_id, &new_book("book_t")).await.unwrap();
        let chapter_id = store
            .add_chapter(
                space_id,
                book_id,
                &NewChapter {
                    title: "c".to_string(),
                    idea: "i".to_string(),
                },
            )
            .await
            .unwrap();
        let paragraph_id = store
            .add_paragraph(
                space_id,
                book_id,
                chapter_id,
                &NewParagraph {
                    text: "seed".to_string(),
                    status: ParagraphStatus::Seed,
                },
            )
            .await
            .unwrap();

        store
            .delete_paragraph(space_id, book_id, chapter_id, paragraph_id)
            .await
            .unwrap();

        let tree = store.get_book(space_id, book_id).await.unwrap().unwrap();
        assert!(tree.chapters[0].paragraphs.is_empty());
    }

    #[tokio::test]
    async fn test_space_isolation() {
        let store = store().await;
        let space_a = Uuid::new_v4();
        let space_b = Uuid::new_v4();

        let book_id = store.create_book(space_a, &new_book("book_t")).await.unwrap();

        // 其他空间不可见
        assert!(store.get_book(space_b, book_id).await.unwrap().is_none());
        assert!(store.list_books(space_b).await.unwrap().is_empty());
        assert_eq!(store.list_books(space_a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_book_cascades() {
        let store = store().await;
        let space_id = Uuid::new_v4();

        let book_id = store.create_book(space_id, &new_book("book_t")).await.unwrap();
        let chapter_id = store
            .add_chapter(
                space_id,
                book_id,
                &NewChapter {
                    title: "c".to_string(),
                    idea: "i".to_string(),
                },
            )
            .await
            .unwrap();
        store
            .add_paragraph(
                space_id,
                book_id,
                chapter_id,
                &NewParagraph {
                    text: "seed".to_string(),
                    status: ParagraphStatus::Seed,
                },
            )
            .await
            .unwrap();

        store.delete_book(space_id, book_id).await.unwrap();
        assert!(store.get_book(space_id, book_id).await.unwrap().is_none());
    }
}
