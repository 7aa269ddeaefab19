use crate::entities::{ImagePatch, ImageQuery, ImageRecord, NewImage, SqliteStore};

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::future::Future;

pub(crate) const IMAGE_COLUMNS: &str = "i.id, i.title, i.description, i.url, i.thumb_url, \
    i.width, i.height, i.category_id, i.user_id, i.likes, i.views, i.downloads, i.is_ai, \
    i.created_at";

pub trait ImageStore: Send + Sync + 'static {
    fn create_image(
        &self,
        image: NewImage,
    ) -> impl Future<Output = Result<ImageRecord, sqlx::Error>> + Send;

    fn get_image(&self, id: i64)
    -> impl Future<Output = Result<Option<ImageRecord>, sqlx::Error>> + Send;

    /// One page of images plus the total number of matches.
    fn list_images(
        &self,
        query: ImageQuery,
    ) -> impl Future<Output = Result<(Vec<ImageRecord>, i64), sqlx::Error>> + Send;

    fn update_image(
        &self,
        id: i64,
        patch: ImagePatch,
    ) -> impl Future<Output = Result<Option<ImageRecord>, sqlx::Error>> + Send;

    fn delete_image(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Bump the view counter and return the updated row.
    fn record_image_view(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<ImageRecord>, sqlx::Error>> + Send;

    /// Bump the download counter and return the updated row.
    fn record_image_download(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<ImageRecord>, sqlx::Error>> + Send;
}

impl ImageStore for SqliteStore {
    async fn create_image(&self, image: NewImage) -> Result<ImageRecord, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO images (title, description, url, thumb_url, width, height, \
             category_id, user_id, is_ai, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&image.title)
        .bind(&image.description)
        .bind(&image.url)
        .bind(&image.thumb_url)
        .bind(image.width)
        .bind(image.height)
        .bind(image.category_id)
        .bind(image.user_id)
        .bind(image.is_ai)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        link_tags(&mut tx, id, &image.tags).await?;
        let record = load_image(&mut tx, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;
        Ok(record)
    }

    async fn get_image(&self, id: i64) -> Result<Option<ImageRecord>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        load_image(&mut conn, id).await
    }

    async fn list_images(&self, query: ImageQuery) -> Result<(Vec<ImageRecord>, i64), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM images i");
        push_filters(&mut count, &query);
        let (total,): (i64,) = count.build_query_as().fetch_one(&mut *conn).await?;

        let page = query.page.max(1);
        // Pages past the end come back empty rather than overflowing.
        let offset = (page - 1).saturating_mul(query.page_size);
        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {IMAGE_COLUMNS} FROM images i"));
        push_filters(&mut select, &query);
        select
            .push(" ORDER BY ")
            .push(query.sort.order_by())
            .push(" LIMIT ")
            .push_bind(query.page_size)
            .push(" OFFSET ")
            .push_bind(offset);
        let mut images: Vec<ImageRecord> = select.build_query_as().fetch_all(&mut *conn).await?;

        attach_tags(&mut conn, &mut images).await?;
        Ok((images, total))
    }

    async fn update_image(
        &self,
        id: i64,
        patch: ImagePatch,
    ) -> Result<Option<ImageRecord>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE images SET title = COALESCE(?1, title), \
             description = COALESCE(?2, description), \
             url = COALESCE(?3, url), \
             thumb_url = COALESCE(?4, thumb_url), \
             category_id = COALESCE(?5, category_id) \
             WHERE id = ?6",
        )
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(&patch.url)
        .bind(&patch.thumb_url)
        .bind(patch.category_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(tags) = &patch.tags {
            sqlx::query("DELETE FROM image_tags WHERE image_id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            link_tags(&mut tx, id, tags).await?;
        }

        let record = load_image(&mut tx, id).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn delete_image(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_image_view(&self, id: i64) -> Result<Option<ImageRecord>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("UPDATE images SET views = views + 1 WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        load_image(&mut conn, id).await
    }

    async fn record_image_download(&self, id: i64) -> Result<Option<ImageRecord>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("UPDATE images SET downloads = downloads + 1 WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        load_image(&mut conn, id).await
    }
}

// ── shared helpers ────────────────────────────────────────────────────────────

/// Load one image (with tags) on an existing connection or transaction.
pub(crate) async fn load_image(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<ImageRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, ImageRecord>(&format!(
        "SELECT {IMAGE_COLUMNS} FROM images i WHERE i.id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(image) => {
            let mut images = vec![image];
            attach_tags(conn, &mut images).await?;
            Ok(images.pop())
        }
        None => Ok(None),
    }
}

/// Fill `tags` for each image with one query.
pub(crate) async fn attach_tags(
    conn: &mut SqliteConnection,
    images: &mut [ImageRecord],
) -> Result<(), sqlx::Error> {
    if images.is_empty() {
        return Ok(());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT it.image_id, t.name FROM image_tags it \
         JOIN tags t ON t.id = it.tag_id WHERE it.image_id IN (",
    );
    {
        let mut ids = qb.separated(", ");
        for image in images.iter() {
            ids.push_bind(image.id);
        }
    }
    qb.push(") ORDER BY t.name");

    let rows: Vec<(i64, String)> = qb.build_query_as().fetch_all(&mut *conn).await?;
    for image in images.iter_mut() {
        image.tags = rows
            .iter()
            .filter(|(image_id, _)| *image_id == image.id)
            .map(|(_, name)| name.clone())
            .collect();
    }
    Ok(())
}

/// Link `names` to `image_id`, creating tags that do not exist yet.
async fn link_tags(
    conn: &mut SqliteConnection,
    image_id: i64,
    names: &[String],
) -> Result<(), sqlx::Error> {
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        sqlx::query("INSERT INTO tags (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;
        let (tag_id,): (i64,) = sqlx::query_as("SELECT id FROM tags WHERE name = ?1")
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO image_tags (image_id, tag_id) VALUES (?1, ?2)")
            .bind(image_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &ImageQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(category_id) = query.category_id {
        qb.push(" AND i.category_id = ").push_bind(category_id);
    }
    if let Some(tag) = query.tag.as_deref().filter(|t| !t.is_empty()) {
        qb.push(
            " AND EXISTS (SELECT 1 FROM image_tags it JOIN tags t ON t.id = it.tag_id \
             WHERE it.image_id = i.id AND t.name = ",
        )
        .push_bind(tag.to_owned())
        .push(")");
    }
    if let Some(keyword) = query.keyword.as_deref().filter(|k| !k.is_empty()) {
        let pattern = format!("%{}%", escape_like(keyword));
        qb.push(" AND (i.title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR i.description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// Make `%`, `_` and `\` match literally under `ESCAPE '\'`.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::ImageSort;

    fn new_image(title: &str, tags: &[&str]) -> NewImage {
        NewImage {
            title: title.into(),
            url: format!("/uploads/{title}.png"),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_links_tags_once() {
        let store = SqliteStore::in_memory().await.unwrap();
        let image = store
            .create_image(new_image("aurora", &["night", "sky", "night", " "]))
            .await
            .unwrap();
        assert_eq!(image.tags, vec!["night".to_string(), "sky".to_string()]);
        assert_eq!(image.likes, 0);
    }

    #[tokio::test]
    async fn list_filters_by_tag_and_keyword() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.create_image(new_image("aurora", &["sky"])).await.unwrap();
        store.create_image(new_image("forest", &["green"])).await.unwrap();
        store.create_image(new_image("aurora-2", &["sky"])).await.unwrap();

        let (items, total) = store
            .list_images(ImageQuery {
                tag: Some("sky".into()),
                page: 1,
                page_size: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "aurora-2");

        let (items, total) = store
            .list_images(ImageQuery {
                keyword: Some("fore".into()),
                sort: ImageSort::Popular,
                page: 1,
                page_size: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].tags, vec!["green".to_string()]);
    }

    #[tokio::test]
    async fn patch_replaces_tags_and_keeps_other_columns() {
        let store = SqliteStore::in_memory().await.unwrap();
        let image = store.create_image(new_image("dune", &["sand"])).await.unwrap();

        let patched = store
            .update_image(
                image.id,
                ImagePatch {
                    title: Some("dunes".into()),
                    tags: Some(vec!["desert".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(patched.title, "dunes");
        assert_eq!(patched.url, image.url);
        assert_eq!(patched.tags, vec!["desert".to_string()]);

        assert!(store.update_image(9999, ImagePatch::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn counters_increment() {
        let store = SqliteStore::in_memory().await.unwrap();
        let image = store.create_image(new_image("peak", &[])).await.unwrap();
        store.record_image_view(image.id).await.unwrap();
        let image = store.record_image_download(image.id).await.unwrap().unwrap();
        assert_eq!((image.views, image.downloads), (1, 1));
        assert!(store.record_image_view(424242).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn far_pages_are_empty_instead_of_overflowing() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.create_image(new_image("aurora", &[])).await.unwrap();

        let (items, total) = store
            .list_images(ImageQuery {
                page: i64::MAX,
                page_size: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn keyword_wildcards_match_literally() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.create_image(new_image("100% sky", &[])).await.unwrap();
        store.create_image(new_image("1000 skies", &[])).await.unwrap();
        store.create_image(new_image("snake_case", &[])).await.unwrap();
        store.create_image(new_image("snakescase", &[])).await.unwrap();

        for (keyword, expected) in [("0%", "100% sky"), ("e_c", "snake_case")] {
            let (items, total) = store
                .list_images(ImageQuery {
                    keyword: Some(keyword.into()),
                    page: 1,
                    page_size: 10,
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(total, 1, "keyword {keyword}");
            assert_eq!(items[0].title, expected);
        }
    }
}
