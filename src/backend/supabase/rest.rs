//! PostgREST access to the bookmarks table.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};

use super::{error_parts, SupabaseClient};
use crate::backend::BookmarkStore;
use crate::types::bookmark::{Bookmark, BookmarkId, NewBookmark};
use crate::types::errors::BookmarkError;
use crate::types::session::Session;

/// [`BookmarkStore`] over PostgREST. Row visibility is enforced server-side.
pub struct SupabaseStore {
    client: SupabaseClient,
    table: String,
}

impl SupabaseStore {
    pub fn new(client: SupabaseClient, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
        }
    }

    fn table_url(&self) -> String {
        self.client.endpoint(&format!("/rest/v1/{}", self.table))
    }

    fn request(&self, method: Method, session: &Session) -> RequestBuilder {
        self.client
            .authed(method, &self.table_url(), &session.access_token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BookmarkError> {
        let response = request
            .send()
            .await
            .map_err(|e| BookmarkError::Network(e.to_string()))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let (status, message) = error_parts(response).await;
            Err(BookmarkError::Backend { status, message })
        }
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl BookmarkStore for SupabaseStore {
    async fn select_all(&self, session: &Session) -> Result<Vec<Bookmark>, BookmarkError> {
        let request = self
            .request(Method::GET, session)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let response = self.send(request).await?;
        let rows: Vec<Bookmark> = response
            .json()
            .await
            .map_err(|e| BookmarkError::Decode(e.to_string()))?;
        tracing::debug!(count = rows.len(), "fetched bookmarks");
        Ok(rows)
    }

    async fn insert(&self, session: &Session, row: &NewBookmark) -> Result<(), BookmarkError> {
        let request = self
            .request(Method::POST, session)
            .header("Prefer", "return=minimal")
            .json(row);
        self.send(request).await?;
        tracing::debug!(title = %row.title, "inserted bookmark");
        Ok(())
    }

    async fn replace(
        &self,
        session: &Session,
        id: &BookmarkId,
        row: &NewBookmark,
    ) -> Result<(), BookmarkError> {
        let request = self
            .request(Method::PATCH, session)
            .query(&[("id", eq(id.as_str()))])
            .header("Prefer", "return=representation")
            .json(row);
        let response = self.send(request).await?;
        let updated: Vec<Bookmark> = response
            .json()
            .await
            .map_err(|e| BookmarkError::Decode(e.to_string()))?;
        // PostgREST answers 200 with an empty array when no row matched.
        if updated.is_empty() {
            return Err(BookmarkError::NotFound(id.to_string()));
        }
        tracing::debug!(%id, "updated bookmark");
        Ok(())
    }

    async fn delete_by_id(&self, session: &Session, id: &BookmarkId) -> Result<(), BookmarkError> {
        let request = self
            .request(Method::DELETE, session)
            .query(&[("id", eq(id.as_str()))]);
        self.send(request).await?;
        tracing::debug!(%id, "deleted bookmark");
        Ok(())
    }

    async fn delete_by_owner(&self, session: &Session, owner: &str) -> Result<(), BookmarkError> {
        let request = self
            .request(Method::DELETE, session)
            .query(&[("user_id", eq(owner))]);
        self.send(request).await?;
        tracing::debug!(owner, "deleted all bookmarks for owner");
        Ok(())
    }
}
