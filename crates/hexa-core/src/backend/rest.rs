//! Table reads and upserts.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{BackendClient, BackendError, BackendResult};

impl BackendClient {
    /// Bearer for data requests: the session token when signed in.
    pub(super) async fn data_bearer(&self) -> BackendResult<String> {
        Ok(match self.get_session().await? {
            Some(session) => session.access_token,
            None => self.inner.anon_key.clone(),
        })
    }

    /// Selects at most one row matching all `column = value` filters.
    pub async fn select_single<T: DeserializeOwned>(
        &self,
        table: &str,
        columns: &str,
        filters: &[(&str, &str)],
    ) -> BackendResult<Option<T>> {
        let mut url = self.endpoint(&["rest", "v1", table])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", columns);
            for (column, value) in filters {
                query.append_pair(column, &format!("eq.{value}"));
            }
        }

        let bearer = self.data_bearer().await?;
        let builder = self.inner.http.get(url);
        let response = self.send(self.authorize(builder, &bearer)).await?;
        let mut rows: Vec<T> = Self::read_json(response, "Failed to parse rows").await?;

        match rows.len() {
            0 | 1 => Ok(rows.pop()),
            n => Err(BackendError::parse(
                table,
                format!("expected at most one row, got {n}"),
            )),
        }
    }

    /// Inserts or merges a row, keyed by the primary key or `on_conflict`.
    pub async fn upsert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        row: &T,
        on_conflict: Option<&str>,
    ) -> BackendResult<()> {
        let mut url = self.endpoint(&["rest", "v1", table])?;
        if let Some(columns) = on_conflict {
            url.query_pairs_mut().append_pair("on_conflict", columns);
        }

        let bearer = self.data_bearer().await?;
        let builder = self
            .inner
            .http
            .post(url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row);
        self.send(self.authorize(builder, &bearer)).await?;
        tracing::debug!(table, "row upserted");
        Ok(())
    }
}
