//! Execution trait shared by all statement builders.

use crate::bind::{Destination, bind_into, bind_rows};
use crate::client::Connection;
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::value::Value;
use std::future::Future;
use std::sync::Arc;

/// A statement that renders to SQL plus arguments and can run on a connection.
///
/// The `*_on` methods run on an explicit connection (e.g. a transaction); the
/// others use the connection the statement was created with.
pub trait SqlQb: Sync {
    /// Render the SQL text and its arguments (`$N` is argument `N`).
    fn render(&self) -> (String, Vec<Value>);

    /// The connection bound through the model, if any.
    fn connection(&self) -> Option<&Arc<dyn Connection>>;

    /// Validate builder state before execution.
    fn validate(&self) -> OrmResult<()> {
        Ok(())
    }

    /// Debug helper to get the SQL string.
    fn to_sql(&self) -> String {
        self.render().0
    }

    /// Execute and return the affected row count.
    fn execute(&self) -> impl Future<Output = OrmResult<u64>> + Send {
        async move {
            let conn = self.connection().ok_or(OrmError::NoConnection)?;
            self.execute_on(conn.as_ref()).await
        }
    }

    /// Execute on `conn` and return the affected row count.
    fn execute_on(&self, conn: &dyn Connection) -> impl Future<Output = OrmResult<u64>> + Send {
        async move {
            let (sql, args) = prepare(self, conn)?;
            conn.exec(&sql, &args).await
        }
    }

    /// Run the statement and return its rows.
    fn query_rows(&self) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        async move {
            let conn = self.connection().ok_or(OrmError::NoConnection)?;
            self.query_rows_on(conn.as_ref()).await
        }
    }

    /// Run the statement on `conn` and return its rows.
    fn query_rows_on(&self, conn: &dyn Connection) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        async move {
            let (sql, args) = prepare(self, conn)?;
            conn.query(&sql, &args).await
        }
    }

    /// Run the statement and bind the rows into a new `D`.
    ///
    /// Scalar and record destinations take the first row and fail with
    /// [`OrmError::NotFound`] when there is none.
    fn fetch<D: Destination>(&self) -> impl Future<Output = OrmResult<D>> + Send {
        async move {
            let rows = self.query_rows().await?;
            bind_rows(&rows)
        }
    }

    /// Run the statement on `conn` and bind the rows into a new `D`.
    fn fetch_on<D: Destination>(&self, conn: &dyn Connection) -> impl Future<Output = OrmResult<D>> + Send {
        async move {
            let rows = self.query_rows_on(conn).await?;
            bind_rows(&rows)
        }
    }

    /// Run the statement and bind the rows into an existing destination.
    fn fetch_into<D: Destination + Send>(&self, dest: &mut D) -> impl Future<Output = OrmResult<()>> + Send {
        async move {
            let rows = self.query_rows().await?;
            bind_into(dest, &rows)
        }
    }

    /// Like [`SqlQb::execute`], panicking on error.
    fn must_execute(&self) -> impl Future<Output = u64> + Send {
        async move {
            match self.execute().await {
                Ok(affected) => affected,
                Err(err) => panic!("{err}"),
            }
        }
    }

    /// Like [`SqlQb::fetch`], panicking on error.
    fn must_fetch<D: Destination>(&self) -> impl Future<Output = D> + Send {
        async move {
            match self.fetch::<D>().await {
                Ok(dest) => dest,
                Err(err) => panic!("{err}"),
            }
        }
    }
}

fn prepare<Q: SqlQb + ?Sized>(qb: &Q, conn: &dyn Connection) -> OrmResult<(String, Vec<Value>)> {
    qb.validate()?;
    let (sql, args) = qb.render();
    let (sql, args) = conn.convert_parameters(sql, args);
    tracing::debug!(target: "pgmodel.sql", sql = %sql, args = args.len(), "executing statement");
    Ok((sql, args))
}
