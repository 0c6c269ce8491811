//! Postgres database clients.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_postgres::{Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{
        self,
        connection::{self, Params, Transaction},
        Connection,
    },
};

/// Non-transactional Postgres database client.
///
/// Every statement runs on a connection freshly taken from the
/// [`connection::Pool`].
#[derive(Clone, Debug)]
pub struct NonTx {
    /// [`connection::Pool`] to take connections from.
    pub(crate) pool: connection::Pool,
}

impl NonTx {
    /// Creates a new [`NonTx`] client on top of the provided
    /// [`connection::Pool`].
    #[must_use]
    pub(crate) fn new(pool: connection::Pool) -> Self {
        Self { pool }
    }

    /// Takes a connection from the [`connection::Pool`].
    async fn conn(
        &self,
    ) -> Result<connection::Pooled, Traced<database::Error>> {
        self.pool
            .get()
            .await
            .map_err(tracerr::from_and_wrap!(=> postgres::Error))
            .map_err(tracerr::map_from)
    }
}

impl Connection for NonTx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: Params<'_>,
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized + Sync,
    {
        self.conn()
            .await?
            .query(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: Params<'_>,
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized + Sync,
    {
        self.conn()
            .await?
            .exec(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }
}

/// Transactional Postgres database client.
///
/// The [`Transaction`] is opened lazily, on the first statement, and all the
/// clones of this client share it. It is rolled back if the last clone is
/// dropped before [`Tx::commit()`].
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`connection::Pool`] to take a connection for the [`Transaction`].
    pool: connection::Pool,

    /// [`Transaction`] opened by this client, if any.
    tx: Arc<Mutex<Option<Transaction>>>,
}

impl Tx {
    /// Creates a new [`Tx`] client on top of the provided
    /// [`connection::Pool`].
    #[must_use]
    pub fn new(pool: connection::Pool) -> Self {
        Self {
            pool,
            tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the open [`Transaction`] stored in the provided `slot`,
    /// beginning a new one if there is none.
    async fn open<'s>(
        &self,
        slot: &'s mut Option<Transaction>,
    ) -> Result<&'s Transaction, Traced<database::Error>> {
        let tx = match slot.take() {
            Some(tx) => tx,
            None => {
                let conn = self
                    .pool
                    .get()
                    .await
                    .map_err(tracerr::from_and_wrap!(=> postgres::Error))
                    .map_err(tracerr::map_from)?;
                Transaction::begin(conn).await.map_err(tracerr::wrap!())?
            }
        };
        Ok(&*slot.insert(tx))
    }

    /// Commits the [`Transaction`] of this [`Tx`] client.
    ///
    /// Nothing is done if no statement has been run yet.
    ///
    /// # Errors
    ///
    /// If the commit fails.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        match self.tx.lock().await.take() {
            Some(tx) => tx.commit().await.map_err(tracerr::wrap!()),
            None => Ok(()),
        }
    }
}

impl Connection for Tx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: Params<'_>,
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized + Sync,
    {
        let mut slot = self.tx.lock().await;
        self.open(&mut slot)
            .await?
            .query(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: Params<'_>,
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized + Sync,
    {
        let mut slot = self.tx.lock().await;
        self.open(&mut slot)
            .await?
            .exec(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }
}
