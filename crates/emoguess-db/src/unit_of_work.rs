use std::sync::MutexGuard;

use anyhow::Result;
use rusqlite::Connection;
use tracing::{debug, warn};

use emoguess_game::repo::{GameRepository, UnitOfWork, UnitOfWorkFactory};

use crate::Database;
use crate::queries::ConnRepo;

/// One `BEGIN IMMEDIATE` transaction. Holds the connection lock until it is
/// committed, rolled back or dropped.
pub struct SqliteUnitOfWork<'a> {
    repo: ConnRepo<MutexGuard<'a, Connection>>,
    finished: bool,
}

impl<'a> SqliteUnitOfWork<'a> {
    fn begin(conn: MutexGuard<'a, Connection>) -> Result<Self> {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self {
            repo: ConnRepo(conn),
            finished: false,
        })
    }
}

impl UnitOfWork for SqliteUnitOfWork<'_> {
    fn games(&self) -> &dyn GameRepository {
        &self.repo
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        // A failed COMMIT leaves the transaction open; Drop rolls it back
        self.repo.0.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        self.repo.0.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Drop for SqliteUnitOfWork<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.repo.0.execute_batch("ROLLBACK") {
            Ok(()) => debug!("Uncommitted transaction rolled back"),
            Err(e) => warn!("Rollback failed: {}", e),
        }
    }
}

impl UnitOfWorkFactory for Database {
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>> {
        Ok(Box::new(SqliteUnitOfWork::begin(self.lock()?)?))
    }
}
