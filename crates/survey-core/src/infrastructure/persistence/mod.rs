//! In-memory relational store
//!
//! Tables live behind one `parking_lot::RwLock`. A write transaction holds
//! the write lock and journals the prior state of every row it touches; an
//! `Err` or a panic replays the journal, so partial writes are never
//! observable.

mod rows;
mod table;
mod tables;

pub use rows::{AnswerRow, OptionRow};
pub use tables::Tables;

use parking_lot::RwLock;

use crate::domain::events::{DomainEvent, Outbox};
use crate::error::SurveyResult;

/// Shared store handed to the application services.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consistent read-only view.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.read();
        f(&tables)
    }

    /// Serializable write transaction. Returns the closure's value together
    /// with the events it recorded.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Tables, &mut Outbox) -> SurveyResult<T>,
    ) -> SurveyResult<(T, Vec<DomainEvent>)> {
        let mut live = self.tables.write();
        live.begin();
        let mut open = OpenTransaction { tables: &mut *live, committed: false };
        let mut outbox = Outbox::new();

        let value = f(&mut *open.tables, &mut outbox)?;

        open.tables.commit();
        open.committed = true;
        Ok((value, outbox.into_events()))
    }
}

/// Rolls the tables back unless committed.
struct OpenTransaction<'a> {
    tables: &'a mut Tables,
    committed: bool,
}

impl Drop for OpenTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.tables.rollback();
        }
    }
}
