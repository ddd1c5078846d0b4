//! One keyed table: rows by id, a unique-key index, a parent index and the
//! undo journal of the open transaction.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::value_objects::RowId;

/// Identity fields a row is indexed by. Both must stay fixed after insert.
pub trait Indexed: Clone {
    type Key: Ord + Clone;

    /// Unique lookup key, if the table has one.
    fn key(&self) -> Option<Self::Key>;

    /// Owning row, for one-to-many lookups.
    fn parent(&self) -> Option<RowId>;
}

#[derive(Clone, Debug)]
pub struct Table<R: Indexed> {
    rows: BTreeMap<RowId, R>,
    keys: BTreeMap<R::Key, RowId>,
    children: BTreeSet<(RowId, RowId)>,
    /// Prior state of every touched row, oldest first. `None` outside a
    /// transaction.
    journal: Option<Vec<(RowId, Option<R>)>>,
}

impl<R: Indexed> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            keys: BTreeMap::new(),
            children: BTreeSet::new(),
            journal: None,
        }
    }
}

impl<R: Indexed> Table<R> {
    pub fn get(&self, id: RowId) -> Option<&R> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: RowId) -> Option<&mut R> {
        if self.rows.contains_key(&id) {
            self.record(id);
        }
        self.rows.get_mut(&id)
    }

    pub fn contains_key(&self, key: &R::Key) -> bool {
        self.keys.contains_key(key)
    }

    pub fn by_key(&self, key: &R::Key) -> Option<&R> {
        self.keys.get(key).and_then(|id| self.rows.get(id))
    }

    pub fn id_by_key(&self, key: &R::Key) -> Option<RowId> {
        self.keys.get(key).copied()
    }

    /// Ids of the rows owned by `parent`, in insertion order.
    pub fn child_ids(&self, parent: RowId) -> impl Iterator<Item = RowId> + '_ {
        self.children
            .range((parent, RowId::MIN)..=(parent, RowId::MAX))
            .map(|(_, id)| *id)
    }

    pub fn children_of(&self, parent: RowId) -> impl Iterator<Item = &R> + '_ {
        self.child_ids(parent).filter_map(|id| self.rows.get(&id))
    }

    /// Mutable view of the given rows, journaled as a batch.
    pub fn rows_mut(&mut self, ids: Vec<RowId>) -> impl Iterator<Item = &mut R> + '_ {
        let ids: BTreeSet<RowId> = ids.into_iter().filter(|id| self.rows.contains_key(id)).collect();
        for id in &ids {
            self.record(*id);
        }
        let bounds = ids.first().copied().zip(ids.last().copied());
        let range = match bounds {
            Some((low, high)) => self.rows.range_mut(low..=high),
            None => self.rows.range_mut(1..1),
        };
        range.filter(move |(id, _)| ids.contains(*id)).map(|(_, row)| row)
    }

    pub fn values(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    pub fn insert(&mut self, id: RowId, row: R) {
        self.record(id);
        self.attach(id, row);
    }

    pub fn remove(&mut self, id: RowId) -> Option<R> {
        if !self.rows.contains_key(&id) {
            return None;
        }
        self.record(id);
        self.detach(id)
    }

    pub fn begin(&mut self) {
        self.journal = Some(Vec::new());
    }

    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Put every touched row back, newest change first.
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for (id, prior) in journal.into_iter().rev() {
            self.detach(id);
            if let Some(row) = prior {
                self.attach(id, row);
            }
        }
    }

    fn record(&mut self, id: RowId) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push((id, self.rows.get(&id).cloned()));
        }
    }

    fn attach(&mut self, id: RowId, row: R) {
        if let Some(key) = row.key() {
            self.keys.insert(key, id);
        }
        if let Some(parent) = row.parent() {
            self.children.insert((parent, id));
        }
        self.rows.insert(id, row);
    }

    fn detach(&mut self, id: RowId) -> Option<R> {
        let row = self.rows.remove(&id)?;
        if let Some(key) = row.key() {
            self.keys.remove(&key);
        }
        if let Some(parent) = row.parent() {
            self.children.remove(&(parent, id));
        }
        Some(row)
    }
}
