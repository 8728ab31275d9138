//! In-process [`Database`] implementation.
//!
//! Writes are applied immediately and never rolled back, while [`Lock`]s are
//! held until the [`Commit`] (or drop) of the [`Tx`] that acquired them.

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use common::operations::{
    By, Commit, Delete, Increment, Insert, Lock, Select, Transact, Update,
};
use derive_more::{Display, Error as StdError};
use tokio::sync::OwnedMutexGuard;
use tracerr::Traced;

use crate::{
    domain::{listing, order, user, Listing, Order, Record, User},
    infra::{database, Database},
    read,
};

/// In-process [`Database`] client.
#[derive(Clone, Debug, Default)]
pub struct Memory<T = NonTx> {
    /// Shared [`Storage`] of this client.
    storage: Arc<Storage>,

    /// Transactional state of this client.
    client: T,
}

/// Non-transactional [`Memory`] client.
#[derive(Clone, Copy, Debug, Default)]
pub struct NonTx;

/// Transactional [`Memory`] client.
#[derive(Clone, Debug, Default)]
pub struct Tx {
    /// Guards of the [`Lock`]s acquired by this transaction.
    guards: Arc<tokio::sync::Mutex<HashMap<LockKey, OwnedMutexGuard<()>>>>,
}

/// Entity guarded by a [`Lock`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum LockKey {
    /// [`Order`] lock.
    Order(order::Id),

    /// [`Listing`] lock.
    Listing(listing::Id),
}

/// Data of a [`Memory`] database.
#[derive(Debug, Default)]
struct Storage {
    /// Stored entities.
    data: Mutex<Data>,

    /// Mutexes backing [`Lock`]s.
    locks: Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
}

/// Entities stored in a [`Memory`] database.
#[derive(Debug, Default)]
struct Data {
    /// [`User`]s.
    users: HashMap<user::Id, User>,

    /// [`Listing`]s.
    listings: HashMap<listing::Id, Listing>,

    /// [`Record`]s.
    records: HashMap<order::record::Id, Record>,
}

impl Memory {
    /// Creates a new empty [`Memory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> Memory<T> {
    /// Locks the stored [`Data`].
    fn data(&self) -> MutexGuard<'_, Data> {
        self.storage
            .data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the mutex backing the [`Lock`] of the provided [`LockKey`].
    fn mutex(&self, key: LockKey) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.storage
                .locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key)
                .or_default(),
        )
    }
}

impl Memory<Tx> {
    /// Acquires the [`Lock`] of the provided [`LockKey`] until [`Commit`].
    ///
    /// Reentrant within the same transaction.
    async fn lock(&self, key: LockKey) {
        let mut guards = self.client.guards.lock().await;
        if let Entry::Vacant(e) = guards.entry(key) {
            _ = e.insert(self.mutex(key).lock_owned().await);
        }
    }
}

/// [`Memory`] database error.
#[derive(Clone, Copy, Debug, Display, StdError, Eq, PartialEq)]
pub enum Error {
    /// Counter reached its maximum.
    #[display("`User(id: {_0})` counter overflowed")]
    CounterOverflow(#[error(not(source))] user::Id),
}

impl Database<Transact> for Memory<NonTx> {
    type Ok = Memory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(Memory {
            storage: Arc::clone(&self.storage),
            client: Tx::default(),
        })
    }
}

impl Database<Transact> for Memory<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.client.guards.lock().await.clear();
        Ok(())
    }
}

impl<T> Database<Select<By<Option<User>, user::Id>>> for Memory<T> {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self
            .data()
            .users
            .get(by.inner())
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }
}

impl<T> Database<Insert<User>> for Memory<T> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        _ = self.data().users.insert(user.id, user);
        Ok(())
    }
}

impl<T> Database<Increment<By<user::BuyRentCount, user::Id>>> for Memory<T> {
    type Ok = Option<user::BuyRentCount>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Increment(by): Increment<By<user::BuyRentCount, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        // Read and write happen under the same `data` guard, so concurrent
        // increments never observe a stale count.
        let mut data = self.data();
        let Some(user) = data.users.get_mut(&id) else {
            return Ok(None);
        };
        user.buy_rent_count = user
            .buy_rent_count
            .incremented()
            .ok_or(Error::CounterOverflow(id))
            .map_err(tracerr::from_and_wrap!(=> database::Error))?;
        Ok(Some(user.buy_rent_count))
    }
}

impl<T> Database<Select<By<Option<Listing>, listing::Id>>> for Memory<T> {
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self
            .data()
            .listings
            .get(by.inner())
            .filter(|l| l.deleted_at.is_none())
            .cloned())
    }
}

impl<T> Database<Insert<Listing>> for Memory<T> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(listing): Insert<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        _ = self.data().listings.insert(listing.id, listing);
        Ok(())
    }
}

impl<T> Database<Update<Listing>> for Memory<T> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(listing): Update<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        _ = self.data().listings.insert(listing.id, listing);
        Ok(())
    }
}

impl Database<Lock<By<Listing, listing::Id>>> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Listing, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.lock(LockKey::Listing(by.into_inner())).await;
        Ok(())
    }
}

impl Database<Lock<By<Order, order::Id>>> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Order, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.lock(LockKey::Order(by.into_inner())).await;
        Ok(())
    }
}

impl<T> Database<Select<By<Option<Record>, order::record::Id>>> for Memory<T> {
    type Ok = Option<Record>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Record>, order::record::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self
            .data()
            .records
            .get(by.inner())
            .filter(|r| r.deleted_at.is_none())
            .cloned())
    }
}

impl<T> Database<Insert<Record>> for Memory<T> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(record): Insert<Record>,
    ) -> Result<Self::Ok, Self::Err> {
        _ = self.data().records.insert(record.id, record);
        Ok(())
    }
}

impl<T> Database<Delete<By<Record, order::record::Id>>> for Memory<T> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Record, order::record::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        if let Some(r) = self.data().records.get_mut(by.inner()) {
            _ = r
                .deleted_at
                .get_or_insert_with(order::record::DeletionDateTime::now);
        }
        Ok(())
    }
}

impl<T> Database<Update<order::record::Delivery>> for Memory<T> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(delivery): Update<order::record::Delivery>,
    ) -> Result<Self::Ok, Self::Err> {
        if let Some(r) = self.data().records.get_mut(&delivery.record_id) {
            r.apply(delivery);
        }
        Ok(())
    }
}

impl<T> Database<Update<By<order::record::Read, user::Id>>> for Memory<T> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(by): Update<By<order::record::Read, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let recipient_id = by.into_inner();
        self.data()
            .records
            .values_mut()
            .filter(|r| r.recipient_id == recipient_id)
            .for_each(|r| r.is_new = false);
        Ok(())
    }
}

impl<T> Database<Select<By<Vec<Record>, user::Id>>> for Memory<T> {
    type Ok = Vec<Record>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Record>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let recipient_id = by.into_inner();
        Ok(self
            .data()
            .records
            .values()
            .filter(|r| r.recipient_id == recipient_id && r.deleted_at.is_none())
            .cloned()
            .collect())
    }
}

impl<T> Database<Select<By<Option<Order>, order::Id>>> for Memory<T> {
    type Ok = Option<Order>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Order>, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        let records = self
            .data()
            .records
            .values()
            .filter(|r| r.order_id == id)
            .cloned()
            .collect();
        Ok(Order::new(id, records))
    }
}

impl<T>
    Database<Select<By<Vec<Record>, read::record::Undelivered>>> for Memory<T>
{
    type Ok = Vec<Record>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Record>, read::record::Undelivered>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::record::Undelivered {
            max_attempts,
            created_before,
            limit,
        } = by.into_inner();
        let mut records = self
            .data()
            .records
            .values()
            .filter(|r| {
                r.notified_at.is_none()
                    && r.deleted_at.is_none()
                    && r.delivery_attempts < max_attempts
                    && r.created_at < created_before
            })
            .cloned()
            .collect::<Vec<_>>();
        records.sort_by_key(|r| r.created_at);
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::operations::{
        By, Commit, Increment, Insert, Lock, Select, Transact,
    };

    use crate::{
        domain::{order, user, Order, User},
        infra::Database,
    };

    use super::Memory;

    fn user() -> User {
        User::new(user::Name::new("jane").unwrap())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let db = Memory::new();
        let user = user();
        db.execute(Insert(user.clone())).await.unwrap();

        let id = user.id;
        let tasks = (0..32)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.execute(Increment(By::<user::BuyRentCount, _>::new(id)))
                        .await
                })
            })
            .collect::<Vec<_>>();
        for t in tasks {
            _ = t.await.unwrap().unwrap().unwrap();
        }

        let stored = db
            .execute(Select(By::<Option<User>, _>::new(user.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.buy_rent_count, user::BuyRentCount::from(32));
    }

    #[tokio::test]
    async fn increments_missing_user_to_none() {
        let db = Memory::new();

        let res = db
            .execute(Increment(By::<user::BuyRentCount, _>::new(
                user::Id::new(),
            )))
            .await
            .unwrap();

        assert!(res.is_none());
    }

    #[tokio::test]
    async fn lock_is_held_until_commit() {
        let db = Memory::new();
        let order_id = order::Id::new();

        let first = db.execute(Transact).await.unwrap();
        first
            .execute(Lock(By::<Order, _>::new(order_id)))
            .await
            .unwrap();
        // Reentrant within the same transaction.
        first
            .execute(Lock(By::<Order, _>::new(order_id)))
            .await
            .unwrap();

        let second = db.execute(Transact).await.unwrap();
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            second.execute(Lock(By::<Order, _>::new(order_id))),
        )
        .await;
        assert!(blocked.is_err(), "lock acquired twice");

        first.execute(Commit).await.unwrap();
        second
            .execute(Lock(By::<Order, _>::new(order_id)))
            .await
            .unwrap();
    }
}
