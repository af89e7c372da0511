//! In-memory RemoteStore that records every call and can be told to fail

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::query::{row_range, Filter, Sort};
use crate::remote::{
    AssetPayload, BlobNamespace, Booking, BookingStatus, Cabin, CabinRow, Page, RemoteError,
    RemoteStore, ResourceId,
};

pub const TEST_BASE_URL: &str = "https://project.test";
pub const TEST_BUCKET: &str = "cabin-images";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListBookings {
        filter: Option<Filter>,
        sort: Sort,
        page: u32,
    },
    DeleteBooking(ResourceId),
    ListCabins,
    PersistCabin {
        id: Option<ResourceId>,
        row: CabinRow,
    },
    DeleteCabin(ResourceId),
    Upload(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListBookings,
    DeleteBooking,
    ListCabins,
    PersistCabin,
    DeleteCabin,
    Upload,
}

#[derive(Default)]
struct State {
    bookings: Vec<Booking>,
    cabins: Vec<Cabin>,
    assets: HashMap<String, usize>,
    next_cabin_id: ResourceId,
}

pub struct MemoryStore {
    namespace: BlobNamespace,
    state: Mutex<State>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<Op, RemoteError>>,
    delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            namespace: BlobNamespace::new(TEST_BASE_URL, TEST_BUCKET),
            state: Mutex::new(State {
                next_cabin_id: 1,
                ..State::default()
            }),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            delay: None,
        }
    }

    /// Store with `count` bookings; every third one is checked in
    pub fn with_bookings(count: usize) -> Self {
        let store = Self::new();
        store.state.lock().unwrap().bookings = (1..=count).map(sample_booking).collect();
        store
    }

    /// Every call sleeps this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert_cabin(&self, cabin: Cabin) {
        let mut state = self.state.lock().unwrap();
        state.next_cabin_id = state.next_cabin_id.max(cabin.id + 1);
        state.cabins.push(cabin);
    }

    pub fn fail(&self, op: Op, err: RemoteError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    pub fn recover(&self, op: Op) {
        self.failures.lock().unwrap().remove(&op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    /// Pages requested through list_bookings, in call order
    pub fn listed_pages(&self) -> Vec<u32> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::ListBookings { page, .. } => Some(*page),
                _ => None,
            })
            .collect()
    }

    pub fn cabins(&self) -> Vec<Cabin> {
        self.state.lock().unwrap().cabins.clone()
    }

    pub fn booking_ids(&self) -> Vec<ResourceId> {
        self.state.lock().unwrap().bookings.iter().map(|b| b.id).collect()
    }

    pub fn has_asset(&self, name: &str) -> bool {
        self.state.lock().unwrap().assets.contains_key(name)
    }

    async fn enter(&self, op: Op, call: Call) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.failures.lock().unwrap().get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

pub fn sample_booking(id: usize) -> Booking {
    let status = if id % 3 == 0 {
        BookingStatus::CheckedIn
    } else {
        BookingStatus::Unconfirmed
    };
    Booking {
        id: id as ResourceId,
        created_at: None,
        start_date: format!("2024-06-{:02}", (id % 28) + 1),
        end_date: format!("2024-07-{:02}", (id % 28) + 1),
        num_nights: 3,
        num_guests: Some(2),
        status,
        total_price: 300.0 * id as f64,
        cabin: None,
        guest: None,
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn namespace(&self) -> &BlobNamespace {
        &self.namespace
    }

    async fn list_bookings(
        &self,
        filter: Option<&Filter>,
        sort: &Sort,
        page: u32,
    ) -> Result<Page<Booking>, RemoteError> {
        self.enter(
            Op::ListBookings,
            Call::ListBookings {
                filter: filter.cloned(),
                sort: sort.clone(),
                page,
            },
        )
        .await?;

        let state = self.state.lock().unwrap();
        let matching: Vec<Booking> = state
            .bookings
            .iter()
            .filter(|b| filter.map_or(true, |f| b.status.as_str() == f.value))
            .cloned()
            .collect();
        let (from, to) = row_range(page);
        let rows = matching
            .iter()
            .skip(from as usize)
            .take((to - from + 1) as usize)
            .cloned()
            .collect();
        Ok(Page {
            rows,
            total_count: matching.len() as u64,
        })
    }

    async fn delete_booking(&self, id: ResourceId) -> Result<(), RemoteError> {
        self.enter(Op::DeleteBooking, Call::DeleteBooking(id)).await?;
        self.state.lock().unwrap().bookings.retain(|b| b.id != id);
        Ok(())
    }

    async fn list_cabins(&self) -> Result<Vec<Cabin>, RemoteError> {
        self.enter(Op::ListCabins, Call::ListCabins).await?;
        Ok(self.cabins())
    }

    async fn persist_cabin_row(
        &self,
        row: &CabinRow,
        id: Option<ResourceId>,
    ) -> Result<Cabin, RemoteError> {
        self.enter(
            Op::PersistCabin,
            Call::PersistCabin {
                id,
                row: row.clone(),
            },
        )
        .await?;

        let mut state = self.state.lock().unwrap();
        let id = match id {
            Some(id) => {
                if !state.cabins.iter().any(|c| c.id == id) {
                    return Err(RemoteError::NotFound(format!("cabin {}", id)));
                }
                state.cabins.retain(|c| c.id != id);
                id
            }
            None => {
                let id = state.next_cabin_id;
                state.next_cabin_id += 1;
                id
            }
        };
        let cabin = Cabin {
            id,
            name: row.name.clone(),
            max_capacity: row.max_capacity,
            regular_price: row.regular_price,
            discount: row.discount,
            description: row.description.clone(),
            image: row.image.clone(),
        };
        state.cabins.push(cabin.clone());
        Ok(cabin)
    }

    async fn delete_cabin_row(&self, id: ResourceId) -> Result<(), RemoteError> {
        self.enter(Op::DeleteCabin, Call::DeleteCabin(id)).await?;
        self.state.lock().unwrap().cabins.retain(|c| c.id != id);
        Ok(())
    }

    async fn upload_asset(&self, name: &str, payload: &AssetPayload) -> Result<(), RemoteError> {
        self.enter(Op::Upload, Call::Upload(name.to_string())).await?;
        self.state
            .lock()
            .unwrap()
            .assets
            .insert(name.to_string(), payload.bytes.len());
        Ok(())
    }
}
