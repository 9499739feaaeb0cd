//! The polling loop: sleep until the next scheduled event, fetch a reading,
//! store it. A failed cycle is logged and forgotten; the loop never stops on
//! its own.

use std::time::Duration;

use actix_web::web;
use log::{debug, error, info};

use crate::{
    db::{Store, StoreError},
    scheduler::{Event, Scheduler},
    sensor::SensorClient,
    utils::secs_since_epoch,
};

pub struct Ingest {
    client: SensorClient,
    store: Store,
    scheduler: Scheduler,
}

impl Ingest {
    pub fn new(client: SensorClient, store: Store, scheduler: Scheduler) -> Self {
        Self {
            client,
            store,
            scheduler,
        }
    }

    pub async fn run(mut self) {
        info!(
            "Polling {} into {}",
            self.client.url(),
            self.store.path().display()
        );
        loop {
            let (event, secs) = self.scheduler.next_event(secs_since_epoch());
            tokio::time::sleep(Duration::from_secs_f64(secs)).await;
            self.cycle(event).await;
        }
    }

    /// One fetch and the writes it leads to.
    pub(crate) async fn cycle(&mut self, event: Event) {
        let reading = match self.client.fetch().await {
            Ok(Some(reading)) => reading,
            Ok(None) => {
                if event == Event::Archive {
                    info!("No reading; skipping archive record.");
                }
                return;
            }
            Err(err) => {
                error!("Could not fetch a reading: {err}");
                if let Err(err) = self.client.recycle() {
                    error!("Could not recreate the HTTP client: {err}");
                }
                if event == Event::Archive {
                    info!("Skipping archive record.");
                }
                return;
            }
        };

        // bucket is taken after the fetch, which may have run past the tick
        let bucket = match event {
            Event::Archive => Some(self.scheduler.archive_bucket(secs_since_epoch())),
            Event::Poll => None,
        };

        let current = reading.clone();
        if let Err(err) = self.write(move |store| store.save_current(&current)).await {
            error!("Could not save current reading: {err}");
            return;
        }

        if let Some(bucket) = bucket {
            match self
                .write(move |store| store.save_archive(bucket, &reading))
                .await
            {
                Ok(()) => debug!("Archived reading for {bucket}"),
                Err(err) => error!("Could not save archive record: {err}"),
            }
        }
    }

    async fn write<F>(&self, op: F) -> Result<(), WriteError>
    where
        F: FnOnce(&Store) -> Result<(), StoreError> + Send + 'static,
    {
        let store = self.store.clone();
        web::block(move || op(&store))
            .await
            .map_err(|_| WriteError::Cancelled)??;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
enum WriteError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("blocking pool is gone")]
    Cancelled,
}
