//! In-memory collaborators and fixtures shared by unit tests.

use crate::{
    models::{
        event::{ObjectCreated, S3Bucket, S3Entity, S3Event, S3EventRecord, S3Object},
        thumbnail::ThumbnailRecord,
    },
    services::{
        StoreError, StoreResult,
        metadata_store::{MetadataStore, ScanPage},
        object_store::ObjectStore,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::{
    collections::{BTreeMap, HashMap},
    io::{self, Cursor},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

/// A gradient image of the given size, encoded in `format`.
pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, format)
        .expect("encode test image");
    out.into_inner()
}

pub fn record(id: &str) -> ThumbnailRecord {
    ThumbnailRecord {
        id: id.into(),
        url: format!("https://photos.s3.amazonaws.com/{id}_thumbnail.png"),
        approx_reduced_size: "0.53 KB".into(),
        created_at: "2024-01-01 00:00:00".into(),
        updated_at: "2024-01-01 00:00:00".into(),
    }
}

/// Object store backed by a map. Records every put as (bucket, key, content type).
/// With `failing_puts`, reads still work but every write is rejected.
#[derive(Default)]
pub struct FakeObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    puts: Mutex<Vec<(String, String, String)>>,
    gets: AtomicUsize,
    fail_puts: bool,
}

impl FakeObjectStore {
    pub fn failing_puts() -> Self {
        Self {
            fail_puts: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, bucket: &str, key: &str, body: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.into(), key.into()), body);
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn puts(&self) -> Vec<(String, String, String)> {
        self.puts.lock().unwrap().clone()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.get(bucket, key)
            .map(Bytes::from)
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: bucket.into(),
                key: key.into(),
            })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StoreResult<()> {
        if self.fail_puts {
            return Err(StoreError::Io(io::Error::other("object store unavailable")));
        }
        self.puts
            .lock()
            .unwrap()
            .push((bucket.into(), key.into(), content_type.into()));
        self.insert(bucket, key, body.to_vec());
        Ok(())
    }
}

/// Metadata store backed by an ordered map, with a configurable scan page size.
/// A failing instance returns an I/O error from every call.
pub struct FakeMetadataStore {
    records: Mutex<BTreeMap<String, ThumbnailRecord>>,
    page_size: usize,
    fail: bool,
    scans: AtomicUsize,
}

impl Default for FakeMetadataStore {
    fn default() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            page_size: 100,
            fail: false,
            scans: AtomicUsize::new(0),
        }
    }
}

impl FakeMetadataStore {
    pub fn with_records(ids: &[&str]) -> Self {
        let store = Self::default();
        for id in ids {
            store
                .records
                .lock()
                .unwrap()
                .insert(id.to_string(), record(id));
        }
        store
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn paged(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Stored records in insertion-independent id order.
    pub fn all(&self) -> Vec<ThumbnailRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        if self.fail {
            Err(StoreError::Io(io::Error::other("metadata store unavailable")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MetadataStore for FakeMetadataStore {
    async fn put_record(&self, record: &ThumbnailRecord) -> StoreResult<()> {
        self.check()?;
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_record(&self, id: &str) -> StoreResult<Option<ThumbnailRecord>> {
        self.check()?;
        Ok(self.records.lock().unwrap().get(id).cloned())
    }

    async fn delete_record(&self, id: &str) -> StoreResult<u64> {
        self.check()?;
        Ok(self.records.lock().unwrap().remove(id).map_or(0, |_| 1))
    }

    async fn scan(&self, exclusive_start_key: Option<&str>) -> StoreResult<ScanPage> {
        self.check()?;
        self.scans.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().unwrap();
        let mut items: Vec<ThumbnailRecord> = records
            .values()
            .filter(|r| exclusive_start_key.is_none_or(|start| r.id.as_str() > start))
            .take(self.page_size + 1)
            .cloned()
            .collect();

        let mut last_evaluated_key = None;
        if items.len() > self.page_size {
            items.pop();
            last_evaluated_key = items.last().map(|r| r.id.clone());
        }
        Ok(ScanPage {
            items,
            last_evaluated_key,
        })
    }
}

impl From<&ObjectCreated> for S3Event {
    fn from(created: &ObjectCreated) -> Self {
        Self {
            records: vec![S3EventRecord {
                s3: S3Entity {
                    bucket: S3Bucket {
                        name: created.bucket.clone(),
                    },
                    object: S3Object {
                        key: created.key.clone(),
                        size: created.size,
                    },
                },
            }],
        }
    }
}
