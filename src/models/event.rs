//! Object-created notifications, as delivered by a storage event source.

use serde::{Deserialize, Serialize};

/// The parsed essentials of one object-created occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectCreated {
    pub bucket: String,
    pub key: String,
    /// Size of the uploaded object in bytes.
    pub size: u64,
}

/// Storage notification envelope: `{"Records":[{"s3":{...}}]}`.
///
/// Only the fields the pipeline needs are modelled; everything else in the
/// payload is ignored.
#[derive(Serialize, Deserialize, Debug)]
pub struct S3Event {
    #[serde(rename = "Records")]
    pub records: Vec<S3EventRecord>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct S3Object {
    pub key: String,
    pub size: u64,
}

impl S3Event {
    /// Parse a raw payload. Fails if any of bucket name, object key or object
    /// size is missing from the first record.
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// The first record's object-created details, if there is a record at all.
    pub fn first_object(self) -> Option<ObjectCreated> {
        self.records.into_iter().next().map(|record| ObjectCreated {
            bucket: record.s3.bucket.name,
            key: record.s3.object.key,
            size: record.s3.object.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_first_record_and_ignores_extra_fields() {
        let payload = json!({
            "Records": [
                {
                    "eventName": "ObjectCreated:Put",
                    "s3": {
                        "bucket": { "name": "photos", "arn": "arn:aws:s3:::photos" },
                        "object": { "key": "2024/cat.jpg", "size": 4096, "eTag": "abc" }
                    }
                },
                {
                    "s3": {
                        "bucket": { "name": "other" },
                        "object": { "key": "dog.jpg", "size": 1 }
                    }
                }
            ]
        });

        let created = S3Event::parse(payload.to_string().as_bytes())
            .unwrap()
            .first_object()
            .unwrap();
        assert_eq!(
            created,
            ObjectCreated {
                bucket: "photos".into(),
                key: "2024/cat.jpg".into(),
                size: 4096,
            }
        );
    }

    #[test]
    fn missing_size_is_rejected() {
        let payload = json!({
            "Records": [{ "s3": { "bucket": { "name": "photos" }, "object": { "key": "a.jpg" } } }]
        });
        assert!(S3Event::parse(payload.to_string().as_bytes()).is_err());
    }

    #[test]
    fn empty_records_have_no_object() {
        let event = S3Event::parse(br#"{"Records": []}"#).unwrap();
        assert!(event.first_object().is_none());
    }
}
