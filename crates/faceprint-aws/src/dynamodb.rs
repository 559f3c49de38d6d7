//! Face record store backed by a DynamoDB table keyed on `FaceId`.
//!
//! Item layout follows the engine's field names for face data plus
//! `bucket`, `key` and `metadata` for the source object. Floats are written
//! as exact decimals of their shortest round-trip representation.

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use faceprint_core::types::{BoundingBox, FaceDetail, ImageQuality, Pose};
use faceprint_core::{FaceRecord, FaceStore, StoreError};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

const FACE_ID: &str = "FaceId";

type Item = HashMap<String, AttributeValue>;

pub struct DynamoFaceStore {
    client: aws_sdk_dynamodb::Client,
    table: String,
}

impl DynamoFaceStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl FaceStore for DynamoFaceStore {
    async fn put(&self, record: &FaceRecord) -> Result<(), StoreError> {
        let item = record_to_item(record)?;
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(FaceId)")
            .send()
            .await
            .map_err(|err| {
                let duplicate = err
                    .as_service_error()
                    .is_some_and(|e| e.is_conditional_check_failed_exception());
                if duplicate {
                    StoreError::AlreadyExists(record.face_id.clone())
                } else {
                    StoreError::Backend(format!("PutItem: {}", DisplayErrorContext(&err)))
                }
            })?;
        Ok(())
    }

    async fn get(&self, face_id: &str) -> Result<Option<FaceRecord>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(FACE_ID, AttributeValue::S(face_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|err| StoreError::Backend(format!("GetItem: {}", DisplayErrorContext(&err))))?;

        output.item().map(item_to_record).transpose()
    }
}

fn decimal(field: &'static str, value: f32) -> Result<AttributeValue, StoreError> {
    if !value.is_finite() {
        return Err(StoreError::NonFiniteNumber { field });
    }
    // f32's Display is the shortest string that parses back to the same value.
    let exact = BigDecimal::from_str(&value.to_string())
        .map_err(|e| StoreError::Backend(format!("{field}: {e}")))?;
    Ok(AttributeValue::N(exact.to_string()))
}

fn numbers(fields: &[(&'static str, f32)]) -> Result<AttributeValue, StoreError> {
    let mut map = HashMap::with_capacity(fields.len());
    for &(name, value) in fields {
        map.insert(name.to_string(), decimal(name, value)?);
    }
    Ok(AttributeValue::M(map))
}

fn record_to_item(record: &FaceRecord) -> Result<Item, StoreError> {
    let mut item = Item::new();
    item.insert(FACE_ID.into(), AttributeValue::S(record.face_id.clone()));
    item.insert("ExternalImageId".into(), AttributeValue::S(record.external_image_id.clone()));
    item.insert("bucket".into(), AttributeValue::S(record.bucket.clone()));
    item.insert("key".into(), AttributeValue::S(record.object_key.clone()));
    item.insert(
        "metadata".into(),
        AttributeValue::M(
            record
                .object_metadata
                .iter()
                .map(|(k, v)| (k.clone(), AttributeValue::S(v.clone())))
                .collect(),
        ),
    );
    item.insert("IndexedAt".into(), AttributeValue::S(record.indexed_at.to_rfc3339()));

    if let Some(b) = &record.bounding_box {
        item.insert(
            "BoundingBox".into(),
            numbers(&[("Width", b.width), ("Height", b.height), ("Left", b.left), ("Top", b.top)])?,
        );
    }
    if let Some(confidence) = record.confidence {
        item.insert("Confidence".into(), decimal("Confidence", confidence)?);
    }
    if let Some(image_id) = &record.image_id {
        item.insert("ImageId".into(), AttributeValue::S(image_id.clone()));
    }
    if let Some(version) = &record.index_model_version {
        item.insert("IndexFacesModelVersion".into(), AttributeValue::S(version.clone()));
    }
    if let Some(detail) = &record.detection_attributes {
        let mut attrs = HashMap::new();
        if let Some(p) = &detail.pose {
            attrs.insert(
                "Pose".to_string(),
                numbers(&[("Roll", p.roll), ("Yaw", p.yaw), ("Pitch", p.pitch)])?,
            );
        }
        if let Some(q) = &detail.quality {
            attrs.insert(
                "Quality".to_string(),
                numbers(&[("Brightness", q.brightness), ("Sharpness", q.sharpness)])?,
            );
        }
        item.insert("DetectionAttributes".into(), AttributeValue::M(attrs));
    }
    Ok(item)
}

fn item_to_record(item: &Item) -> Result<FaceRecord, StoreError> {
    let face_id = string(item, FACE_ID).unwrap_or_default().to_string();
    let corrupt = |reason: String| StoreError::Corrupt {
        face_id: face_id.clone(),
        reason,
    };
    let required = |name: &str| {
        string(item, name)
            .map(str::to_string)
            .ok_or_else(|| corrupt(format!("missing string attribute {name}")))
    };

    let external_image_id = required("ExternalImageId")?;
    let bucket = required("bucket")?;
    let object_key = required("key")?;

    let object_metadata: BTreeMap<String, String> = match item.get("metadata") {
        Some(AttributeValue::M(map)) => map
            .iter()
            .filter_map(|(k, v)| v.as_s().ok().map(|s| (k.clone(), s.clone())))
            .collect(),
        _ => BTreeMap::new(),
    };

    let bounding_box = match item.get("BoundingBox") {
        Some(AttributeValue::M(map)) => Some(BoundingBox {
            width: number(map, "Width").map_err(&corrupt)?.unwrap_or_default(),
            height: number(map, "Height").map_err(&corrupt)?.unwrap_or_default(),
            left: number(map, "Left").map_err(&corrupt)?.unwrap_or_default(),
            top: number(map, "Top").map_err(&corrupt)?.unwrap_or_default(),
        }),
        _ => None,
    };

    let detection_attributes = match item.get("DetectionAttributes") {
        Some(AttributeValue::M(attrs)) => {
            let pose = match attrs.get("Pose") {
                Some(AttributeValue::M(p)) => Some(Pose {
                    roll: number(p, "Roll").map_err(&corrupt)?.unwrap_or_default(),
                    yaw: number(p, "Yaw").map_err(&corrupt)?.unwrap_or_default(),
                    pitch: number(p, "Pitch").map_err(&corrupt)?.unwrap_or_default(),
                }),
                _ => None,
            };
            let quality = match attrs.get("Quality") {
                Some(AttributeValue::M(q)) => Some(ImageQuality {
                    brightness: number(q, "Brightness").map_err(&corrupt)?.unwrap_or_default(),
                    sharpness: number(q, "Sharpness").map_err(&corrupt)?.unwrap_or_default(),
                }),
                _ => None,
            };
            Some(FaceDetail { pose, quality })
        }
        _ => None,
    };

    // Records written before timestamps were stored read back as the epoch.
    let indexed_at = string(item, "IndexedAt")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default();

    Ok(FaceRecord {
        confidence: number(item, "Confidence").map_err(&corrupt)?,
        image_id: string(item, "ImageId").map(str::to_string),
        index_model_version: string(item, "IndexFacesModelVersion").map(str::to_string),
        face_id: face_id.clone(),
        bucket,
        object_key,
        external_image_id,
        object_metadata,
        bounding_box,
        detection_attributes,
        indexed_at,
    })
}

fn string<'a>(item: &'a Item, name: &str) -> Option<&'a str> {
    item.get(name).and_then(|v| v.as_s().ok()).map(String::as_str)
}

fn number(item: &Item, name: &str) -> Result<Option<f32>, String> {
    match item.get(name) {
        None => Ok(None),
        Some(AttributeValue::N(n)) => n
            .parse::<f32>()
            .map(Some)
            .map_err(|e| format!("attribute {name} = {n:?}: {e}")),
        Some(_) => Err(format!("attribute {name} is not a number")),
    }
}
