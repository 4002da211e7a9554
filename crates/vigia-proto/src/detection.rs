use serde::Serialize;
use serde_json::{Map, Value};

/// Label used when the server omits or mangles the object class.
pub const DEFAULT_LABEL: &str = "Unknown";

/// One decoded detection event.
///
/// The wire field names come from the server's storage layer and stay as
/// they are (`objeto`, `confianza`, `imagen_path`, `fecha`, `hora`).
/// Decoding is total: a missing or mistyped field takes its default instead
/// of failing, so every payload yields a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRecord {
    /// Server-assigned row id.
    pub id: i64,
    /// Source camera id.
    pub camera_id: i64,
    /// Object class label.
    #[serde(rename = "objeto")]
    pub label: String,
    /// Detector confidence, nominally in `0.0..=1.0`.
    #[serde(rename = "confianza")]
    pub confidence: f64,
    /// Bounding box `[x1, y1, x2, y2]` in frame pixels.
    #[serde(rename = "bbox")]
    pub bounding_box: [i64; 4],
    /// Relative path of the stored capture image.
    #[serde(rename = "imagen_path")]
    pub image_path: String,
    /// Producer timestamp, opaque.
    pub timestamp: String,
    /// Capture date, `%Y-%m-%d`.
    #[serde(rename = "fecha")]
    pub date: String,
    /// Capture time of day, `%H:%M:%S`.
    #[serde(rename = "hora")]
    pub time: String,
}

impl DetectionRecord {
    /// Decodes a record from a payload object. Never fails; see the type
    /// docs for per-field defaults.
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        DetectionRecord {
            id: int_or_zero(payload, "id"),
            camera_id: int_or_zero(payload, "camera_id"),
            label: string_or(payload, "objeto", DEFAULT_LABEL),
            confidence: payload
                .get("confianza")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            bounding_box: bounding_box(payload.get("bbox")),
            image_path: string_or(payload, "imagen_path", ""),
            timestamp: string_or(payload, "timestamp", ""),
            date: string_or(payload, "fecha", ""),
            time: string_or(payload, "hora", ""),
        }
    }

    /// Renders the record back into a wire payload object.
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("id".to_string(), Value::from(self.id));
        payload.insert("camera_id".to_string(), Value::from(self.camera_id));
        payload.insert("objeto".to_string(), Value::from(self.label.as_str()));
        payload.insert("confianza".to_string(), Value::from(self.confidence));
        payload.insert(
            "bbox".to_string(),
            Value::from(self.bounding_box.to_vec()),
        );
        payload.insert(
            "imagen_path".to_string(),
            Value::from(self.image_path.as_str()),
        );
        payload.insert(
            "timestamp".to_string(),
            Value::from(self.timestamp.as_str()),
        );
        payload.insert("fecha".to_string(), Value::from(self.date.as_str()));
        payload.insert("hora".to_string(), Value::from(self.time.as_str()));
        payload
    }
}

impl Default for DetectionRecord {
    fn default() -> Self {
        DetectionRecord::from_payload(&Map::new())
    }
}

fn int_or_zero(payload: &Map<String, Value>, key: &str) -> i64 {
    payload.get(key).and_then(Value::as_i64).unwrap_or(0)
}

fn string_or(payload: &Map<String, Value>, key: &str, default: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

// Up to four corners are taken in order; short or malformed arrays leave
// the remaining slots at zero.
fn bounding_box(value: Option<&Value>) -> [i64; 4] {
    let mut bbox = [0; 4];
    if let Some(Value::Array(corners)) = value {
        for (slot, corner) in bbox.iter_mut().zip(corners) {
            if let Some(n) = corner.as_i64() {
                *slot = n;
            }
        }
    }
    bbox
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("payload fixture must be an object, got {other}"),
        }
    }

    #[test]
    fn empty_payload_yields_defaults() {
        let record = DetectionRecord::from_payload(&Map::new());

        assert_eq!(record, DetectionRecord::default());
        assert_eq!(record.id, 0);
        assert_eq!(record.camera_id, 0);
        assert_eq!(record.label, DEFAULT_LABEL);
        assert_eq!(record.confidence, 0.0);
        assert_eq!(record.bounding_box, [0, 0, 0, 0]);
        assert_eq!(record.image_path, "");
        assert_eq!(record.date, "");
        assert_eq!(record.time, "");
    }

    #[test]
    fn full_payload_decodes() {
        let record = DetectionRecord::from_payload(&payload(json!({
            "id": 42,
            "camera_id": 3,
            "objeto": "person",
            "confianza": 0.91,
            "bbox": [120, 40, 380, 310],
            "imagen_path": "capturas/deteccion_42.jpg",
            "timestamp": "2025-06-14T09:21:33+00:00",
            "fecha": "2025-06-14",
            "hora": "09:21:33",
        })));

        assert_eq!(record.id, 42);
        assert_eq!(record.camera_id, 3);
        assert_eq!(record.label, "person");
        assert_eq!(record.confidence, 0.91);
        assert_eq!(record.bounding_box, [120, 40, 380, 310]);
        assert_eq!(record.image_path, "capturas/deteccion_42.jpg");
        assert_eq!(record.date, "2025-06-14");
        assert_eq!(record.time, "09:21:33");
    }

    #[test]
    fn short_bbox_is_zero_padded() {
        let record = DetectionRecord::from_payload(&payload(json!({"bbox": [10, 20]})));
        assert_eq!(record.bounding_box, [10, 20, 0, 0]);
    }

    #[test]
    fn long_bbox_ignores_extra_corners() {
        let record =
            DetectionRecord::from_payload(&payload(json!({"bbox": [1, 2, 3, 4, 5, 6]})));
        assert_eq!(record.bounding_box, [1, 2, 3, 4]);
    }

    #[test]
    fn non_integer_bbox_elements_leave_slot_zero() {
        let record =
            DetectionRecord::from_payload(&payload(json!({"bbox": [10, "x", 30]})));
        assert_eq!(record.bounding_box, [10, 0, 30, 0]);
    }

    #[test]
    fn mistyped_fields_fall_back() {
        let record = DetectionRecord::from_payload(&payload(json!({
            "id": "seven",
            "camera_id": null,
            "objeto": 42,
            "confianza": "high",
            "bbox": "none",
            "imagen_path": 1,
        })));

        assert_eq!(record.id, 0);
        assert_eq!(record.camera_id, 0);
        assert_eq!(record.label, DEFAULT_LABEL);
        assert_eq!(record.confidence, 0.0);
        assert_eq!(record.bounding_box, [0, 0, 0, 0]);
        assert_eq!(record.image_path, "");
    }

    #[test]
    fn integer_confidence_converts() {
        let record = DetectionRecord::from_payload(&payload(json!({"confianza": 1})));
        assert_eq!(record.confidence, 1.0);
    }

    #[test]
    fn payload_round_trips() {
        let record = DetectionRecord::from_payload(&payload(json!({
            "id": 7,
            "camera_id": 1,
            "objeto": "dog",
            "confianza": 0.66,
            "bbox": [5, 6, 7, 8],
            "imagen_path": "capturas/deteccion_7.jpg",
            "timestamp": "2025-06-14T10:00:00+00:00",
            "fecha": "2025-06-14",
            "hora": "10:00:00",
        })));

        assert_eq!(DetectionRecord::from_payload(&record.to_payload()), record);
    }

    #[test]
    fn to_payload_matches_serialize() {
        let record = DetectionRecord {
            id: 9,
            camera_id: 2,
            label: "car".to_string(),
            confidence: 0.5,
            bounding_box: [1, 2, 3, 4],
            image_path: "capturas/deteccion_9.jpg".to_string(),
            timestamp: "t".to_string(),
            date: "d".to_string(),
            time: "h".to_string(),
        };

        let derived = serde_json::to_value(&record).expect("record should serialize");
        assert_eq!(derived, Value::Object(record.to_payload()));
    }
}
