//! Row reshape and envelope assembly shared by every resource driver (§4.5,
//! §8 "reshape law" / "envelope shape"): backend rows become RESO-named
//! JSON objects, and those objects are wrapped in the OData envelope.

use crate::odata::fields::FieldMap;
use crate::value::Row;
use serde_json::{Map, Value as Json};

/// Renames every column present in `fields`' reverse map and drops the
/// rest — the reshape law from §8: exactly the unmapped columns vanish.
pub fn reshape(row: &Row, fields: &FieldMap) -> Map<String, Json> {
    let mut out = Map::new();
    for (column, value) in row {
        if let Some(reso_name) = fields.to_reso(column) {
            out.insert(reso_name.to_string(), value.clone().into_json());
        }
    }
    out
}

/// `…$metadata#<Set>` for a collection envelope.
pub fn collection_context(base_url: &str, set: &str) -> String {
    format!("{base_url}/$metadata#{set}")
}

/// `…$metadata#<Set>/$entity` for a single-entity envelope.
pub fn entity_context(base_url: &str, set: &str) -> String {
    format!("{base_url}/$metadata#{set}/$entity")
}

/// Assembles a collection envelope with keys in the fixed order the §8
/// invariant pins: `@odata.context`, optional `@odata.count`, optional
/// `@odata.nextLink`, `value`.
pub fn collection_envelope(
    context: String,
    count: Option<i64>,
    next_link: Option<String>,
    values: Vec<Json>,
) -> Json {
    let mut map = Map::new();
    map.insert("@odata.context".to_string(), Json::String(context));
    if let Some(count) = count {
        map.insert("@odata.count".to_string(), Json::Number(count.into()));
    }
    if let Some(next_link) = next_link {
        map.insert("@odata.nextLink".to_string(), Json::String(next_link));
    }
    map.insert("value".to_string(), Json::Array(values));
    Json::Object(map)
}

/// Assembles a single-entity envelope: `@odata.context` followed by the
/// entity's own fields.
pub fn entity_envelope(context: String, mut fields: Map<String, Json>) -> Json {
    let mut map = Map::new();
    map.insert("@odata.context".to_string(), Json::String(context));
    map.append(&mut fields);
    Json::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odata::fields::PROPERTY_FIELDS;
    use crate::value::Value;

    #[test]
    fn reshape_drops_unmapped_columns_and_renames_the_rest() {
        let row: Row = vec![
            ("LISTINGKEY".to_string(), Value::String("MLS-1".to_string())),
            ("CITY".to_string(), Value::String("LA".to_string())),
            ("PHOTOXML".to_string(), Value::String("<Media/>".to_string())),
        ];
        let reshaped = reshape(&row, &PROPERTY_FIELDS);
        assert_eq!(reshaped.get("ListingKey").unwrap(), "MLS-1");
        assert_eq!(reshaped.get("City").unwrap(), "LA");
        assert!(!reshaped.contains_key("PHOTOXML"));
        assert_eq!(reshaped.len(), 2);
    }

    #[test]
    fn collection_envelope_key_order_matches_the_pinned_invariant() {
        let envelope = collection_envelope(
            "https://api.example.com/odata/$metadata#Property".to_string(),
            Some(100),
            Some("https://api.example.com/odata/Property?%24skip=10".to_string()),
            vec![],
        );
        let keys: Vec<&String> = envelope.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["@odata.context", "@odata.count", "@odata.nextLink", "value"]);
    }
}
