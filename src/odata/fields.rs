//! Per-resource field maps: the bijection between RESO Data Dictionary
//! names (exposed over the wire) and backend column names (the fixed SQL
//! Server schema). One declaration drives both the forward and reverse
//! lookup so the two can never drift, per the field-map design note.

/// `(RESO name, backend column)` pairs, declared in the order they should
/// appear when `$select` is absent (invariant: default select order follows
/// map-declaration order). Forward/reverse lookups are derived from this one
/// declaration via linear scan — maps are small (≤30 entries) and built once
/// as `static`s, so this never shows up as a hot path.
pub struct FieldMap {
    declared: &'static [(&'static str, &'static str)],
}

impl FieldMap {
    const fn new(declared: &'static [(&'static str, &'static str)]) -> Self {
        Self { declared }
    }
}

impl FieldMap {
    pub fn declared_order(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.declared.iter().map(|(reso, _)| *reso)
    }

    /// Exact-case match only: RESO names are case-sensitive identifiers, and
    /// the lexer preserves the client's original casing for them (see
    /// `odata/lexer.rs`), so `city eq 'LA'` is a `BadRequest`, not a silent
    /// match against `City`.
    pub fn to_column(&self, reso_name: &str) -> Option<&'static str> {
        self.declared
            .iter()
            .find(|(reso, _)| *reso == reso_name)
            .map(|(_, col)| *col)
    }

    pub fn to_reso(&self, column: &str) -> Option<&'static str> {
        self.declared
            .iter()
            .find(|(_, col)| *col == column)
            .map(|(reso, _)| *reso)
    }

    pub fn contains_reso(&self, reso_name: &str) -> bool {
        self.to_column(reso_name).is_some()
    }

    pub fn all_columns(&self) -> Vec<&'static str> {
        self.declared.iter().map(|(_, col)| *col).collect()
    }
}

macro_rules! field_map {
    ($name:ident, [$(($reso:literal, $col:literal)),+ $(,)?]) => {
        pub static $name: FieldMap = FieldMap::new(&[$(($reso, $col)),+]);
    };
}

// Property: source is the MLS common view. ~30 RESO attributes including
// geo, price, counts; the photo XML blob is deliberately NOT part of this
// map (it is never client-selectable) — see resources/property.rs.
field_map!(
    PROPERTY_FIELDS,
    [
        ("ListingKey", "LISTINGKEY"),
        ("StandardStatus", "STATUS"),
        ("PropertyType", "PROPERTYTYPE"),
        ("PropertySubType", "PROPERTYSUBTYPE"),
        ("City", "CITY"),
        ("StateOrProvince", "STATE"),
        ("PostalCode", "ZIP"),
        ("County", "COUNTY"),
        ("StreetNumber", "STREETNUMBER"),
        ("StreetName", "STREETNAME"),
        ("StreetSuffix", "STREETSUFFIX"),
        ("UnitNumber", "UNITNUMBER"),
        ("SubdivisionName", "SUBDIVISION"),
        ("ListPrice", "IDCLISTPRICE"),
        ("OriginalListPrice", "IDCORIGLISTPRICE"),
        ("ClosePrice", "IDCCLOSEPRICE"),
        ("BedroomsTotal", "BEDSTOTAL"),
        ("BathroomsTotalInteger", "BATHSTOTAL"),
        ("LivingArea", "SQFTTOTAL"),
        ("LotSizeAcres", "LOTSIZEACRES"),
        ("YearBuilt", "YEARBUILT"),
        ("DaysOnMarket", "DOM"),
        ("Latitude", "LATITUDE"),
        ("Longitude", "LONGITUDE"),
        ("PublicRemarks", "REMARKS"),
        ("ListingContractDate", "IDCLISTDATE"),
        ("CloseDate", "IDCCLOSEDATE"),
        ("ModificationTimestamp", "IDCMODTIMESTAMP"),
        ("ListAgentKey", "IDCLISTAGENTKEY"),
        ("ListOfficeKey", "IDCLISTOFFICEKEY"),
    ]
);

field_map!(
    MEMBER_FIELDS,
    [
        ("MemberKey", "AGENTKEY"),
        ("MemberFirstName", "GIVENNAME"),
        ("MemberLastName", "SURNAME"),
        ("MemberFullName", "FULLNAME"),
        ("MemberEmail", "EMAIL"),
        ("MemberPhone", "PHONE"),
        ("MemberMlsId", "MLSID"),
        ("MemberStateLicense", "LICENSE"),
        ("OfficeKey", "OFFICEKEY"),
        ("MemberStatus", "STATUS"),
    ]
);

field_map!(
    OFFICE_FIELDS,
    [
        ("OfficeKey", "OFFICEKEY"),
        ("OfficeName", "OFFICENAME"),
        ("OfficePhone", "PHONE"),
        ("OfficeAddress1", "ADDRESS1"),
        ("OfficeCity", "CITY"),
        ("OfficeStateOrProvince", "STATE"),
        ("OfficePostalCode", "ZIP"),
        ("OfficeStatus", "STATUS"),
    ]
);

pub const PROPERTY_KEY_FIELD: &str = "ListingKey";
pub const MEMBER_KEY_FIELD: &str = "MemberKey";
pub const OFFICE_KEY_FIELD: &str = "OfficeKey";

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_bijection(map: &FieldMap, key_field: &str) {
        let mut seen_columns = std::collections::HashSet::new();
        for reso in map.declared_order() {
            let col = map.to_column(reso).expect("declared name must resolve");
            assert!(
                seen_columns.insert(col),
                "column {col} mapped from more than one RESO name"
            );
            assert_eq!(map.to_reso(col), Some(reso));
        }
        assert!(
            map.contains_reso(key_field),
            "key field {key_field} must be in the map"
        );
    }

    #[test]
    fn property_field_map_is_a_bijection() {
        assert_bijection(&PROPERTY_FIELDS, PROPERTY_KEY_FIELD);
    }

    #[test]
    fn member_field_map_is_a_bijection() {
        assert_bijection(&MEMBER_FIELDS, MEMBER_KEY_FIELD);
    }

    #[test]
    fn office_field_map_is_a_bijection() {
        assert_bijection(&OFFICE_FIELDS, OFFICE_KEY_FIELD);
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!(!PROPERTY_FIELDS.contains_reso("'; DROP TABLE users; --"));
    }
}
