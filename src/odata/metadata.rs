//! Static CSDL XML and JSON service-document emitters (§4.6, §6). Pure
//! string building from the field maps — no I/O, no request state.

use super::fields::{MEMBER_FIELDS, OFFICE_FIELDS, PROPERTY_FIELDS};
use serde_json::{json, Value};

/// Edm primitive used for a RESO field. Real RESO fields are overwhelmingly
/// strings, decimals and integers; a small lookup covers the fields this
/// gateway declares rather than guessing from backend column names.
fn edm_type(reso_name: &str) -> &'static str {
    match reso_name {
        "ListPrice" | "OriginalListPrice" | "ClosePrice" | "LotSizeAcres" | "Latitude"
        | "Longitude" => "Edm.Decimal",
        "BedroomsTotal" | "BathroomsTotalInteger" | "LivingArea" | "YearBuilt" | "DaysOnMarket"
        | "MemberKey" | "OfficeKey" | "ListAgentKey" | "ListOfficeKey" => "Edm.Int32",
        "ListingContractDate" | "CloseDate" => "Edm.Date",
        "ModificationTimestamp" => "Edm.DateTimeOffset",
        _ => "Edm.String",
    }
}

fn entity_type_xml(name: &str, key_field: &str, fields: &[&'static str]) -> String {
    let mut props = String::new();
    for field in fields {
        let nullable = if *field == key_field {
            " Nullable=\"false\""
        } else {
            ""
        };
        props.push_str(&format!(
            "      <Property Name=\"{field}\" Type=\"{}\"{nullable}/>\n",
            edm_type(field)
        ));
    }

    format!(
        "    <EntityType Name=\"{name}\">\n      <Key>\n        <PropertyRef Name=\"{key_field}\"/>\n      </Key>\n{props}    </EntityType>\n"
    )
}

pub fn csdl_xml() -> String {
    let property_fields: Vec<&'static str> = PROPERTY_FIELDS.declared_order().collect();
    let member_fields: Vec<&'static str> = MEMBER_FIELDS.declared_order().collect();
    let office_fields: Vec<&'static str> = OFFICE_FIELDS.declared_order().collect();

    let mut property_type = entity_type_xml("Property", "ListingKey", &property_fields);
    property_type = property_type.replace(
        "    </EntityType>\n",
        "      <Property Name=\"Media\" Type=\"Collection(org.reso.metadata.Media)\"/>\n    </EntityType>\n",
    );
    let member_type = entity_type_xml("Member", "MemberKey", &member_fields);
    let office_type = entity_type_xml("Office", "OfficeKey", &office_fields);

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
    <Schema Namespace="org.reso.metadata" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <ComplexType Name="Media">
        <Property Name="MediaKey" Type="Edm.String" Nullable="false"/>
        <Property Name="ResourceRecordKey" Type="Edm.String"/>
        <Property Name="MediaURL" Type="Edm.String"/>
        <Property Name="Order" Type="Edm.Int32"/>
      </ComplexType>
{property_type}{member_type}{office_type}      <EntityContainer Name="Container">
        <EntitySet Name="Property" EntityType="org.reso.metadata.Property"/>
        <EntitySet Name="Member" EntityType="org.reso.metadata.Member"/>
        <EntitySet Name="Office" EntityType="org.reso.metadata.Office"/>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>
"#
    )
}

pub fn service_document(base_url: &str) -> Value {
    json!({
        "@odata.context": format!("{base_url}/$metadata"),
        "value": [
            { "name": "Property", "kind": "EntitySet", "url": "Property" },
            { "name": "Member", "kind": "EntitySet", "url": "Member" },
            { "name": "Office", "kind": "EntitySet", "url": "Office" },
        ]
    })
}
