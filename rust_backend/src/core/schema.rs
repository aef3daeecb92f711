//! Column alias table and one-shot column resolution.
//!
//! Extracts exported by different tools name the same field differently.
//! The alias table lists, per canonical field, the accepted header variants
//! in preference order. A [`ColumnMap`] resolves the table against one
//! dataset's header once; checks then look fields up by canonical name.

use std::collections::HashMap;

use crate::core::domain::fields;

/// Canonical field identifiers used by the validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    PropertyId,
    NadId,
    PoleNumber,
    DropNumber,
    StandNumber,
    Status,
    FlowNameGroups,
    Site,
    Sections,
    Pons,
    LocationAddress,
    Latitude,
    Longitude,
    AgentName,
    LatLong,
    ModifiedBy,
    ModifiedDate,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::PropertyId => "property_id",
            CanonicalField::NadId => "nad_id",
            CanonicalField::PoleNumber => "pole_number",
            CanonicalField::DropNumber => "drop_number",
            CanonicalField::StandNumber => "stand_number",
            CanonicalField::Status => "status",
            CanonicalField::FlowNameGroups => "flow_name_groups",
            CanonicalField::Site => "site",
            CanonicalField::Sections => "sections",
            CanonicalField::Pons => "pons",
            CanonicalField::LocationAddress => "location_address",
            CanonicalField::Latitude => "latitude",
            CanonicalField::Longitude => "longitude",
            CanonicalField::AgentName => "agent_name",
            CanonicalField::LatLong => "lat_long",
            CanonicalField::ModifiedBy => "modified_by",
            CanonicalField::ModifiedDate => "modified_date",
        }
    }
}

/// Canonical field → accepted header variants, first match wins.
pub static COLUMN_ALIASES: &[(CanonicalField, &[&str])] = &[
    (
        CanonicalField::PropertyId,
        &[fields::PROPERTY_ID, "PropertyID", "Prop ID", "property_id"],
    ),
    (
        CanonicalField::NadId,
        &[fields::NAD_ID, "NAD ID", "NADID", "nad_id"],
    ),
    (
        CanonicalField::PoleNumber,
        &[fields::POLE_NUMBER, "PoleNumber", "Pole No", "pole_number"],
    ),
    (
        CanonicalField::DropNumber,
        &[fields::DROP_NUMBER, "DropNumber", "Drop No", "drop_number"],
    ),
    (
        CanonicalField::StandNumber,
        &[fields::STAND_NUMBER, "StandNumber", "Stand No", "stand_number"],
    ),
    (CanonicalField::Status, &[fields::STATUS, "status"]),
    (
        CanonicalField::FlowNameGroups,
        &[
            fields::FLOW_NAME_GROUPS,
            "FlowNameGroups",
            "Flow Groups",
            "flow_name_groups",
        ],
    ),
    (CanonicalField::Site, &[fields::SITE, "site"]),
    (CanonicalField::Sections, &[fields::SECTIONS, "sections"]),
    (CanonicalField::Pons, &[fields::PONS, "PON", "pons"]),
    (
        CanonicalField::LocationAddress,
        &[
            fields::LOCATION_ADDRESS,
            "LocationAddress",
            "Address",
            "location_address",
        ],
    ),
    (
        CanonicalField::Latitude,
        &[fields::LATITUDE, "Lat", "latitude"],
    ),
    (
        CanonicalField::Longitude,
        &[fields::LONGITUDE, "Long", "Lng", "longitude"],
    ),
    (
        CanonicalField::AgentName,
        &[fields::AGENT_NAME, "Agent Name", "Field Agent", "agent_name"],
    ),
    (
        CanonicalField::LatLong,
        &[fields::LAT_LONG, "Lat & Long", "Coordinates", "lat_long"],
    ),
    (
        CanonicalField::ModifiedBy,
        &[
            fields::MODIFIED_BY,
            "Modified By",
            "Last Modified By",
            "modified_by",
        ],
    ),
    (
        CanonicalField::ModifiedDate,
        &[
            fields::MODIFIED_DATE,
            "Modified Date",
            "Last Modified",
            "modified_date",
        ],
    ),
];

/// Resolution of [`COLUMN_ALIASES`] against one header.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    found: HashMap<CanonicalField, String>,
    missing: Vec<CanonicalField>,
}

impl ColumnMap {
    /// Resolves every canonical field against the given column names.
    pub fn resolve<S: AsRef<str>>(columns: &[S]) -> Self {
        let mut map = ColumnMap::default();

        for (canonical, variants) in COLUMN_ALIASES {
            let hit = variants
                .iter()
                .find(|variant| columns.iter().any(|c| c.as_ref() == **variant));
            match hit {
                Some(name) => {
                    map.found.insert(*canonical, (*name).to_string());
                }
                None => map.missing.push(*canonical),
            }
        }

        map
    }

    /// Actual column name of a canonical field, if the header has one.
    pub fn column(&self, field: CanonicalField) -> Option<&str> {
        self.found.get(&field).map(String::as_str)
    }

    pub fn missing(&self) -> &[CanonicalField] {
        &self.missing
    }

    /// Human-readable `canonical -> actual` listing, sorted by canonical name.
    pub fn describe(&self) -> String {
        let mut pairs: Vec<_> = self
            .found
            .iter()
            .map(|(k, v)| format!("{} -> {}", k.as_str(), v))
            .collect();
        pairs.sort();
        pairs.join(", ")
    }
}

/// Returns the required fields absent from `columns`, in required-list order.
pub fn missing_required<S: AsRef<str>>(columns: &[S], required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|r| !columns.iter().any(|c| c.as_ref() == **r))
        .map(|r| r.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::REQUIRED_FIELDS;

    #[test]
    fn test_canonical_headers_resolve_fully() {
        let map = ColumnMap::resolve(&REQUIRED_FIELDS);
        assert!(map.missing().is_empty());
        assert_eq!(map.column(CanonicalField::PoleNumber), Some("Pole Number"));
        assert_eq!(map.column(CanonicalField::ModifiedDate), Some("lst_mod_dt"));
    }

    #[test]
    fn test_variants_resolve_in_preference_order() {
        let columns = vec!["Lat", "latitude", "Lng", "Pole No"];
        let map = ColumnMap::resolve(&columns);
        assert_eq!(map.column(CanonicalField::Latitude), Some("Lat"));
        assert_eq!(map.column(CanonicalField::Longitude), Some("Lng"));
        assert_eq!(map.column(CanonicalField::PoleNumber), Some("Pole No"));
        assert!(map.missing().contains(&CanonicalField::Status));
    }

    #[test]
    fn test_missing_required_lists_every_absent_field() {
        let columns = vec!["Property ID", "Pole Number"];
        let missing = missing_required(&columns, &REQUIRED_FIELDS);
        assert_eq!(missing.len(), REQUIRED_FIELDS.len() - 2);
        assert_eq!(missing[0], "1map NAD ID");
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let mut columns: Vec<&str> = REQUIRED_FIELDS.to_vec();
        columns.push("Unexpected");
        assert!(missing_required(&columns, &REQUIRED_FIELDS).is_empty());
    }
}
