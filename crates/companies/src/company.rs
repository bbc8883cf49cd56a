use serde::{Deserialize, Deserializer, Serialize};

use corpreg_core::{CompanyId, DomainError, DomainResult};

/// Text attributes of a company, in storage column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompanyField {
    Name,
    Code,
    Country,
    Website,
    Phone,
}

impl CompanyField {
    pub const ALL: [CompanyField; 5] = [
        CompanyField::Name,
        CompanyField::Code,
        CompanyField::Country,
        CompanyField::Website,
        CompanyField::Phone,
    ];

    /// Column / JSON key for this field.
    pub fn column(self) -> &'static str {
        match self {
            CompanyField::Name => "name",
            CompanyField::Code => "code",
            CompanyField::Country => "country",
            CompanyField::Website => "website",
            CompanyField::Phone => "phone",
        }
    }
}

/// A stored company record.
///
/// `id` is assigned by storage on insert and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub code: String,
    pub country: String,
    pub website: String,
    pub phone: String,
}

impl Company {
    /// Materialize a record from a write body and a storage-assigned id.
    pub fn from_draft(id: CompanyId, draft: CompanyDraft) -> Self {
        Self {
            id,
            name: draft.name,
            code: draft.code,
            country: draft.country,
            website: draft.website,
            phone: draft.phone,
        }
    }

    pub fn field(&self, field: CompanyField) -> &str {
        match field {
            CompanyField::Name => &self.name,
            CompanyField::Code => &self.code,
            CompanyField::Country => &self.country,
            CompanyField::Website => &self.website,
            CompanyField::Phone => &self.phone,
        }
    }

    /// Replace every text attribute with the draft's values (full overwrite).
    pub fn overwrite(&mut self, draft: CompanyDraft) {
        self.name = draft.name;
        self.code = draft.code;
        self.country = draft.country;
        self.website = draft.website;
        self.phone = draft.phone;
    }
}

/// Write body for create/update.
///
/// Missing and `null` fields decode as empty strings and unknown fields are
/// ignored. An `id` in the body is ignored as well: identity comes from
/// storage (create) or from the request path (update).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyDraft {
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub code: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub country: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub website: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub phone: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl CompanyDraft {
    /// Decode a JSON request body. An empty body is an all-empty draft.
    pub fn from_json_body(body: &[u8]) -> DomainResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| DomainError::malformed(format!("body parse error: {e}")))
    }

    pub fn field(&self, field: CompanyField) -> &str {
        match field {
            CompanyField::Name => &self.name,
            CompanyField::Code => &self.code,
            CompanyField::Country => &self.country,
            CompanyField::Website => &self.website,
            CompanyField::Phone => &self.phone,
        }
    }
}

/// List query: each non-empty field is a partial (substring) match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyFilter {
    pub name: String,
    pub code: String,
    pub country: String,
    pub website: String,
    pub phone: String,
}

impl CompanyFilter {
    pub fn field(&self, field: CompanyField) -> &str {
        match field {
            CompanyField::Name => &self.name,
            CompanyField::Code => &self.code,
            CompanyField::Country => &self.country,
            CompanyField::Website => &self.website,
            CompanyField::Phone => &self.phone,
        }
    }

    /// Active constraints as `(field, needle)` pairs, in column order.
    pub fn active(&self) -> impl Iterator<Item = (CompanyField, &str)> + '_ {
        CompanyField::ALL
            .into_iter()
            .map(|f| (f, self.field(f)))
            .filter(|(_, needle)| !needle.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }

    /// Case-sensitive literal substring match on every active field (SQL `LIKE '%v%'` with
    /// `%`, `_` and `\` in `v` escaped).
    pub fn matches(&self, company: &Company) -> bool {
        self.active()
            .all(|(field, needle)| company.field(field).contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> Company {
        Company {
            id: CompanyId::new(1),
            name: "Acme".to_string(),
            code: "ACM".to_string(),
            country: "Cyprus".to_string(),
            website: "https://acme.example".to_string(),
            phone: "+357 22 000000".to_string(),
        }
    }

    #[test]
    fn empty_body_decodes_as_empty_draft() {
        assert_eq!(CompanyDraft::from_json_body(b"").unwrap(), CompanyDraft::default());
        assert_eq!(CompanyDraft::from_json_body(b"  \n").unwrap(), CompanyDraft::default());
    }

    #[test]
    fn body_ignores_unknown_fields_and_id() {
        let draft =
            CompanyDraft::from_json_body(br#"{"id": 99, "name":"Acme","code":"ACM","extra":true}"#)
                .unwrap();
        assert_eq!(draft.name, "Acme");
        assert_eq!(draft.code, "ACM");
        assert!(draft.country.is_empty());
    }

    #[test]
    fn null_fields_decode_as_empty() {
        let draft = CompanyDraft::from_json_body(br#"{"name":null,"code":"ACM","phone":null}"#)
            .unwrap();
        assert!(draft.name.is_empty());
        assert_eq!(draft.code, "ACM");
        assert!(draft.phone.is_empty());

        assert!(CompanyDraft::from_json_body(br#"{"name":42}"#).is_err());
    }

    #[test]
    fn malformed_body_is_validation_error() {
        let err = CompanyDraft::from_json_body(b"{not json").unwrap_err();
        assert!(matches!(err, DomainError::MalformedInput(_)));
    }

    #[test]
    fn company_serializes_with_wire_keys() {
        let json = serde_json::to_value(acme()).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["name"], "Acme");
        assert_eq!(json["phone"], "+357 22 000000");
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = CompanyFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&acme()));
    }

    #[test]
    fn filter_is_substring_and_conjunctive() {
        let mut filter = CompanyFilter {
            name: "cm".to_string(),
            ..CompanyFilter::default()
        };
        assert!(filter.matches(&acme()));

        filter.country = "Greece".to_string();
        assert!(!filter.matches(&acme()));
    }

    #[test]
    fn filter_is_case_sensitive() {
        let filter = CompanyFilter {
            name: "acme".to_string(),
            ..CompanyFilter::default()
        };
        assert!(!filter.matches(&acme()));
    }

    #[test]
    fn like_wildcards_in_needles_are_literal() {
        let filter = CompanyFilter {
            name: "%".to_string(),
            ..CompanyFilter::default()
        };
        assert!(!filter.matches(&acme()));

        let mut discounted = acme();
        discounted.name = "Acme 100%_off".to_string();
        let filter = CompanyFilter {
            name: "100%_".to_string(),
            ..CompanyFilter::default()
        };
        assert!(filter.matches(&discounted));
    }

    #[test]
    fn overwrite_replaces_every_field() {
        let mut company = acme();
        company.overwrite(CompanyDraft {
            name: "Updated".to_string(),
            ..CompanyDraft::default()
        });
        assert_eq!(company.name, "Updated");
        assert!(company.code.is_empty());
        assert_eq!(company.id, CompanyId::new(1));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: a filter built from substrings of a company's own fields matches it.
            #[test]
            fn own_substrings_always_match(
                name in "[A-Za-z0-9 ]{1,30}",
                code in "[A-Z0-9]{1,10}",
                start in 0usize..10,
                len in 0usize..10,
            ) {
                let company = Company {
                    id: CompanyId::new(7),
                    name: name.clone(),
                    code: code.clone(),
                    country: String::new(),
                    website: String::new(),
                    phone: String::new(),
                };
                let s = start.min(name.len());
                let e = (s + len).min(name.len());
                let filter = CompanyFilter {
                    name: name[s..e].to_string(),
                    code: code.clone(),
                    ..CompanyFilter::default()
                };
                prop_assert!(filter.matches(&company));
            }
        }
    }
}
