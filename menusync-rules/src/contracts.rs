//! Validation contracts: declarative field schemas over field bags.
//!
//! A contract is a pure check `(fields) -> violations`; an empty result
//! means the bag passed. Two families exist: per-source raw contracts and
//! the canonical menu-item contract.

use menusync_types::fields::{self, Fields};
use menusync_types::item::Violations;
use serde_json::Value;

pub trait Contract: Send + Sync {
    fn validate(&self, fields: &Fields) -> Violations;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Int,
    StrList,
    IntList,
    Enum(&'static [&'static str]),
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,

    /// Lower exclusive bound for integer fields.
    pub gt: Option<i64>,
}

impl FieldSpec {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            gt: None,
        }
    }

    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            gt: None,
        }
    }

    pub fn gt(mut self, bound: i64) -> Self {
        self.gt = Some(bound);
        self
    }
}

/// A contract assembled from field specs.
pub struct SchemaContract {
    name: &'static str,
    specs: Vec<FieldSpec>,
}

impl SchemaContract {
    pub fn new(name: &'static str, specs: Vec<FieldSpec>) -> Self {
        Self { name, specs }
    }

    fn check_field(&self, spec: &FieldSpec, fields: &Fields, out: &mut Violations) {
        let value = fields.get(spec.name);
        let blank = value.map(fields::is_blank).unwrap_or(true);

        if blank {
            if spec.required {
                out.add(spec.name, "must be filled");
            }
            return;
        }

        let value = match value {
            Some(v) => v,
            None => return,
        };

        match spec.kind {
            FieldKind::Str => {
                if !value.is_string() {
                    out.add(spec.name, "must be a string");
                }
            }
            FieldKind::Int => match int_value(value) {
                Some(n) => {
                    if let Some(bound) = spec.gt {
                        if n <= bound {
                            out.add(spec.name, format!("must be greater than {bound}"));
                        }
                    }
                }
                None => out.add(spec.name, "must be an integer"),
            },
            FieldKind::StrList => {
                let ok = value
                    .as_array()
                    .map(|items| items.iter().all(Value::is_string))
                    .unwrap_or(false);
                if !ok {
                    out.add(spec.name, "must be a list of strings");
                }
            }
            FieldKind::IntList => {
                let ok = value
                    .as_array()
                    .map(|items| items.iter().all(|v| int_value(v).is_some()))
                    .unwrap_or(false);
                if !ok {
                    out.add(spec.name, "must be a list of integers");
                }
            }
            FieldKind::Enum(allowed) => {
                let ok = value
                    .as_str()
                    .map(|s| allowed.contains(&s))
                    .unwrap_or(false);
                if !ok {
                    out.add(spec.name, format!("must be one of: {}", allowed.join(", ")));
                }
            }
        }
    }
}

impl Contract for SchemaContract {
    fn validate(&self, fields: &Fields) -> Violations {
        let mut out = Violations::new();
        for spec in &self.specs {
            self.check_field(spec, fields, &mut out);
        }
        out
    }

    fn name(&self) -> &str {
        self.name
    }
}

fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)
            }
        }
        _ => None,
    }
}

const STATUSES: &[&str] = &["active", "inactive"];

/// The Treez raw payload shape.
pub fn treez_raw_contract() -> SchemaContract {
    SchemaContract::new(
        "treez_raw",
        vec![
            FieldSpec::required("external_id", FieldKind::Str),
            FieldSpec::required("name", FieldKind::Str),
            FieldSpec::optional("brand", FieldKind::Str),
            FieldSpec::optional("strain", FieldKind::Str),
            FieldSpec::optional("tags", FieldKind::StrList),
            FieldSpec::optional("price_cents", FieldKind::Int),
            FieldSpec::optional("status", FieldKind::Enum(STATUSES)),
        ],
    )
}

/// The canonical menu-item shape validated after transformation.
pub fn canonical_menu_item_contract() -> SchemaContract {
    SchemaContract::new(
        "canonical_menu_item",
        vec![
            FieldSpec::required("external_id", FieldKind::Str),
            FieldSpec::required("name", FieldKind::Str),
            FieldSpec::optional("brand_id", FieldKind::Int),
            FieldSpec::optional("strain_id", FieldKind::Int),
            FieldSpec::optional("tag_ids", FieldKind::IntList),
            FieldSpec::optional("price_cents", FieldKind::Int).gt(0),
            FieldSpec::required("status", FieldKind::Enum(STATUSES)),
        ],
    )
}
