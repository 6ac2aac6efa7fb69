use serde::Serialize;

/// Input family a declared column type maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFamily {
    Integer,
    Decimal,
    Date,
    Boolean,
    Text,
}

const DECIMAL_MARKERS: [&str; 5] = ["numeric", "decimal", "real", "double", "float"];

/// Classifies a declared type. Families are tried in a fixed order, first match wins.
pub fn classify(declared_type: &str) -> TypeFamily {
    let t = declared_type.to_ascii_lowercase();

    if is_integer(&t) {
        TypeFamily::Integer
    } else if DECIMAL_MARKERS.iter().any(|m| t.contains(m)) {
        TypeFamily::Decimal
    } else if t.contains("date") || t.contains("timestamp") {
        TypeFamily::Date
    } else if t.contains("bool") {
        TypeFamily::Boolean
    } else {
        TypeFamily::Text
    }
}

// "interval" and "point" contain "int" without being integers.
fn is_integer(t: &str) -> bool {
    (t.contains("int") || t.contains("serial")) && !t.contains("interval") && !t.contains("point")
}

impl TypeFamily {
    /// The HTML input type rendered for this family.
    pub fn input_type(self, declared_type: &str) -> &'static str {
        match self {
            TypeFamily::Integer | TypeFamily::Decimal => "number",
            TypeFamily::Date if declared_type.to_ascii_lowercase().contains("timestamp") => {
                "datetime-local"
            }
            TypeFamily::Date => "date",
            TypeFamily::Boolean => "checkbox",
            TypeFamily::Text => "text",
        }
    }
}
