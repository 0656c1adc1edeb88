//! Trap shape declarations from the configuration file.
//!
//! ```yaml
//! trap.shapes:
//!   - name: linkDown
//!     oid: 1.3.6.1.6.3.1.1.5.3
//!     fields:
//!       - { name: ifIndex, oid: 1.3.6.1.2.1.2.2.1.1, repr: integer }
//!       - { name: agent, binding: source-address }
//!       - { name: when, binding: receipt-time }
//!       - { name: varbinds, binding: all-var-binds }
//! ```

use anyhow::{anyhow, Result};
use yaml_rust::Yaml;

use tracewire_snmp::projection::{AddrRepr, Binding, FieldRepr, Projector, Shape};
use tracewire_snmp::ObjectIdentifier;

/// Build a projector from the `trap.shapes` list, `None` when the
/// configuration declares no shapes.
pub fn load(doc: &Yaml) -> Result<Option<Projector>> {
    let list = match &doc["trap.shapes"] {
        Yaml::Array(list) => list,
        Yaml::BadValue => return Ok(None),
        _ => return Err(anyhow!("trap.shapes must be a list")),
    };

    let mut shapes = Vec::with_capacity(list.len());
    for item in list {
        shapes.push(shape(item)?);
    }
    Ok(Some(Projector::new(shapes)))
}

fn shape(doc: &Yaml) -> Result<Shape> {
    let name = str_field(doc, "name")?;
    let trap_type = oid_field(doc, "oid")?;

    let fields = match &doc["fields"] {
        Yaml::Array(fields) => fields,
        _ => return Err(anyhow!("shape {} has no fields list", name)),
    };

    let mut bindings = Vec::with_capacity(fields.len());
    for field in fields {
        let field_name = str_field(field, "name")?;
        bindings.push((field_name, binding(field)?));
    }

    Ok(Shape {
        name,
        trap_type,
        bindings,
    })
}

fn binding(doc: &Yaml) -> Result<Binding> {
    if let Yaml::String(special) = &doc["binding"] {
        return match special.as_str() {
            "all-var-binds" => Ok(Binding::AllVarBinds),
            "source-address" => Ok(Binding::SourceAddress(AddrRepr::Typed)),
            "source-address-text" => Ok(Binding::SourceAddress(AddrRepr::Text)),
            "receipt-time" => Ok(Binding::ReceiptTime),
            other => Err(anyhow!("unknown binding {}", other)),
        };
    }

    let oid = oid_field(doc, "oid")?;
    let repr = match &doc["repr"] {
        Yaml::String(repr) => match repr.as_str() {
            "integer" => FieldRepr::Integer,
            "uint64" => FieldRepr::UInt64,
            "text" => FieldRepr::Text,
            "bytes" => FieldRepr::Bytes,
            "oid" => FieldRepr::Oid,
            "address" => FieldRepr::Address,
            other => return Err(anyhow!("unknown repr {}", other)),
        },
        Yaml::BadValue => FieldRepr::Text,
        _ => return Err(anyhow!("repr must be a string")),
    };
    Ok(Binding::Oid { oid, repr })
}

fn str_field(doc: &Yaml, key: &str) -> Result<String> {
    match &doc[key] {
        Yaml::String(s) => Ok(s.clone()),
        _ => Err(anyhow!("missing or non-string {} in trap.shapes", key)),
    }
}

fn oid_field(doc: &Yaml, key: &str) -> Result<ObjectIdentifier> {
    str_field(doc, key)?
        .parse()
        .map_err(|e| anyhow!("bad {} in trap.shapes: {}", key, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaml_rust::YamlLoader;

    fn doc(s: &str) -> Yaml {
        YamlLoader::load_from_str(s).unwrap().remove(0)
    }

    #[test]
    fn no_shapes_section() {
        assert!(load(&doc("node: lab1")).unwrap().is_none());
    }

    #[test]
    fn full_shape_parses() {
        let yaml = r#"
trap.shapes:
  - name: linkDown
    oid: 1.3.6.1.6.3.1.1.5.3
    fields:
      - { name: ifIndex, oid: 1.3.6.1.2.1.2.2.1.1, repr: integer }
      - { name: agent, binding: source-address }
      - { name: when, binding: receipt-time }
      - { name: rest, binding: all-var-binds }
"#;
        assert!(load(&doc(yaml)).unwrap().is_some());
    }

    #[test]
    fn unknown_repr_is_an_error() {
        let yaml = r#"
trap.shapes:
  - name: x
    oid: 1.3.6.1.4.1
    fields:
      - { name: f, oid: 1.3.6.1.4.1.1, repr: float }
"#;
        assert!(load(&doc(yaml)).is_err());
    }

    #[test]
    fn missing_fields_is_an_error() {
        let yaml = "trap.shapes:\n  - name: x\n    oid: 1.3.6.1.4.1\n";
        assert!(load(&doc(yaml)).is_err());
    }
}
