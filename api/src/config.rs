use std::sync::{atomic::AtomicBool, Arc};

#[derive(Default, Clone)]
pub struct Config {
    pub exit: Arc<AtomicBool>,
    /// Configure file disk location
    pub fpath: String,
    pub hostname: String,
    pub node: String,
    pub pcap_file: String,
    pub pcap_dir: String,
    pub trace_file: String,
    pub output_file: String,
    pub pkt_channel_size: u32,
    /// UDP ports treated as SNMP traffic
    pub snmp_ports: Vec<u16>,
    /// Decoded payloads alias the capture buffer instead of copying
    pub reuse_buffer: bool,
    pub verify_checksums: bool,
    pub quiet: bool,
    pub recursive: bool,
    pub verbose_mode: bool,
    pub doc: Yaml,
}

impl Config {
    pub fn get_integer(&self, key: &str, default: i64, min: i64, max: i64) -> i64 {
        get_integer(self.doc.as_ref(), key, default, min, max)
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        get_str(self.doc.as_ref(), key, default)
    }

    pub fn get_boolean(&self, key: &str, default: bool) -> bool {
        get_boolean(self.doc.as_ref(), key, default)
    }

    pub fn get_int_arr(&self, key: &str) -> Vec<i64> {
        get_int_arr(self.doc.as_ref(), key)
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
/// Simple wrapper struct to implement Default trait for yaml_rust::Yaml
pub struct Yaml(pub yaml_rust::Yaml);

impl Default for Yaml {
    fn default() -> Self {
        Self(yaml_rust::Yaml::Null)
    }
}

impl AsRef<yaml_rust::Yaml> for Yaml {
    fn as_ref(&self) -> &yaml_rust::Yaml {
        &self.0
    }
}

fn get_str(doc: &yaml_rust::Yaml, key: &str, default: &str) -> String {
    match &doc[key] {
        yaml_rust::Yaml::String(s) => s.clone(),
        yaml_rust::Yaml::BadValue => default.to_string(),
        _ => {
            println!(
                "Wrong value type for {}, expecting string, set {} to {}",
                key, key, default
            );
            default.to_string()
        }
    }
}

fn get_boolean(doc: &yaml_rust::Yaml, key: &str, default: bool) -> bool {
    match doc[key] {
        yaml_rust::Yaml::Boolean(b) => b,
        yaml_rust::Yaml::BadValue => default,
        _ => {
            println!(
                "Wrong value type for {}, expecting boolean, set {} to {}",
                key, key, default
            );
            default
        }
    }
}

fn get_integer(doc: &yaml_rust::Yaml, key: &str, default: i64, min: i64, max: i64) -> i64 {
    match doc[key] {
        yaml_rust::Yaml::Integer(i) => {
            if i < min || i > max {
                println!(
                    "Option {} is less/greater than min/max value {}/{}, set {} to {}",
                    key, min, max, key, default
                );
                default
            } else {
                i
            }
        }
        yaml_rust::Yaml::BadValue => default,
        _ => {
            println!(
                "Wrong value type for {}, expecting integer, set {} to {}",
                key, key, default
            );
            default
        }
    }
}

fn get_int_arr(doc: &yaml_rust::Yaml, key: &str) -> Vec<i64> {
    let mut result = vec![];
    match &doc[key] {
        yaml_rust::Yaml::Array(a) => {
            for element in a {
                match element {
                    yaml_rust::Yaml::Integer(i) => result.push(*i),
                    _ => println!("Wrong value type for {}'s element, expecting integer", key),
                }
            }
        }
        yaml_rust::Yaml::BadValue => {}
        _ => println!(
            "Wrong value type for {}, expecting array, set {} to empty array",
            key, key
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaml_rust::YamlLoader;

    fn cfg(s: &str) -> Config {
        let docs = YamlLoader::load_from_str(s).unwrap();
        Config {
            doc: Yaml(docs[0].clone()),
            ..Default::default()
        }
    }

    #[test]
    fn integer_bounds() {
        let c = cfg("channel.pkt.size: 500");
        assert_eq!(c.get_integer("channel.pkt.size", 1000, 100, 10000), 500);
        assert_eq!(c.get_integer("channel.pkt.size", 1000, 600, 10000), 1000);
        assert_eq!(c.get_integer("missing", 7, 0, 10), 7);
    }

    #[test]
    fn str_and_bool() {
        let c = cfg("node: lab1\nreuse.buffer: true");
        assert_eq!(c.get_str("node", "default"), "lab1");
        assert_eq!(c.get_str("missing", "default"), "default");
        assert!(c.get_boolean("reuse.buffer", false));
    }

    #[test]
    fn int_arr() {
        let c = cfg("snmp.ports:\n  - 161\n  - 162");
        assert_eq!(c.get_int_arr("snmp.ports"), vec![161, 162]);
        assert!(c.get_int_arr("missing").is_empty());
    }
}
